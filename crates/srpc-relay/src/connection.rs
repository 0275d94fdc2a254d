//! Per-connection handler: authenticate, then forward metadata.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;

use crate::hooks::RelayHooks;
use crate::protocol::RelayResponse;
use crate::registry::ConnectionRegistry;
use crate::session::{Action, ProducerSession};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Everything a connection task shares with the server.
#[derive(Clone)]
pub(crate) struct ConnectionContext {
    pub registry: ConnectionRegistry,
    pub hooks: Arc<dyn RelayHooks>,
    pub token: Arc<str>,
    pub keepalive: Duration,
    pub shutdown: CancellationToken,
}

/// Handle a single WebSocket connection until it closes.
///
/// The session runs in its own task so that cleanup still happens when it
/// panics.
pub(crate) async fn handle_connection(
    ws: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    ctx: ConnectionContext,
) {
    let session = ProducerSession::new();
    let id = session.id().clone();
    tracing::info!(peer = %addr, connection = %id, "Producer connected");

    if let Err(e) = tokio::spawn(serve(ws, addr, session, ctx.clone())).await {
        if e.is_panic() {
            tracing::error!(peer = %addr, connection = %id, "Connection handler panicked");
        }
    }

    tracing::info!(peer = %addr, connection = %id, "Producer disconnected");

    let was_last = ctx.registry.unregister(&id).await;
    if was_last && !ctx.shutdown.is_cancelled() {
        tracing::info!("No producers left, clearing presence");
        ctx.hooks.on_client_disconnect().await;
    }
}

async fn serve(
    ws: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    mut session: ProducerSession,
    ctx: ConnectionContext,
) {
    let (mut sink, mut stream) = ws.split();
    let (tx, mut rx) = mpsc::channel::<String>(64);

    let mut keepalive = tokio::time::interval_at(Instant::now() + ctx.keepalive, ctx.keepalive);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    'conn: loop {
        tokio::select! {
            _ = ctx.shutdown.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }

            // Broadcasts addressed to this producer.
            Some(text) = rx.recv() => {
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }

            _ = keepalive.tick() => {
                if session.is_authenticated()
                    && sink.send(Message::Ping(Default::default())).await.is_err()
                {
                    tracing::debug!(peer = %addr, "Keepalive ping failed");
                    break;
                }
            }

            frame = stream.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                        Ok(text) => text,
                        Err(_) => {
                            tracing::warn!(peer = %addr, "Ignoring non-UTF-8 binary frame");
                            continue;
                        }
                    },
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                        continue;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %addr, error = %e, "WS error");
                        break;
                    }
                    Some(Ok(_)) => continue,
                };

                for action in session.on_text(&text, &ctx.token) {
                    match action {
                        Action::Reply(response) => {
                            if send_response(&mut sink, &response).await.is_err() {
                                break 'conn;
                            }
                        }
                        Action::Register => {
                            ctx.registry.register(session.id().clone(), tx.clone()).await;
                        }
                        Action::Forward(snapshot) => ctx.hooks.on_metadata_update(snapshot).await,
                        Action::Close => {
                            let _ = sink.send(Message::Close(None)).await;
                            break 'conn;
                        }
                    }
                }
            }
        }
    }
}

/// Send a RelayResponse as a JSON text frame.
async fn send_response(
    sink: &mut WsSink,
    response: &RelayResponse,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    sink.send(Message::Text(response.to_json().into())).await
}
