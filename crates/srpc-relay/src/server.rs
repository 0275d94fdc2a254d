//! Listening socket, accept loop, and lifecycle of the relay.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use srpc_common::SrpcError;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio_tungstenite::accept_async;
use tokio_util::sync::CancellationToken;

use crate::connection::{handle_connection, ConnectionContext};
use crate::hooks::RelayHooks;
use crate::registry::ConnectionRegistry;

/// Tunables that are not part of `start`.
#[derive(Debug, Clone)]
pub struct RelayOptions {
    pub bind_address: String,
    /// Ping interval for authenticated producers.
    pub keepalive_interval: Duration,
    /// How long a TCP client may take to finish the WebSocket upgrade.
    pub handshake_timeout: Duration,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            keepalive_interval: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

struct Running {
    addr: SocketAddr,
    shutdown: CancellationToken,
    accept_task: JoinHandle<()>,
}

/// Authenticated WebSocket endpoint for metadata producers.
pub struct RelayServer {
    hooks: Arc<dyn RelayHooks>,
    options: RelayOptions,
    registry: ConnectionRegistry,
    running: Mutex<Option<Running>>,
}

impl RelayServer {
    pub fn new(hooks: Arc<dyn RelayHooks>) -> Self {
        Self::with_options(hooks, RelayOptions::default())
    }

    pub fn with_options(hooks: Arc<dyn RelayHooks>, options: RelayOptions) -> Self {
        Self {
            hooks,
            options,
            registry: ConnectionRegistry::new(),
            running: Mutex::new(None),
        }
    }

    /// Bind and start accepting producers. A running instance is stopped
    /// first. Returns the bound address (useful with port 0).
    pub async fn start(&self, port: u16, token: &str) -> Result<SocketAddr, SrpcError> {
        let mut running = self.running.lock().await;
        if let Some(previous) = running.take() {
            tracing::info!(addr = %previous.addr, "Relay already running, restarting");
            self.shutdown(previous).await;
        }

        let bind = (self.options.bind_address.as_str(), port);
        let listener = TcpListener::bind(bind).await.map_err(|e| {
            SrpcError::Relay(format!(
                "failed to bind {}:{port}: {e}",
                self.options.bind_address
            ))
        })?;
        let addr = listener.local_addr()?;

        let shutdown = CancellationToken::new();
        let ctx = ConnectionContext {
            registry: self.registry.clone(),
            hooks: Arc::clone(&self.hooks),
            token: Arc::from(token),
            keepalive: self.options.keepalive_interval,
            shutdown: shutdown.clone(),
        };
        let accept_task = tokio::spawn(accept_loop(
            listener,
            ctx,
            self.options.handshake_timeout,
        ));

        tracing::info!(%addr, "Relay listening");
        *running = Some(Running {
            addr,
            shutdown,
            accept_task,
        });
        Ok(addr)
    }

    /// Close every connection and the listener. Safe when not running.
    ///
    /// Does not invoke `on_client_disconnect`.
    pub async fn stop(&self) {
        if let Some(running) = self.running.lock().await.take() {
            self.shutdown(running).await;
        }
    }

    async fn shutdown(&self, running: Running) {
        tracing::info!(addr = %running.addr, "Stopping relay");
        running.shutdown.cancel();
        self.registry.clear().await;
        if let Err(e) = running.accept_task.await {
            tracing::warn!(error = %e, "Relay accept task ended abnormally");
        }
    }

    /// Send `message` as JSON to every authenticated producer. Returns how
    /// many connections accepted it.
    pub async fn broadcast<T: Serialize>(&self, message: &T) -> Result<usize, SrpcError> {
        let json = serde_json::to_string(message)
            .map_err(|e| SrpcError::Relay(format!("failed to encode broadcast: {e}")))?;

        let mut delivered = 0;
        for tx in self.registry.senders().await {
            if tx.send(json.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    /// Number of authenticated producers.
    pub async fn count(&self) -> usize {
        self.registry.count().await
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|r| r.addr)
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }
}

async fn accept_loop(listener: TcpListener, ctx: ConnectionContext, handshake_timeout: Duration) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = ctx.shutdown.cancelled() => break,

            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let ctx = ctx.clone();
                    connections.spawn(async move {
                        let upgrade = tokio::time::timeout(handshake_timeout, accept_async(stream));
                        let ws = tokio::select! {
                            _ = ctx.shutdown.cancelled() => return,
                            ws = upgrade => ws,
                        };
                        match ws {
                            Ok(Ok(ws)) => handle_connection(ws, addr, ctx).await,
                            Ok(Err(e)) => {
                                tracing::warn!(peer = %addr, error = %e, "WS handshake failed");
                            }
                            Err(_) => {
                                tracing::warn!(peer = %addr, "WS handshake timed out");
                            }
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "TCP accept error");
                }
            },

            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        tracing::warn!(error = %e, "Connection task panicked");
                    }
                }
            }
        }
    }

    drop(listener);
    while connections.join_next().await.is_some() {}
    tracing::debug!("Relay accept loop finished");
}
