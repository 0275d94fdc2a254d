use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use srpc_common::{MetadataSnapshot, PlaybackState};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::{RelayHooks, RelayOptions, RelayServer};

const TOKEN: &str = "secure-token";

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum HookEvent {
    Update(MetadataSnapshot),
    Disconnect,
}

struct RecordingHooks {
    tx: mpsc::UnboundedSender<HookEvent>,
}

#[async_trait]
impl RelayHooks for RecordingHooks {
    async fn on_metadata_update(&self, snapshot: MetadataSnapshot) {
        let _ = self.tx.send(HookEvent::Update(snapshot));
    }

    async fn on_client_disconnect(&self) {
        let _ = self.tx.send(HookEvent::Disconnect);
    }
}

/// Fails on every metadata update.
struct PanickingHooks {
    tx: mpsc::UnboundedSender<HookEvent>,
}

#[async_trait]
impl RelayHooks for PanickingHooks {
    async fn on_metadata_update(&self, _snapshot: MetadataSnapshot) {
        panic!("metadata hook failed");
    }

    async fn on_client_disconnect(&self) {
        let _ = self.tx.send(HookEvent::Disconnect);
    }
}

async fn start_relay() -> (RelayServer, mpsc::UnboundedReceiver<HookEvent>, SocketAddr) {
    let (tx, rx) = mpsc::unbounded_channel();
    let server = RelayServer::new(Arc::new(RecordingHooks { tx }));
    let addr = server.start(0, TOKEN).await.unwrap();
    (server, rx, addr)
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
    ws
}

async fn send(ws: &mut Client, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

/// Next JSON text frame, skipping control frames.
async fn recv_json(ws: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for reply")
            .expect("stream ended")
            .unwrap();
        match frame {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// True once the server has closed the socket.
async fn is_closed(ws: &mut Client) -> bool {
    match tokio::time::timeout(Duration::from_secs(2), ws.next()).await {
        Ok(Some(Ok(Message::Close(_)))) | Ok(None) | Ok(Some(Err(_))) => true,
        _ => false,
    }
}

async fn authenticate(addr: SocketAddr) -> Client {
    let mut ws = connect(addr).await;
    send(&mut ws, json!({ "type": "auth", "token": TOKEN })).await;
    assert_eq!(recv_json(&mut ws).await, json!({ "type": "AUTH_SUCCESS" }));
    ws
}

async fn wait_for_count(server: &RelayServer, expected: usize) {
    for _ in 0..100 {
        if server.count().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("connection count never reached {expected}");
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<HookEvent>) -> HookEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for hook")
        .expect("hooks dropped")
}

async fn assert_no_event(rx: &mut mpsc::UnboundedReceiver<HookEvent>) {
    if let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
        panic!("unexpected hook event: {event:?}");
    }
}

fn update(title: &str) -> Value {
    json!({
        "type": "METADATA_UPDATE",
        "data": {
            "title": title,
            "artist": "B",
            "currentTime": 30,
            "duration": 180,
            "playbackState": "playing"
        }
    })
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unauthenticated_updates_are_rejected_and_not_forwarded() {
    let (server, mut events, addr) = start_relay().await;
    let mut ws = connect(addr).await;

    for _ in 0..2 {
        send(&mut ws, update("A")).await;
        assert_eq!(
            recv_json(&mut ws).await,
            json!({ "type": "ERROR", "message": "Not authenticated" })
        );
    }
    assert!(events.try_recv().is_err());
    assert_eq!(server.count().await, 0);

    send(&mut ws, json!({ "type": "auth", "token": TOKEN })).await;
    assert_eq!(recv_json(&mut ws).await, json!({ "type": "AUTH_SUCCESS" }));
    send(&mut ws, update("after-auth")).await;

    match next_event(&mut events).await {
        HookEvent::Update(snapshot) => assert_eq!(snapshot.title, "after-auth"),
        other => panic!("unexpected event: {other:?}"),
    }
    server.stop().await;
}

#[tokio::test]
async fn wrong_token_closes_then_new_connection_succeeds() {
    let (server, _events, addr) = start_relay().await;

    let mut bad = connect(addr).await;
    send(&mut bad, json!({ "type": "auth", "token": "wrong" })).await;
    assert_eq!(recv_json(&mut bad).await, json!({ "type": "AUTH_FAILED" }));
    assert!(is_closed(&mut bad).await);

    let _good = authenticate(addr).await;
    assert_eq!(server.count().await, 1);
    server.stop().await;
}

#[tokio::test]
async fn malformed_messages_are_ignored() {
    let (server, mut events, addr) = start_relay().await;
    let mut ws = authenticate(addr).await;

    ws.send(Message::Text("{not json".into())).await.unwrap();
    send(&mut ws, json!({ "type": "METADATA_UPDATE", "data": { "title": "A" } })).await;
    send(&mut ws, update("valid")).await;

    match next_event(&mut events).await {
        HookEvent::Update(snapshot) => assert_eq!(snapshot.title, "valid"),
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(server.count().await, 1);
    server.stop().await;
}

#[tokio::test]
async fn extension_field_names_are_accepted() {
    let (server, mut events, addr) = start_relay().await;
    let mut ws = authenticate(addr).await;

    send(
        &mut ws,
        json!({
            "type": "METADATA_UPDATE",
            "data": {
                "title": "Song",
                "artist": "Band",
                "artwork": "https://i1.sndcdn.com/x.jpg",
                "currentTime": 1.5,
                "duration": 200,
                "paused": "playing"
            }
        }),
    )
    .await;

    match next_event(&mut events).await {
        HookEvent::Update(snapshot) => {
            assert_eq!(snapshot.artwork_url.as_deref(), Some("https://i1.sndcdn.com/x.jpg"));
            assert_eq!(snapshot.playback_state, PlaybackState::Playing);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    server.stop().await;
}

// ---------------------------------------------------------------------------
// Disconnect edge
// ---------------------------------------------------------------------------

#[tokio::test]
async fn clear_fires_once_when_last_producer_leaves() {
    let (server, mut events, addr) = start_relay().await;
    let mut first = authenticate(addr).await;
    let mut second = authenticate(addr).await;
    wait_for_count(&server, 2).await;

    first.close(None).await.unwrap();
    wait_for_count(&server, 1).await;
    assert_no_event(&mut events).await;

    second.close(None).await.unwrap();
    assert!(matches!(next_event(&mut events).await, HookEvent::Disconnect));

    // An unauthenticated connection closing while none remain is not an edge.
    let mut stranger = connect(addr).await;
    stranger.close(None).await.unwrap();
    assert_no_event(&mut events).await;
    server.stop().await;
}

#[tokio::test]
async fn dropped_socket_counts_as_disconnect() {
    let (server, mut events, addr) = start_relay().await;
    let ws = authenticate(addr).await;
    wait_for_count(&server, 1).await;

    drop(ws);
    assert!(matches!(next_event(&mut events).await, HookEvent::Disconnect));
    assert_eq!(server.count().await, 0);
    server.stop().await;
}

#[tokio::test]
async fn panicking_update_still_unregisters_and_clears() {
    let (tx, mut events) = mpsc::unbounded_channel();
    let server = RelayServer::new(Arc::new(PanickingHooks { tx }));
    let addr = server.start(0, TOKEN).await.unwrap();

    let mut ws = authenticate(addr).await;
    wait_for_count(&server, 1).await;
    send(&mut ws, update("A")).await;

    // The handler dies with the hook; the socket is dropped server side.
    assert!(is_closed(&mut ws).await);
    assert!(matches!(next_event(&mut events).await, HookEvent::Disconnect));
    assert_eq!(server.count().await, 0);
    server.stop().await;
}

// ---------------------------------------------------------------------------
// Keepalive
// ---------------------------------------------------------------------------

#[tokio::test]
async fn keepalive_pings_only_authenticated_producers() {
    let (tx, _events) = mpsc::unbounded_channel();
    let options = RelayOptions {
        keepalive_interval: Duration::from_millis(100),
        ..Default::default()
    };
    let server = RelayServer::with_options(Arc::new(RecordingHooks { tx }), options);
    let addr = server.start(0, TOKEN).await.unwrap();

    let mut ws = connect(addr).await;
    let idle = tokio::time::timeout(Duration::from_millis(350), ws.next()).await;
    assert!(idle.is_err(), "unauthenticated producer got {idle:?}");

    send(&mut ws, json!({ "type": "auth", "token": TOKEN })).await;
    assert_eq!(recv_json(&mut ws).await, json!({ "type": "AUTH_SUCCESS" }));

    let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("no keepalive ping")
        .expect("stream ended")
        .unwrap();
    assert!(matches!(frame, Message::Ping(_)), "expected ping, got {frame:?}");
    server.stop().await;
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stop_is_safe_and_restartable() {
    let (tx, mut events) = mpsc::unbounded_channel();
    let server = RelayServer::new(Arc::new(RecordingHooks { tx }));
    server.stop().await;
    assert!(!server.is_running().await);

    let addr = server.start(0, TOKEN).await.unwrap();
    let mut ws = authenticate(addr).await;
    server.stop().await;
    server.stop().await;

    assert!(is_closed(&mut ws).await);
    assert!(!server.is_running().await);
    assert_eq!(server.count().await, 0);
    assert_no_event(&mut events).await;

    let addr = server.start(0, TOKEN).await.unwrap();
    assert_eq!(server.local_addr().await, Some(addr));
    let _ws = authenticate(addr).await;
    server.stop().await;
}

#[tokio::test]
async fn start_while_running_replaces_the_instance() {
    let (server, mut events, first_addr) = start_relay().await;
    let mut old = authenticate(first_addr).await;

    let second_addr = server.start(0, "new-token").await.unwrap();
    assert!(is_closed(&mut old).await);
    assert_no_event(&mut events).await;

    let mut ws = connect(second_addr).await;
    send(&mut ws, json!({ "type": "auth", "token": TOKEN })).await;
    assert_eq!(recv_json(&mut ws).await, json!({ "type": "AUTH_FAILED" }));

    let mut ws = connect(second_addr).await;
    send(&mut ws, json!({ "type": "auth", "token": "new-token" })).await;
    assert_eq!(recv_json(&mut ws).await, json!({ "type": "AUTH_SUCCESS" }));
    server.stop().await;
}

#[tokio::test]
async fn broadcast_reaches_only_authenticated_producers() {
    let (server, _events, addr) = start_relay().await;
    let mut a = authenticate(addr).await;
    let mut b = authenticate(addr).await;
    let mut anonymous = connect(addr).await;
    wait_for_count(&server, 2).await;

    let delivered = server
        .broadcast(&json!({ "type": "NOTICE", "message": "hi" }))
        .await
        .unwrap();
    assert_eq!(delivered, 2);
    assert_eq!(recv_json(&mut a).await["type"], "NOTICE");
    assert_eq!(recv_json(&mut b).await["type"], "NOTICE");

    // The anonymous client only sees the reply to its own message.
    send(&mut anonymous, json!({ "type": "hello" })).await;
    assert_eq!(recv_json(&mut anonymous).await["type"], "ERROR");
    server.stop().await;
}
