//! Background task owning the consumer connection.

use std::sync::Arc;

use bytes::BytesMut;
use srpc_common::new_nonce;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::frame::{encode_frame, encode_json, try_decode_frame_from_buffer, Frame, Opcode};
use crate::protocol::{ActivityPayload, Handshake, InboundMessage, SetActivityCommand};
use crate::transport::{BoxedIpcStream, IpcConnector};

use super::types::{ChannelState, PresenceCommand, PresenceConfig, TransportEvent};

// ---------------------------------------------------------------------------
// Channel Task
// ---------------------------------------------------------------------------

pub(crate) struct ChannelTask<C> {
    config: PresenceConfig,
    connector: Arc<C>,
    state_tx: watch::Sender<ChannelState>,
    events_tx: mpsc::Sender<TransportEvent>,
    /// Bumped on every connect and teardown; events carrying an older
    /// generation belong to a dead socket.
    generation: u64,
    writer: Option<WriteHalf<BoxedIpcStream>>,
    reader: Option<JoinHandle<()>>,
    connecting: Option<JoinHandle<()>>,
    /// Last activity requested, resent once the consumer is ready.
    current_activity: Option<ActivityPayload>,
    /// The single pending reconnect deadline.
    reconnect_at: Option<Instant>,
    pid: u32,
}

impl<C: IpcConnector> ChannelTask<C> {
    pub(crate) fn new(
        config: PresenceConfig,
        connector: Arc<C>,
        state_tx: watch::Sender<ChannelState>,
        events_tx: mpsc::Sender<TransportEvent>,
    ) -> Self {
        Self {
            config,
            connector,
            state_tx,
            events_tx,
            generation: 0,
            writer: None,
            reader: None,
            connecting: None,
            current_activity: None,
            reconnect_at: None,
            pid: std::process::id(),
        }
    }

    fn state(&self) -> ChannelState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: ChannelState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Presence channel state changed");
        }
    }

    /// Main loop: commands from the handle, transport events, and the
    /// reconnect timer.
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::Receiver<PresenceCommand>,
        mut events: mpsc::Receiver<TransportEvent>,
    ) {
        loop {
            let reconnect_at = self.reconnect_at;
            tokio::select! {
                command = commands.recv() => match command {
                    Some(PresenceCommand::Connect) => self.connect(),
                    Some(PresenceCommand::SetActivity(activity)) => {
                        self.set_activity(activity).await
                    }
                    Some(PresenceCommand::ClearActivity) => self.clear_activity().await,
                    Some(PresenceCommand::Shutdown(ack)) => {
                        self.shutdown().await;
                        let _ = ack.send(());
                        return;
                    }
                    None => break,
                },
                Some(event) = events.recv() => self.handle_event(event).await,
                _ = wait_until(reconnect_at) => {
                    self.reconnect_at = None;
                    debug!("Reconnect timer fired");
                    self.connect();
                }
            }
        }
        self.shutdown().await;
    }

    async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected { generation, stream } => {
                self.on_connected(generation, stream).await
            }
            TransportEvent::ConnectFailed { generation, error } => {
                if generation != self.generation {
                    return;
                }
                self.connecting = None;
                warn!(error = %error, "Failed to connect to presence consumer");
                self.handle_disconnect("connect failed");
            }
            TransportEvent::Frame { generation, frame } => {
                if generation != self.generation {
                    debug!(generation, "Dropping frame from stale connection");
                    return;
                }
                self.handle_incoming(frame).await;
            }
            TransportEvent::Closed { generation, reason } => {
                if generation != self.generation {
                    return;
                }
                self.handle_disconnect(&reason);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start a connect attempt unless one is already in flight or live.
    fn connect(&mut self) {
        let state = self.state();
        if state != ChannelState::Disconnected {
            debug!(state = %state, "Connect ignored, channel already active");
            return;
        }

        self.reconnect_at = None;
        self.generation += 1;
        let generation = self.generation;
        self.set_state(ChannelState::Connecting);

        let connector = Arc::clone(&self.connector);
        let events = self.events_tx.clone();
        self.connecting = Some(tokio::spawn(async move {
            let event = match connector.connect().await {
                Ok(stream) => TransportEvent::Connected { generation, stream },
                Err(error) => TransportEvent::ConnectFailed { generation, error },
            };
            let _ = events.send(event).await;
        }));
    }

    async fn on_connected(&mut self, generation: u64, stream: BoxedIpcStream) {
        if generation != self.generation || self.state() != ChannelState::Connecting {
            debug!(generation, "Discarding stream from superseded connect attempt");
            return;
        }
        self.connecting = None;

        let (reader, writer) = tokio::io::split(stream);
        self.writer = Some(writer);
        self.reader = Some(tokio::spawn(read_loop(
            generation,
            reader,
            self.events_tx.clone(),
            self.config.max_frame_size,
        )));

        info!("Transport connected, sending handshake");
        let handshake = encode_json(Opcode::Handshake, &Handshake::new(&self.config.client_id));
        match handshake {
            Ok(bytes) => {
                self.write_bytes(bytes).await;
            }
            Err(e) => warn!(error = %e, "Failed to encode handshake"),
        }
    }

    /// Tear down the current transport and arm the reconnect timer.
    ///
    /// Re-arming replaces any pending deadline, so at most one reconnect is
    /// ever scheduled.
    fn handle_disconnect(&mut self, reason: &str) {
        self.generation += 1;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(connecting) = self.connecting.take() {
            connecting.abort();
        }
        self.writer = None;
        self.set_state(ChannelState::Disconnected);

        let delay = self.config.reconnect_delay;
        self.reconnect_at = Some(Instant::now() + delay);
        info!(
            reason,
            delay_ms = delay.as_millis() as u64,
            "Presence consumer disconnected, reconnect scheduled"
        );
    }

    async fn shutdown(&mut self) {
        self.generation += 1;
        self.reconnect_at = None;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(connecting) = self.connecting.take() {
            connecting.abort();
        }
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }
        self.set_state(ChannelState::Disconnected);
        info!("Presence channel shut down");
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Handle one decoded frame from the consumer.
    async fn handle_incoming(&mut self, frame: Frame) {
        let kind = frame.kind();
        if let Some(Opcode::Ping) = kind {
            if let Ok(bytes) = encode_frame(Opcode::Pong, &frame.payload) {
                self.write_bytes(bytes).await;
            }
            return;
        }
        if !matches!(kind, Some(Opcode::Frame | Opcode::Close)) {
            debug!(opcode = frame.opcode, "Ignoring frame");
            return;
        }

        let value = match frame.json() {
            Ok(value) => value,
            Err(e) => {
                warn!(opcode = frame.opcode, error = %e, "Failed to parse message from consumer");
                return;
            }
        };

        match kind {
            Some(Opcode::Frame) => {
                let message: InboundMessage = match serde_json::from_value(value) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!(error = %e, "Unexpected message shape from consumer");
                        return;
                    }
                };

                if message.is_ready() {
                    if self.state() != ChannelState::Ready {
                        self.set_state(ChannelState::Ready);
                        info!("Connected to presence consumer");
                    }
                    if let Some(activity) = self.current_activity.clone() {
                        debug!("Resending pending activity");
                        self.send_set_activity(&activity).await;
                    }
                } else if message.is_error() {
                    warn!(
                        message = message.message().unwrap_or("unknown error"),
                        "Presence consumer reported an error"
                    );
                } else {
                    debug!(cmd = ?message.cmd, evt = ?message.evt, "Presence consumer message");
                }
            }
            Some(Opcode::Close) => {
                let reason = value
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("no reason given")
                    .to_string();
                warn!(reason = %reason, "Presence consumer closed the channel");
                self.handle_disconnect(&reason);
            }
            _ => {}
        }
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    async fn set_activity(&mut self, activity: ActivityPayload) {
        self.current_activity = Some(activity.clone());
        if self.state() != ChannelState::Ready {
            debug!("Presence channel not ready, activity cached");
            return;
        }
        self.send_set_activity(&activity).await;
    }

    async fn clear_activity(&mut self) {
        self.current_activity = None;
        if self.state() != ChannelState::Ready {
            debug!("Presence channel not ready, nothing to clear");
            return;
        }
        match encode_json(Opcode::Frame, &SetActivityCommand::clear(self.pid, new_nonce())) {
            Ok(bytes) => {
                if self.write_bytes(bytes).await {
                    info!("Cleared presence activity");
                }
            }
            Err(e) => warn!(error = %e, "Failed to encode clear activity"),
        }
    }

    async fn send_set_activity(&mut self, activity: &ActivityPayload) {
        let command = SetActivityCommand::set(self.pid, activity, new_nonce());
        match encode_json(Opcode::Frame, &command) {
            Ok(bytes) => {
                if self.write_bytes(bytes).await {
                    debug!(details = %activity.details, state = %activity.state, "Activity sent");
                }
            }
            Err(e) => warn!(error = %e, "Failed to encode activity"),
        }
    }

    /// Write an encoded frame. A write failure is treated as a disconnect.
    async fn write_bytes(&mut self, bytes: Vec<u8>) -> bool {
        let result = match self.writer.as_mut() {
            Some(writer) => {
                async {
                    writer.write_all(&bytes).await?;
                    writer.flush().await
                }
                .await
            }
            None => return false,
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Write to presence consumer failed");
                self.handle_disconnect("write failed");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Read and split frames until the stream ends, then report the close.
async fn read_loop(
    generation: u64,
    mut reader: ReadHalf<BoxedIpcStream>,
    events: mpsc::Sender<TransportEvent>,
    max_frame_size: usize,
) {
    let mut buf = BytesMut::with_capacity(4096);

    let reason = 'read: loop {
        match reader.read_buf(&mut buf).await {
            Ok(0) => break 'read "consumer closed the connection".to_string(),
            Ok(_) => {}
            Err(e) => break 'read format!("read error: {e}"),
        }

        loop {
            match try_decode_frame_from_buffer(&mut buf, max_frame_size) {
                Ok(Some(frame)) => {
                    if events
                        .send(TransportEvent::Frame { generation, frame })
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => break 'read format!("undecodable frame: {e}"),
            }
        }
    };

    let _ = events.send(TransportEvent::Closed { generation, reason }).await;
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
