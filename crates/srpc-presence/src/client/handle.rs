//! Public handle for the presence channel.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use crate::protocol::ActivityPayload;
use crate::transport::{IpcConnector, LocalIpcConnector};

use super::connection::ChannelTask;
use super::types::{ChannelState, PresenceCommand, PresenceConfig};

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Handle for the presence channel.
///
/// All methods are non-blocking and send commands to the background
/// channel task. Clones share the same task.
#[derive(Clone)]
pub struct PresenceClient {
    command_tx: mpsc::Sender<PresenceCommand>,
    state_rx: watch::Receiver<ChannelState>,
}

impl PresenceClient {
    /// Spawn a client that talks to the local consumer endpoint.
    ///
    /// The channel starts disconnected; call [`connect`](Self::connect).
    pub fn spawn(config: PresenceConfig) -> Self {
        let connector = LocalIpcConnector::new(config.pipe_index);
        Self::spawn_with(config, connector)
    }

    /// Spawn a client over a custom transport.
    pub fn spawn_with<C: IpcConnector>(config: PresenceConfig, connector: C) -> Self {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (events_tx, events_rx) = mpsc::channel(64);
        let (state_tx, state_rx) = watch::channel(ChannelState::Disconnected);

        let task = ChannelTask::new(config, Arc::new(connector), state_tx, events_tx);
        tokio::spawn(task.run(command_rx, events_rx));

        Self {
            command_tx,
            state_rx,
        }
    }

    /// Open the transport and send the handshake. No-op if a connection is
    /// already open or in progress.
    pub async fn connect(&self) {
        let _ = self.command_tx.send(PresenceCommand::Connect).await;
    }

    /// Publish an activity. Held and sent on `READY` if the channel is not
    /// ready yet; a later call replaces it.
    pub async fn send_activity(&self, activity: ActivityPayload) {
        let _ = self
            .command_tx
            .send(PresenceCommand::SetActivity(activity))
            .await;
    }

    /// Remove the displayed activity.
    pub async fn clear_activity(&self) {
        let _ = self.command_tx.send(PresenceCommand::ClearActivity).await;
    }

    /// Close the transport and stop the background task, including any
    /// pending reconnect.
    pub async fn shutdown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self
            .command_tx
            .send(PresenceCommand::Shutdown(ack_tx))
            .await
            .is_ok()
        {
            let _ = ack_rx.await;
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.state_rx.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ChannelState::Ready
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ChannelState> {
        self.state_rx.clone()
    }
}
