//! Configuration, state, and internal message types for the presence client.

use std::io;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::frame::{Frame, DEFAULT_MAX_FRAME_SIZE};
use crate::protocol::ActivityPayload;
use crate::transport::BoxedIpcStream;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the presence client.
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// Application client id sent in the handshake.
    pub client_id: String,
    /// Fixed delay between a disconnect and the next connect attempt.
    pub reconnect_delay: Duration,
    /// First `discord-ipc-N` endpoint to probe.
    pub pipe_index: u32,
    /// Largest inbound frame accepted before the connection is dropped.
    pub max_frame_size: usize,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            reconnect_delay: Duration::from_secs(5),
            pipe_index: 0,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Connection state of the consumer link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Disconnected,
    /// Transport open or opening, handshake sent, `READY` not yet received.
    Connecting,
    Ready,
}

impl ChannelState {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelState::Disconnected => "disconnected",
            ChannelState::Connecting => "connecting",
            ChannelState::Ready => "ready",
        }
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Commands & Events
// ---------------------------------------------------------------------------

/// Requests from the public handle to the channel task.
pub(crate) enum PresenceCommand {
    Connect,
    SetActivity(ActivityPayload),
    ClearActivity,
    Shutdown(oneshot::Sender<()>),
}

/// Transport callbacks, tagged with the generation of the socket that
/// produced them so late events from a torn-down socket can be ignored.
pub(crate) enum TransportEvent {
    Connected {
        generation: u64,
        stream: BoxedIpcStream,
    },
    ConnectFailed {
        generation: u64,
        error: io::Error,
    },
    Frame {
        generation: u64,
        frame: Frame,
    },
    Closed {
        generation: u64,
        reason: String,
    },
}
