//! Presence consumer (IPC) configuration.

use serde::{Deserialize, Serialize};

/// Placeholder client id written by older setups; never valid.
pub const PLACEHOLDER_CLIENT_ID: &str = "your-client-id-here";

/// Presence channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Application client id sent in the IPC handshake.
    pub client_id: String,
    /// Fixed delay in seconds before reconnecting to the consumer.
    pub reconnect_delay: u32,
    /// First IPC endpoint index to try (`discord-ipc-N`, 0-9).
    pub pipe_index: u32,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            client_id: "1106789337726935040".into(),
            reconnect_delay: 5,
            pipe_index: 0,
        }
    }
}
