use serde::{Deserialize, Serialize};

/// Configuration for the producer-facing WebSocket relay.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// TCP port the relay listens on.
    pub port: u16,
    /// Interface to bind. Loopback by default; producers run on the same host.
    pub bind_address: String,
    /// Shared secret producers must present in their `auth` message.
    pub token: String,
    /// Seconds between keepalive pings to authenticated producers.
    pub keepalive_interval: u32,
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("port", &self.port)
            .field("bind_address", &self.bind_address)
            .field("token", &"[REDACTED]")
            .field("keepalive_interval", &self.keepalive_interval)
            .finish()
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: 8173,
            bind_address: "127.0.0.1".into(),
            token: "secure-token".into(),
            keepalive_interval: 30,
        }
    }
}
