//! Bridge controller: wires the relay to the presence channel and owns
//! their lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use srpc_common::{MetadataSnapshot, SrpcError};
use srpc_config::{validation, LogLevel, SrpcConfig};
use srpc_presence::{
    build_activity, ChannelState, IpcConnector, LocalIpcConnector, PresenceClient, PresenceConfig,
};
use srpc_relay::{RelayHooks, RelayOptions, RelayServer};

use crate::logging::{HandlerId, LogControl, LogRecord};

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

/// Relay hooks that turn snapshots into presence updates.
struct PresenceForwarder {
    presence: PresenceClient,
}

#[async_trait]
impl RelayHooks for PresenceForwarder {
    async fn on_metadata_update(&self, snapshot: MetadataSnapshot) {
        tracing::info!(
            "Updating presence: {} - {}",
            snapshot.title,
            snapshot.artist
        );
        self.presence.send_activity(build_activity(&snapshot)).await;
    }

    async fn on_client_disconnect(&self) {
        tracing::info!("All producers disconnected, clearing presence");
        self.presence.clear_activity().await;
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Snapshot of the controller's operational state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeStatus {
    pub running: bool,
    pub channel: ChannelState,
    pub producers: usize,
    pub relay_addr: Option<SocketAddr>,
    pub log_level: LogLevel,
    pub auto_start: bool,
}

struct Running {
    presence: PresenceClient,
    relay: RelayServer,
}

pub struct Bridge {
    config: SrpcConfig,
    log: LogControl,
    running: Option<Running>,
}

impl Bridge {
    pub fn new(config: SrpcConfig, log: LogControl) -> Self {
        Self {
            config,
            log,
            running: None,
        }
    }

    pub fn config(&self) -> &SrpcConfig {
        &self.config
    }

    /// Validate the configuration, connect to the presence consumer and
    /// start the relay. Returns the relay's bound address.
    pub async fn start(&mut self) -> Result<SocketAddr, SrpcError> {
        let connector = LocalIpcConnector::new(self.config.presence.pipe_index);
        self.start_with(connector).await
    }

    /// [`start`](Self::start) over a custom presence transport.
    pub async fn start_with<C: IpcConnector>(
        &mut self,
        connector: C,
    ) -> Result<SocketAddr, SrpcError> {
        if self.is_running() {
            self.stop().await;
        }

        tracing::info!("Starting SRPC bridge...");
        // Configuration faults surface before any socket is opened.
        validation::validate(&self.config)?;

        let presence = PresenceClient::spawn_with(presence_config(&self.config), connector);
        presence.connect().await;

        let hooks = Arc::new(PresenceForwarder {
            presence: presence.clone(),
        });
        let relay = RelayServer::with_options(hooks, relay_options(&self.config));
        let addr = match relay
            .start(self.config.relay.port, &self.config.relay.token)
            .await
        {
            Ok(addr) => addr,
            Err(e) => {
                tracing::error!("Failed to start relay: {e}");
                presence.shutdown().await;
                return Err(e);
            }
        };

        tracing::info!(%addr, "Bridge started");
        self.running = Some(Running { presence, relay });
        Ok(addr)
    }

    /// Stop the relay, clear the presence and close the consumer link.
    /// Safe when not running.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        tracing::info!("Stopping SRPC bridge...");
        running.relay.stop().await;
        running.presence.clear_activity().await;
        running.presence.shutdown().await;
        tracing::info!("Bridge stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Change the log level at runtime and record it in the configuration.
    pub fn set_log_level(&mut self, level: LogLevel) -> Result<(), SrpcError> {
        self.log.set_level(level)?;
        self.config.logging.level = level;
        tracing::info!("Log level set to {level}");
        Ok(())
    }

    /// Record the auto-start preference.
    pub fn set_auto_start(&mut self, enabled: bool) {
        self.config.system.auto_start = enabled;
        if enabled {
            tracing::info!("Auto-start enabled");
        } else {
            tracing::info!("Auto-start disabled");
        }
    }

    pub fn add_log_handler<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&LogRecord) + Send + Sync + 'static,
    {
        self.log.add_log_handler(handler)
    }

    pub fn remove_log_handler(&self, id: HandlerId) -> bool {
        self.log.remove_log_handler(id)
    }

    pub async fn status(&self) -> BridgeStatus {
        let (channel, producers, relay_addr) = match &self.running {
            Some(running) => (
                running.presence.state(),
                running.relay.count().await,
                running.relay.local_addr().await,
            ),
            None => (ChannelState::Disconnected, 0, None),
        };
        BridgeStatus {
            running: self.is_running(),
            channel,
            producers,
            relay_addr,
            log_level: self.log.level(),
            auto_start: self.config.system.auto_start,
        }
    }
}

fn presence_config(config: &SrpcConfig) -> PresenceConfig {
    PresenceConfig {
        client_id: config.presence.client_id.clone(),
        reconnect_delay: Duration::from_secs(u64::from(config.presence.reconnect_delay)),
        pipe_index: config.presence.pipe_index,
        ..Default::default()
    }
}

fn relay_options(config: &SrpcConfig) -> RelayOptions {
    RelayOptions {
        bind_address: config.relay.bind_address.clone(),
        keepalive_interval: Duration::from_secs(u64::from(config.relay.keepalive_interval)),
        ..Default::default()
    }
}
