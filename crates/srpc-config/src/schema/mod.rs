//! Configuration schema types for SRPC.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod presence;
mod relay;
mod system;

pub use presence::*;
pub use relay::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SrpcConfig {
    pub relay: RelayConfig,
    pub presence: PresenceConfig,
    pub logging: LoggingConfig,
    pub system: SystemConfig,
}
