//! SRPC configuration system.
//!
//! TOML-based configuration for the relay, the presence channel and the
//! operational controls. All sections use serde defaults so a partial
//! config file works out of the box.

pub mod schema;
pub mod toml_loader;
pub mod toml_writer;
pub mod validation;

pub use schema::{LogLevel, LoggingConfig, PresenceConfig, RelayConfig, SrpcConfig, SystemConfig};
pub use toml_loader::{default_config_path, load_from_path, load_or_create};
pub use toml_writer::save_config_to_path;
