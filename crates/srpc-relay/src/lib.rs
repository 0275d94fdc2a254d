//! srpc-relay: authenticated WebSocket endpoint for now-playing producers.
//!
//! Each producer must send `{"type":"auth","token":...}` before anything
//! else is accepted. Validated `METADATA_UPDATE` snapshots are handed to
//! the owner through [`RelayHooks`], which is also told when the last
//! authenticated producer disconnects.

mod connection;
pub mod hooks;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;

#[cfg(test)]
mod tests;

pub use hooks::RelayHooks;
pub use protocol::{ProducerMessage, RelayResponse};
pub use server::{RelayOptions, RelayServer};
pub use session::{AuthState, ProducerSession};
