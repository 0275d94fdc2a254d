//! Presence channel client.
//!
//! A background task owns the IPC connection to the local presence
//! consumer: it performs the handshake, waits for the consumer's `READY`
//! dispatch, sends activity updates, and reconnects after a fixed delay
//! whenever the transport drops. Callers talk to it through the cloneable
//! [`PresenceClient`] handle.

mod connection;
mod handle;
mod types;


pub use handle::PresenceClient;
pub use types::{ChannelState, PresenceConfig};
