//! Presence channel for the local chat client.
//!
//! Frames activity updates over the consumer's IPC socket or named pipe
//! and turns playback snapshots into the activity payload it renders.

pub mod activity;
pub mod client;
pub mod frame;
pub mod protocol;
pub mod transport;

pub use activity::{build_activity, build_activity_at};
pub use client::{ChannelState, PresenceClient, PresenceConfig};
pub use frame::{FrameError, Opcode};
pub use protocol::ActivityPayload;
pub use transport::{IpcConnector, LocalIpcConnector};
