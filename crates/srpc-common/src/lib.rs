pub mod errors;
pub mod id;
pub mod types;

pub use errors::{ConfigError, MetadataError, SrpcError};
pub use id::{new_id, new_nonce, ConnectionId};
pub use types::{MetadataSnapshot, PlaybackState};

pub type Result<T> = std::result::Result<T, SrpcError>;
