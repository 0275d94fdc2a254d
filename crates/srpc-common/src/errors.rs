use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Rejections of producer-supplied metadata.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("metadata missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid metadata payload: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SrpcError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("relay error: {0}")]
    Relay(String),

    #[error("presence error: {0}")]
    Presence(String),

    #[error("{0}")]
    Other(String),
}
