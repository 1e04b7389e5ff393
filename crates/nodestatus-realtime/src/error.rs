//! Error types for the real-time core.

use thiserror::Error;

/// Result type alias for real-time operations.
pub type Result<T> = std::result::Result<T, RealtimeError>;

/// Errors that can occur in real-time operations.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// The peer's outbound channel is gone.
    #[error("channel closed")]
    ChannelClosed,

    /// A MessagePack payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Registry access failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Errors reported by a registry client.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry could not be reached or read.
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    /// The registry returned data that cannot be used.
    #[error("invalid registry data: {0}")]
    Invalid(String),

    /// IO error.
    #[error("registry io error: {0}")]
    Io(#[from] std::io::Error),
}
