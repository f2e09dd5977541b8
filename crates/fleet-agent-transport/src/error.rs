//! Error types for the transport crate.

use thiserror::Error;

/// Errors that can occur on the transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connecting failed or the connection dropped.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The connection string is not usable.
    #[error("invalid connection string: {0}")]
    InvalidUrl(String),

    /// A packet was sent while no connection is established.
    #[error("transport is not connected")]
    NotConnected,

    /// The transport was closed and cannot be used again.
    #[error("transport is closed")]
    Closed,

    /// A packet could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl TransportError {
    /// Check if this error is retriable.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::NotConnected)
    }
}

/// A specialized Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
