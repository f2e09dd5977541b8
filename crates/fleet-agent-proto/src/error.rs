//! Error types for envelope encoding and decoding.

use thiserror::Error;

use crate::wire::MessageType;

/// A result type using `CodecError`.
pub type Result<T> = std::result::Result<T, CodecError>;

/// A module batch entry that could not be turned into a module.
///
/// Only the entry is rejected; the rest of its batch still decodes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid module {name:?}: {reason}")]
pub struct InvalidEntry {
    /// The name the entry was sent with.
    pub name: String,
    /// Why it was rejected.
    pub reason: String,
}

/// Errors that can occur while converting envelopes.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The envelope itself could not be decoded.
    #[error("error unmarshal of message: {0}")]
    Envelope(#[source] prost::DecodeError),

    /// The module list carried by a batch command could not be decoded.
    #[error("error unmarshal of modules information: {0}")]
    ModuleList(#[source] prost::DecodeError),

    /// A typed response payload could not be decoded.
    #[error("error unmarshal of response payload: {0}")]
    Payload(#[source] prost::DecodeError),

    /// The envelope type is not a known message type.
    #[error("received unknown message type {0}")]
    UnknownMessageType(i32),

    /// The envelope type is known but not valid in this direction.
    #[error("received unexpected message type {0:?}")]
    UnexpectedMessageType(MessageType),

    /// A module entry is not usable.
    #[error(transparent)]
    InvalidModule(#[from] InvalidEntry),

    /// A field could not be converted.
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        /// The offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// Encoding failed.
    #[error("error marshal of message: {0}")]
    Encode(#[from] prost::EncodeError),
}
