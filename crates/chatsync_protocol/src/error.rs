//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while encoding, decoding or validating a snapshot.
///
/// Merging never fails; every variant here originates in the codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Failed to serialize a document.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// Payload is not a well-formed snapshot.
    #[error("decoding failed: {message}")]
    DecodingFailed {
        /// Description of the decoding error.
        message: String,
    },

    /// Two sessions share an identifier.
    #[error("duplicate session id: {session_id}")]
    DuplicateSession {
        /// The repeated session id.
        session_id: String,
    },

    /// Two messages within one session share an identifier.
    #[error("duplicate message id {message_id} in session {session_id}")]
    DuplicateMessage {
        /// Session containing the duplicate.
        session_id: String,
        /// The repeated message id.
        message_id: String,
    },
}

impl ProtocolError {
    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Create a decoding failed error.
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }
}
