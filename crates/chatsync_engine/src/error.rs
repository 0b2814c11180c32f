//! Error types for the sync engine.

use chatsync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("network error: {message}")]
    Network {
        /// Error message.
        message: String,
        /// Whether re-invoking sync may succeed.
        retryable: bool,
    },

    /// The backend rejected the credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Malformed import payload or unparseable remote blob.
    #[error("validation error: {0}")]
    Validation(String),

    /// A config migration step failed.
    #[error("config migration to version {version} failed: {message}")]
    Migration {
        /// Version of the failing step.
        version: u32,
        /// Error message.
        message: String,
    },

    /// Local persistence failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The sync configuration is incomplete or invalid.
    #[error("config error: {0}")]
    Config(String),

    /// Another sync cycle is already running.
    #[error("a sync cycle is already in progress")]
    InProgress,

    /// Sync was cancelled.
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Creates a retryable network error.
    pub fn network_retryable(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable network error.
    pub fn network_fatal(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if re-invoking the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Network { retryable, .. } => *retryable,
            SyncError::InProgress => true,
            _ => false,
        }
    }
}

impl From<ProtocolError> for SyncError {
    fn from(err: ProtocolError) -> Self {
        SyncError::Validation(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Storage(err.to_string())
    }
}
