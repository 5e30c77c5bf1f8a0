//! Error types for the sync engine.

use recordsync_model::{LocalKey, PropertyError, RecordName};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Remote service call failed.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The remote service has no record with this name.
    #[error("remote record not found: {0}")]
    RecordNotFound(RecordName),

    /// The object has never been uploaded, so it has no remote record yet.
    #[error("object {0} has not been synced yet")]
    NotYetSynced(LocalKey),

    /// The change cursor is no longer accepted by the remote service.
    #[error("change cursor expired")]
    CursorExpired,

    /// No local object with this key.
    #[error("local object not found: {0}")]
    LocalNotFound(LocalKey),

    /// A sync pass is already running on this engine.
    #[error("a sync pass is already in progress")]
    AlreadySyncing,

    /// Property transfer failed.
    #[error("property error: {0}")]
    Property(#[from] PropertyError),

    /// Local store failure.
    #[error("local store error: {0}")]
    Store(String),

    /// Key-value persistence failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Codec error.
    #[error("codec error: {0}")]
    Codec(String),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::CursorExpired => true,
            _ => false,
        }
    }

    /// Returns true if the error came from the remote service.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            SyncError::Transport { .. } | SyncError::RecordNotFound(_) | SyncError::CursorExpired
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection lost").is_retryable());
        assert!(!SyncError::transport_fatal("invalid credentials").is_retryable());
        assert!(SyncError::CursorExpired.is_retryable());
        assert!(!SyncError::AlreadySyncing.is_retryable());
        assert!(!SyncError::RecordNotFound("r1".into()).is_retryable());
    }

    #[test]
    fn remote_errors() {
        assert!(SyncError::RecordNotFound("r1".into()).is_remote());
        assert!(SyncError::transport_fatal("boom").is_remote());
        assert!(!SyncError::Store("disk full".into()).is_remote());
    }

    #[test]
    fn error_display() {
        let err = SyncError::RecordNotFound("rec-7".into());
        assert_eq!(err.to_string(), "remote record not found: rec-7");

        let err = SyncError::AlreadySyncing;
        assert_eq!(err.to_string(), "a sync pass is already in progress");
    }
}
