//! Error types for the sync layer.

use fieldlog_storage::StorageError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network error (remote unreachable, HTTP failure).
    #[error("network error: {0}")]
    Network(String),

    /// Authentication error (token missing, invalid or expired).
    #[error("authentication error: {0}")]
    Auth(String),

    /// Local store failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Remote storage failure that is not a network error (folder access,
    /// missing file).
    #[error("remote storage error: {0}")]
    Remote(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Record or document encoding error.
    #[error(transparent)]
    Types(#[from] fieldlog_types::Error),

    /// A record points at a local attachment blob that does not exist.
    #[error("attachment missing: {0}")]
    AttachmentMissing(String),

    /// Payload exceeds the configured maximum file size.
    #[error("file too large: {size} bytes exceeds limit of {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    /// A sync or restore is already running on this engine.
    #[error("a sync cycle is already in progress")]
    AlreadySyncing,

    /// Restore was requested but the remote holds no usable backup.
    #[error("no remote backup found")]
    NoRemoteData,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SyncError {
    /// The message surfaced to status subscribers.
    ///
    /// Transport and auth failures carry the underlying message verbatim;
    /// everything else uses the display form.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Network(msg)
            | SyncError::Auth(msg)
            | SyncError::Remote(msg)
            | SyncError::Config(msg) => msg.clone(),
            other => other.to_string(),
        }
    }

    /// Returns true for failures that a later retry may fix on its own.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Network(_) | SyncError::AlreadySyncing)
    }
}
