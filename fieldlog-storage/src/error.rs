//! Local store errors.

use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

/// Failure of a [`crate::LocalStore`] call.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored row no longer parses, or a value failed to encode.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Data the store refuses to keep.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The blocking worker running a store call failed.
    #[error("storage task failed: {0}")]
    Task(String),
}
