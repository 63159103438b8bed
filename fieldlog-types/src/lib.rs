//! Core type definitions for FieldLog.
//!
//! This crate defines the types shared by the merge engine, the local store
//! and the sync orchestrator:
//! - Record identifiers and millisecond timestamps
//! - [`Record`], one logged observation with optional attachment references
//! - [`PreferenceSet`], the small per-user settings document
//! - [`BackupDocument`], the single remote snapshot `{ records, preferences }`
//!
//! Descriptive record fields are opaque JSON to everything in the core.

mod document;
mod ids;
mod preferences;
mod record;
mod timestamp;

pub use document::BackupDocument;
pub use ids::RecordId;
pub use preferences::PreferenceSet;
pub use record::Record;
pub use timestamp::Timestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid record id: {0}")]
    InvalidId(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
