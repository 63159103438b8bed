//! Local storage for FieldLog.
//!
//! The sync engine talks to the device store only through [`LocalStore`], a
//! durable key-value contract keyed by record id:
//!
//! - records (JSON, one row per id) with an atomic "replace everything"
//! - attachment blobs keyed by an opaque local ref
//! - the single preference document
//!
//! [`SqliteStore`] is the production implementation. Blocking SQLite calls
//! run on the tokio blocking pool so the sync cycle never stalls the runtime.

mod error;
mod sqlite;
mod store;

pub use error::{StorageError, StorageResult};
pub use sqlite::SqliteStore;
pub use store::{attachment_ref_for, LocalStore};
