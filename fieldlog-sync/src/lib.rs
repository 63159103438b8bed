//! Offline-first backup sync for FieldLog.
//!
//! Reconciles the device store against a single remote backup document and
//! keeps photo attachments present on both sides.
//!
//! # Architecture
//!
//! - **Remote**: [`RemoteStore`] is what the engine talks to. [`CloudRemote`]
//!   adapts any file-level [`CloudStorage`] (Google Drive, a mounted folder);
//!   [`MemoryRemote`] keeps everything in process.
//! - **Attachments**: [`AttachmentSynchronizer`] moves blobs whose linkage is
//!   incomplete, one record at a time, never failing the cycle.
//! - **Engine**: [`SyncEngine`] runs the pull, merge, persist, push cycle
//!   behind a single-flight guard, publishes [`SyncStatus`] changes and owns
//!   the auto-sync timer.
//!
//! # Example
//!
//! ```no_run
//! use fieldlog_storage::SqliteStore;
//! use fieldlog_sync::{MemoryRemote, SyncConfig, SyncEngine};
//! use std::sync::Arc;
//!
//! # async fn run() -> fieldlog_sync::SyncResult<()> {
//! let local = Arc::new(SqliteStore::open_in_memory()?);
//! let remote = Arc::new(MemoryRemote::new());
//! let engine = SyncEngine::connect(local, remote, SyncConfig::default()).await?;
//!
//! let _sub = engine.subscribe(|event| println!("sync status: {}", event.status));
//! let report = engine.sync().await?;
//! println!("{} records", report.records.len());
//! # Ok(())
//! # }
//! ```

pub mod attachments;
pub mod cloud;
mod config;
mod engine;
mod error;
pub mod remote;
mod scheduler;
pub mod status;

pub use attachments::{
    AttachmentFailure, AttachmentReport, AttachmentSynchronizer, TransferDirection,
};
pub use cloud::{
    CloudFile, CloudStorage, CloudStorageConfig, FolderConfig, FolderStorage, GoogleDriveConfig,
    GoogleDriveStorage,
};
pub use config::SyncConfig;
pub use engine::{SyncEngine, SyncReport};
pub use error::{SyncError, SyncResult};
pub use remote::{CloudRemote, MemoryRemote, RemoteStore};
pub use status::{EventEmitter, StatusEvent, Subscription, SyncStatus};
