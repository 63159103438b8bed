//! The remote backup store.
//!
//! The engine sees the remote as one named document plus a bag of opaque
//! attachment blobs. [`CloudRemote`] maps that onto any file-level
//! [`CloudStorage`](crate::cloud::CloudStorage); [`MemoryRemote`] keeps
//! everything in process.

mod cloud;
pub mod memory;

pub use cloud::{CloudRemote, DEFAULT_DOCUMENT_NAME};
pub use memory::MemoryRemote;

use crate::error::SyncResult;
use async_trait::async_trait;
use fieldlog_types::BackupDocument;

/// Remote backup store used by the sync engine.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Human-readable provider name for logs.
    fn provider_name(&self) -> &'static str;

    /// Checks credentials and reachability. Called once when an engine is
    /// connected.
    async fn verify(&self) -> SyncResult<()> {
        Ok(())
    }

    /// Loads the most recently saved document.
    ///
    /// `Ok(None)` means there is no usable backup: nothing was ever saved, or
    /// what is there does not parse. Transport failures are errors.
    async fn load_document(&self) -> SyncResult<Option<BackupDocument>>;

    /// Saves the document as the new canonical snapshot.
    async fn save_document(&self, document: &BackupDocument) -> SyncResult<()>;

    /// Stores an attachment blob and returns its remote handle.
    async fn upload_attachment(&self, data: &[u8]) -> SyncResult<String>;

    /// Fetches an attachment blob by remote handle.
    async fn download_attachment(&self, handle: &str) -> SyncResult<Vec<u8>>;
}
