//! In-process remote store.
//!
//! Holds the document and blobs in memory. Used by tests and offline demos;
//! failure switches simulate an unreachable or flaky backend.

use super::RemoteStore;
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use fieldlog_types::BackupDocument;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct State {
    document: Option<Vec<u8>>,
    blobs: HashMap<String, Vec<u8>>,
    unreachable: bool,
    fail_next_load: bool,
    fail_saves: bool,
    fail_attachment_uploads: bool,
    fail_attachment_downloads: bool,
    reject_auth: bool,
    load_delay: Option<Duration>,
    loads: usize,
    saves: usize,
    uploads: usize,
    downloads: usize,
}

/// Remote store backed by process memory.
#[derive(Default)]
pub struct MemoryRemote {
    state: Mutex<State>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a remote already holding `document`.
    pub fn with_document(document: &BackupDocument) -> SyncResult<Self> {
        let remote = Self::new();
        remote.set_document(document)?;
        Ok(remote)
    }

    // ── Seeding and inspection ───────────────────────────────────

    pub fn set_document(&self, document: &BackupDocument) -> SyncResult<()> {
        let bytes = document.to_bytes()?;
        self.state.lock().document = Some(bytes);
        Ok(())
    }

    /// Stores raw bytes as the document, valid or not.
    pub fn set_raw_document(&self, bytes: impl Into<Vec<u8>>) {
        self.state.lock().document = Some(bytes.into());
    }

    /// The stored document, if present and well formed.
    pub fn document(&self) -> Option<BackupDocument> {
        let state = self.state.lock();
        state.document.as_deref().and_then(BackupDocument::parse)
    }

    /// Stores a blob directly and returns its handle.
    pub fn insert_attachment(&self, data: impl Into<Vec<u8>>) -> String {
        let handle = format!("mem-{}", Uuid::new_v4());
        self.state.lock().blobs.insert(handle.clone(), data.into());
        handle
    }

    pub fn blob(&self, handle: &str) -> Option<Vec<u8>> {
        self.state.lock().blobs.get(handle).cloned()
    }

    pub fn blob_count(&self) -> usize {
        self.state.lock().blobs.len()
    }

    // ── Failure injection ────────────────────────────────────────

    /// Every call fails with a network error while set.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    /// The next `load_document` fails with a network error.
    pub fn fail_next_load(&self) {
        self.state.lock().fail_next_load = true;
    }

    pub fn fail_saves(&self, fail: bool) {
        self.state.lock().fail_saves = fail;
    }

    pub fn fail_attachment_uploads(&self, fail: bool) {
        self.state.lock().fail_attachment_uploads = fail;
    }

    pub fn fail_attachment_downloads(&self, fail: bool) {
        self.state.lock().fail_attachment_downloads = fail;
    }

    /// `verify` reports an authentication failure while set.
    pub fn reject_auth(&self, reject: bool) {
        self.state.lock().reject_auth = reject;
    }

    /// Delays every `load_document` call, to hold a cycle in flight.
    pub fn set_load_delay(&self, delay: Option<Duration>) {
        self.state.lock().load_delay = delay;
    }

    // ── Counters ─────────────────────────────────────────────────

    pub fn load_count(&self) -> usize {
        self.state.lock().loads
    }

    pub fn save_count(&self) -> usize {
        self.state.lock().saves
    }

    pub fn upload_count(&self) -> usize {
        self.state.lock().uploads
    }

    pub fn download_count(&self) -> usize {
        self.state.lock().downloads
    }

    fn check_reachable(state: &State) -> SyncResult<()> {
        if state.unreachable {
            return Err(SyncError::Network("remote unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    fn provider_name(&self) -> &'static str {
        "Memory"
    }

    async fn verify(&self) -> SyncResult<()> {
        let state = self.state.lock();
        Self::check_reachable(&state)?;
        if state.reject_auth {
            return Err(SyncError::Auth("token expired".to_string()));
        }
        Ok(())
    }

    async fn load_document(&self) -> SyncResult<Option<BackupDocument>> {
        let delay = self.state.lock().load_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        Self::check_reachable(&state)?;
        if std::mem::take(&mut state.fail_next_load) {
            return Err(SyncError::Network("remote unreachable".to_string()));
        }
        state.loads += 1;
        Ok(state.document.as_deref().and_then(BackupDocument::parse))
    }

    async fn save_document(&self, document: &BackupDocument) -> SyncResult<()> {
        let bytes = document.to_bytes()?;
        let mut state = self.state.lock();
        Self::check_reachable(&state)?;
        if state.fail_saves {
            return Err(SyncError::Network("save rejected".to_string()));
        }
        state.saves += 1;
        state.document = Some(bytes);
        debug!("Memory remote saved {} records", document.records.len());
        Ok(())
    }

    async fn upload_attachment(&self, data: &[u8]) -> SyncResult<String> {
        let mut state = self.state.lock();
        Self::check_reachable(&state)?;
        if state.fail_attachment_uploads {
            return Err(SyncError::Network("attachment upload failed".to_string()));
        }
        state.uploads += 1;
        let handle = format!("mem-{}", Uuid::new_v4());
        state.blobs.insert(handle.clone(), data.to_vec());
        Ok(handle)
    }

    async fn download_attachment(&self, handle: &str) -> SyncResult<Vec<u8>> {
        let mut state = self.state.lock();
        Self::check_reachable(&state)?;
        if state.fail_attachment_downloads {
            return Err(SyncError::Network("attachment download failed".to_string()));
        }
        let blob = state
            .blobs
            .get(handle)
            .cloned()
            .ok_or_else(|| SyncError::Remote(format!("no attachment with handle {handle}")))?;
        state.downloads += 1;
        Ok(blob)
    }
}
