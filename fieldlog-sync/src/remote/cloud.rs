use super::RemoteStore;
use crate::cloud::CloudStorage;
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use fieldlog_types::BackupDocument;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// File name of the backup document.
pub const DEFAULT_DOCUMENT_NAME: &str = "fieldlog-backup.json";

/// [`RemoteStore`] over a file-level cloud storage.
///
/// The backup document is a JSON file in the sync folder. Every save writes a
/// fresh file and then removes the older copies, so a crash between the two
/// leaves at worst a duplicate, never a missing backup. Attachments are
/// `attachment-<uuid>.bin` files and the provider's file id is the handle.
pub struct CloudRemote<S> {
    storage: S,
    document_name: String,
}

impl<S: CloudStorage> CloudRemote<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            document_name: DEFAULT_DOCUMENT_NAME.to_string(),
        }
    }

    /// Uses a different document file name.
    #[must_use]
    pub fn with_document_name(mut self, name: impl Into<String>) -> Self {
        self.document_name = name.into();
        self
    }

    /// The underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn document_name(&self) -> &str {
        &self.document_name
    }
}

#[async_trait]
impl<S: CloudStorage> RemoteStore for CloudRemote<S> {
    fn provider_name(&self) -> &'static str {
        self.storage.provider_name()
    }

    async fn verify(&self) -> SyncResult<()> {
        if !self.storage.is_authenticated() {
            return Err(SyncError::Auth(format!(
                "{} is not signed in",
                self.storage.provider_name()
            )));
        }
        self.storage.ensure_sync_folder().await
    }

    async fn load_document(&self) -> SyncResult<Option<BackupDocument>> {
        let mut candidates = self.storage.find_files(&self.document_name).await?;
        candidates.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));

        let Some(latest) = candidates.first() else {
            debug!("No backup document in {}", self.storage.provider_name());
            return Ok(None);
        };

        let bytes = self.storage.download(&latest.id).await?;
        match BackupDocument::parse(&bytes) {
            Some(document) => {
                debug!(
                    "Loaded backup document {} ({} records)",
                    latest.id,
                    document.records.len()
                );
                Ok(Some(document))
            }
            None => {
                warn!(
                    "Backup document {} is malformed; treating remote as empty",
                    latest.id
                );
                Ok(None)
            }
        }
    }

    async fn save_document(&self, document: &BackupDocument) -> SyncResult<()> {
        let previous = self.storage.find_files(&self.document_name).await?;
        let bytes = document.to_bytes()?;
        let saved = self.storage.upload(&self.document_name, &bytes).await?;

        // Providers that overwrite by name hand back the same id.
        for stale in previous.iter().filter(|f| f.id != saved.id) {
            if let Err(e) = self.storage.delete(&stale.id).await {
                warn!("Failed to remove old backup document {}: {e}", stale.id);
            }
        }

        info!(
            "Saved backup document ({} records, {} bytes)",
            document.records.len(),
            bytes.len()
        );
        Ok(())
    }

    async fn upload_attachment(&self, data: &[u8]) -> SyncResult<String> {
        let name = format!("attachment-{}.bin", Uuid::new_v4());
        let file = self.storage.upload(&name, data).await?;
        Ok(file.id)
    }

    async fn download_attachment(&self, handle: &str) -> SyncResult<Vec<u8>> {
        self.storage.download(handle).await
    }
}
