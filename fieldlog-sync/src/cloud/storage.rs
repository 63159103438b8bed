//! File-level transport seam.
//!
//! A [`CloudStorage`] moves opaque files in and out of one folder. What those
//! files mean is decided by [`crate::remote::CloudRemote`].

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Configuration shared by every cloud storage provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudStorageConfig {
    /// Slash-separated folder that holds the backup, relative to the provider root.
    pub sync_folder: String,
    /// Upload limit in bytes.
    pub max_file_size: u64,
}

impl Default for CloudStorageConfig {
    fn default() -> Self {
        Self {
            sync_folder: "FieldLog/backup".to_string(),
            max_file_size: 50 * 1024 * 1024,
        }
    }
}

impl CloudStorageConfig {
    /// Rejects payloads larger than `max_file_size`.
    pub fn check_size(&self, len: usize) -> SyncResult<()> {
        let size = len as u64;
        if size > self.max_file_size {
            return Err(SyncError::FileTooLarge {
                size,
                limit: self.max_file_size,
            });
        }
        Ok(())
    }
}

/// A file as the provider reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudFile {
    /// Provider handle, stable for the life of the file.
    pub id: String,
    pub name: String,
    /// `sync_folder/name`, for logs.
    pub path: String,
    pub size: u64,
    pub modified_at: SystemTime,
    /// MD5 on Drive; folders don't compute one.
    pub content_hash: Option<String>,
}

/// A provider that stores files in one folder.
///
/// Credentials are handed to implementations already valid; the interactive
/// sign-in flow lives in the UI layer.
#[async_trait]
pub trait CloudStorage: Send + Sync {
    /// Human-readable provider name for logs and status.
    fn provider_name(&self) -> &'static str;

    /// Whether credentials (or the mount) are present. No network round trip.
    fn is_authenticated(&self) -> bool;

    /// Every file in the backup folder, newest first.
    async fn list_files(&self) -> SyncResult<Vec<CloudFile>>;

    /// Files with exactly this name, newest first.
    async fn find_files(&self, name: &str) -> SyncResult<Vec<CloudFile>> {
        Ok(self
            .list_files()
            .await?
            .into_iter()
            .filter(|f| f.name == name)
            .collect())
    }

    /// Creates a file. Providers that key by name replace an existing one.
    async fn upload(&self, name: &str, content: &[u8]) -> SyncResult<CloudFile>;

    async fn download(&self, file_id: &str) -> SyncResult<Vec<u8>>;

    /// Deletes a file. Deleting a missing file succeeds.
    async fn delete(&self, file_id: &str) -> SyncResult<()>;

    /// Resolves the backup folder, creating missing path segments.
    async fn ensure_sync_folder(&self) -> SyncResult<()>;
}
