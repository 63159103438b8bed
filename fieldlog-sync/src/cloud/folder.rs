//! Folder-backed storage.
//!
//! Treats a plain directory as the remote: a mounted network share, a
//! desktop sync client's folder (Dropbox, iCloud Drive, Syncthing) or a
//! temp dir in tests. File ids are derived from the file name, so they stay
//! stable across processes and devices sharing the folder.

use super::storage::{CloudFile, CloudStorage, CloudStorageConfig};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Where a [`FolderStorage`] keeps its files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderConfig {
    /// Directory that must already exist; it plays the role of the
    /// signed-in account.
    pub root: PathBuf,
    /// `sync_folder` is created below `root`.
    #[serde(flatten, default)]
    pub base: CloudStorageConfig,
}

impl FolderConfig {
    /// Config with default base settings.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            base: CloudStorageConfig::default(),
        }
    }
}

/// Storage over a local or mounted directory.
pub struct FolderStorage {
    config: FolderConfig,
    /// Resolved backup directory, set once it is known to exist.
    dir: Arc<RwLock<Option<PathBuf>>>,
}

fn remote_err(what: &str) -> impl FnOnce(std::io::Error) -> SyncError + '_ {
    move |e| SyncError::Remote(format!("{what}: {e}"))
}

/// Deterministic file id from the file name.
fn id_for(name: &str) -> String {
    let digest = Sha256::digest(name.as_bytes());
    format!("folder-{}", &hex::encode(digest)[..16])
}

impl FolderStorage {
    pub fn new(config: FolderConfig) -> Self {
        Self {
            config,
            dir: Arc::new(RwLock::new(None)),
        }
    }

    /// The backup directory below `root`, created on first use. A missing
    /// `root` (unplugged drive, unmounted share) is an auth failure.
    async fn backup_dir(&self) -> SyncResult<PathBuf> {
        if let Some(dir) = self.dir.read().await.clone() {
            return Ok(dir);
        }

        if !self.config.root.is_dir() {
            return Err(SyncError::Auth(format!(
                "backup folder {} is not available",
                self.config.root.display()
            )));
        }

        let dir = self.config.root.join(&self.config.base.sync_folder);
        if !dir.is_dir() {
            fs::create_dir_all(&dir)
                .await
                .map_err(remote_err("failed to create backup folder"))?;
            info!("Created backup folder: {}", dir.display());
        }

        *self.dir.write().await = Some(dir.clone());
        Ok(dir)
    }

    /// Visible regular files in the backup directory, with their names.
    async fn entries(&self) -> SyncResult<Vec<(PathBuf, String)>> {
        let dir = self.backup_dir().await?;
        let mut reader = fs::read_dir(&dir)
            .await
            .map_err(remote_err("failed to read backup folder"))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(remote_err("failed to read directory entry"))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            if name.starts_with('.') || path.is_dir() {
                continue;
            }
            entries.push((path, name));
        }
        Ok(entries)
    }

    async fn describe(&self, path: &Path, name: String) -> SyncResult<CloudFile> {
        let metadata = fs::metadata(path)
            .await
            .map_err(remote_err("failed to stat file"))?;

        Ok(CloudFile {
            id: id_for(&name),
            path: format!("{}/{}", self.config.base.sync_folder, name),
            name,
            size: metadata.len(),
            modified_at: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            content_hash: None,
        })
    }

    async fn locate(&self, file_id: &str) -> SyncResult<Option<PathBuf>> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .find(|(_, name)| id_for(name) == file_id)
            .map(|(path, _)| path))
    }
}

#[async_trait]
impl CloudStorage for FolderStorage {
    fn provider_name(&self) -> &'static str {
        "Folder"
    }

    fn is_authenticated(&self) -> bool {
        self.config.root.is_dir()
    }

    async fn list_files(&self) -> SyncResult<Vec<CloudFile>> {
        let mut files = Vec::new();
        for (path, name) in self.entries().await? {
            match self.describe(&path, name).await {
                Ok(file) => files.push(file),
                // Removed between listing and stat by another device.
                Err(e) => warn!("Skipping {}: {e}", path.display()),
            }
        }

        files.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
        Ok(files)
    }

    async fn upload(&self, name: &str, content: &[u8]) -> SyncResult<CloudFile> {
        self.config.base.check_size(content.len())?;
        let dir = self.backup_dir().await?;
        let target = dir.join(name);
        debug!("Writing {} ({} bytes)", target.display(), content.len());

        // Readers never see a half-written file.
        let staging = dir.join(format!(".{name}.partial"));
        fs::write(&staging, content)
            .await
            .map_err(remote_err("failed to write file"))?;
        fs::rename(&staging, &target)
            .await
            .map_err(remote_err("failed to move file into place"))?;

        self.describe(&target, name.to_string()).await
    }

    async fn download(&self, file_id: &str) -> SyncResult<Vec<u8>> {
        let path = self
            .locate(file_id)
            .await?
            .ok_or_else(|| SyncError::Remote(format!("file not found: {file_id}")))?;

        debug!("Reading {}", path.display());
        fs::read(&path).await.map_err(remote_err("failed to read file"))
    }

    async fn delete(&self, file_id: &str) -> SyncResult<()> {
        let Some(path) = self.locate(file_id).await? else {
            return Ok(());
        };

        fs::remove_file(&path)
            .await
            .map_err(remote_err("failed to delete file"))?;
        debug!("Deleted {}", path.display());
        Ok(())
    }

    async fn ensure_sync_folder(&self) -> SyncResult<()> {
        self.backup_dir().await.map(|_| ())
    }
}
