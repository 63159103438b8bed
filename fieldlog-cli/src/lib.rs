//! Configuration and wiring for the `fieldlog` binary.

use anyhow::{bail, Context, Result};
use fieldlog_storage::{LocalStore, SqliteStore};
use fieldlog_sync::{
    CloudRemote, FolderConfig, FolderStorage, GoogleDriveConfig, GoogleDriveStorage,
    RemoteStore, SyncConfig, SyncEngine, SyncReport,
};
use fieldlog_types::BackupDocument;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Google Drive remote settings plus the tokens handed over by sign-in.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct DriveRemoteConfig {
    #[serde(flatten)]
    pub drive: GoogleDriveConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Where the backup lives.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum RemoteConfig {
    Folder(FolderConfig),
    GoogleDrive(DriveRemoteConfig),
}

/// Contents of the `--config` file.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct CliConfig {
    pub sync: SyncConfig,
    pub remote: Option<RemoteConfig>,
}

impl CliConfig {
    /// Reads a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

/// Builds the remote store described by `config`.
pub async fn build_remote(config: &RemoteConfig) -> Result<Arc<dyn RemoteStore>> {
    match config {
        RemoteConfig::Folder(folder) => {
            info!("Using backup folder {}", folder.root.display());
            Ok(Arc::new(CloudRemote::new(FolderStorage::new(folder.clone()))))
        }
        RemoteConfig::GoogleDrive(drive) => {
            let Some(access_token) = drive.access_token.clone() else {
                bail!("Google Drive remote needs an access token (--drive-token)");
            };
            let storage = GoogleDriveStorage::new(drive.drive.clone())
                .context("Failed to set up Google Drive client")?;
            storage
                .set_tokens(access_token, drive.refresh_token.clone())
                .await;
            Ok(Arc::new(CloudRemote::new(storage)))
        }
    }
}

/// Opens the device database and connects an engine to the remote.
pub async fn open_engine(db: &Path, config: &CliConfig) -> Result<Arc<SyncEngine>> {
    let Some(remote_config) = &config.remote else {
        bail!("No remote configured: pass --folder, --drive-token or a config file");
    };

    let local = Arc::new(
        SqliteStore::open(db)
            .with_context(|| format!("Failed to open database {}", db.display()))?,
    );
    let remote = build_remote(remote_config).await?;

    SyncEngine::connect(local, remote, config.sync.clone())
        .await
        .context("Failed to connect to remote")
}

/// Snapshot of the device store as a backup document, tombstones included.
pub async fn export_local(db: &Path) -> Result<BackupDocument> {
    let store = SqliteStore::open(db)
        .with_context(|| format!("Failed to open database {}", db.display()))?;
    let records = store.get_all_records().await?;
    let preferences = store.get_preferences().await?;
    Ok(BackupDocument::new(records, preferences))
}

/// One-line human summary of a sync report.
pub fn summarize(report: &SyncReport) -> String {
    let mut line = format!(
        "{} records ({} tombstones), {} uploaded, {} downloaded, {} pushed",
        report.merge.merged,
        report.merge.tombstones,
        report.merge.uploaded,
        report.merge.downloaded,
        report.pushed,
    );
    let attachments = &report.attachments;
    if attachments.uploaded + attachments.downloaded > 0 {
        line.push_str(&format!(
            "; attachments {} up, {} down",
            attachments.uploaded, attachments.downloaded
        ));
    }
    if !attachments.failures.is_empty() {
        line.push_str(&format!(
            "; {} attachment transfers pending retry",
            attachments.failures.len()
        ));
    }
    if report.purged_tombstones > 0 {
        line.push_str(&format!("; purged {} tombstones", report.purged_tombstones));
    }
    line
}
