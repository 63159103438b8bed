//! Google Drive transport (Drive API v3).
//!
//! The sign-in flow runs in the UI layer and hands over an access token,
//! optionally with a refresh token. When the access token has a known expiry
//! and a refresh token is present, a new access token is fetched before the
//! first request that would otherwise use a stale one.

use super::storage::{CloudFile, CloudStorage, CloudStorageConfig};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tracing::{debug, info};

const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const LIST_FIELDS: &str = "nextPageToken,files(id,name,size,modifiedTime,md5Checksum,mimeType)";
const FOLDER_FIELDS: &str = "files(id,name)";
const UPLOAD_FIELDS: &str = "id,name,size,modifiedTime,md5Checksum";
const PAGE_SIZE: &str = "100";
const MULTIPART_BOUNDARY: &str = "fieldlog_backup_boundary";
/// Refreshed tokens are treated as expired this long before Google says so.
const EXPIRY_MARGIN_SECS: u64 = 60;

/// Settings for the Google Drive transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleDriveConfig {
    /// OAuth2 client id, used only for refreshing.
    pub client_id: String,
    /// OAuth2 client secret, used only for refreshing.
    pub client_secret: String,
    #[serde(flatten)]
    pub base: CloudStorageConfig,
    /// Drive API root, e.g. `https://www.googleapis.com`.
    pub api_base_url: String,
    /// OAuth2 root, e.g. `https://oauth2.googleapis.com`.
    pub oauth_base_url: String,
    pub timeout_secs: u64,
}

impl Default for GoogleDriveConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            base: CloudStorageConfig::default(),
            api_base_url: "https://www.googleapis.com".to_string(),
            oauth_base_url: "https://oauth2.googleapis.com".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone)]
struct Session {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<SystemTime>,
}

impl Session {
    fn is_stale(&self) -> bool {
        self.expires_at.is_some_and(|at| SystemTime::now() >= at)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListing {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    size: Option<String>,
    modified_time: Option<String>,
    md5_checksum: Option<String>,
}

impl DriveFile {
    fn into_cloud_file(self, folder: &str) -> CloudFile {
        let modified_at = self
            .modified_time
            .as_deref()
            .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
            .map(|dt| UNIX_EPOCH + Duration::from_millis(dt.timestamp_millis().max(0) as u64))
            .unwrap_or(UNIX_EPOCH);

        CloudFile {
            path: format!("{folder}/{}", self.name),
            size: self.size.and_then(|s| s.parse().ok()).unwrap_or(0),
            id: self.id,
            name: self.name,
            modified_at,
            content_hash: self.md5_checksum,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
}

/// Escapes a value for a single-quoted Drive query literal.
fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Builds a `multipart/related` body: JSON metadata part, then raw content.
fn multipart_body(metadata: &serde_json::Value, content: &[u8]) -> Vec<u8> {
    let head = format!(
        "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n\
         --{b}\r\nContent-Type: application/octet-stream\r\n\r\n",
        b = MULTIPART_BOUNDARY
    );
    let tail = format!("\r\n--{MULTIPART_BOUNDARY}--");

    let mut body = Vec::with_capacity(head.len() + content.len() + tail.len());
    body.extend_from_slice(head.as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(tail.as_bytes());
    body
}

async fn describe_failure(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("HTTP {status}: {body}")
}

/// [`CloudStorage`] over a user's Google Drive.
pub struct GoogleDriveStorage {
    config: GoogleDriveConfig,
    client: Client,
    session: Arc<RwLock<Option<Session>>>,
    folder_id: Arc<RwLock<Option<String>>>,
}

impl GoogleDriveStorage {
    pub fn new(config: GoogleDriveConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SyncError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            session: Arc::new(RwLock::new(None)),
            folder_id: Arc::new(RwLock::new(None)),
        })
    }

    /// Creates a transport that is already signed in.
    pub async fn with_access_token(
        config: GoogleDriveConfig,
        access_token: impl Into<String>,
    ) -> SyncResult<Self> {
        let storage = Self::new(config)?;
        storage.set_tokens(access_token.into(), None).await;
        Ok(storage)
    }

    /// Installs tokens from the sign-in flow. The access token never expires
    /// locally; a 401 surfaces as [`SyncError::Auth`].
    pub async fn set_tokens(&self, access_token: String, refresh_token: Option<String>) {
        self.install(Session {
            access_token,
            refresh_token,
            expires_at: None,
        })
        .await;
    }

    /// Installs tokens whose access token expires `expires_in_secs` from now.
    pub async fn set_tokens_with_expiry(
        &self,
        access_token: String,
        refresh_token: Option<String>,
        expires_in_secs: u64,
    ) {
        self.install(Session {
            access_token,
            refresh_token,
            expires_at: Some(SystemTime::now() + Duration::from_secs(expires_in_secs)),
        })
        .await;
    }

    /// Signs out. The cached folder id goes too, since it belonged to that account.
    pub async fn clear_tokens(&self) {
        *self.session.write().await = None;
        *self.folder_id.write().await = None;
    }

    async fn install(&self, session: Session) {
        *self.session.write().await = Some(session);
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.config.api_base_url)
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/{}", self.files_url(), urlencoding::encode(file_id))
    }

    /// Returns a usable access token, refreshing a stale one first.
    async fn bearer(&self) -> SyncResult<String> {
        let session = self
            .session
            .read()
            .await
            .clone()
            .ok_or_else(|| SyncError::Auth("not authenticated".to_string()))?;

        if !session.is_stale() {
            return Ok(session.access_token);
        }
        let Some(refresh_token) = session.refresh_token else {
            return Err(SyncError::Auth("access token expired".to_string()));
        };
        self.refresh(refresh_token).await
    }

    async fn refresh(&self, refresh_token: String) -> SyncResult<String> {
        debug!("Refreshing Google Drive access token");

        let response = self
            .client
            .post(format!("{}/token", self.config.oauth_base_url))
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("token refresh failed: {e}")))?;

        if !response.status().is_success() {
            let failure = describe_failure(response).await;
            return Err(SyncError::Auth(format!("token refresh failed: {failure}")));
        }

        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Auth(format!("unreadable token response: {e}")))?;

        let expires_at = refreshed.expires_in.map(|secs| {
            SystemTime::now() + Duration::from_secs(secs.saturating_sub(EXPIRY_MARGIN_SECS))
        });
        self.install(Session {
            access_token: refreshed.access_token.clone(),
            refresh_token: refreshed.refresh_token.or(Some(refresh_token)),
            expires_at,
        })
        .await;

        Ok(refreshed.access_token)
    }

    /// Attaches the bearer token and sends, without looking at the status.
    async fn dispatch(&self, request: RequestBuilder, action: &str) -> SyncResult<Response> {
        request
            .bearer_auth(self.bearer().await?)
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("{action} failed: {e}")))
    }

    /// Sends an authorized request. 401 and 403 become [`SyncError::Auth`],
    /// any other failure [`SyncError::Network`].
    async fn send(&self, request: RequestBuilder, action: &str) -> SyncResult<Response> {
        let response = self.dispatch(request, action).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let failure = describe_failure(response).await;
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(SyncError::Auth(format!("{action} failed: {failure}")))
            }
            _ => Err(SyncError::Network(format!("{action} failed: {failure}"))),
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        action: &str,
    ) -> SyncResult<T> {
        self.send(request, action)
            .await?
            .json()
            .await
            .map_err(|e| SyncError::Network(format!("{action}: unreadable response: {e}")))
    }

    /// Resolves the sync folder path one segment at a time, creating the
    /// segments that do not exist yet. The result is cached until sign-out.
    async fn sync_folder(&self) -> SyncResult<String> {
        if let Some(id) = self.folder_id.read().await.clone() {
            return Ok(id);
        }

        let mut parent = "root".to_string();
        for segment in self.config.base.sync_folder.split('/').filter(|s| !s.is_empty()) {
            parent = match self.find_child_folder(&parent, segment).await? {
                Some(id) => id,
                None => self.create_child_folder(&parent, segment).await?,
            };
        }

        *self.folder_id.write().await = Some(parent.clone());
        Ok(parent)
    }

    async fn find_child_folder(&self, parent: &str, name: &str) -> SyncResult<Option<String>> {
        let query = format!(
            "name = '{}' and mimeType = '{FOLDER_MIME}' and '{parent}' in parents and trashed = false",
            quote(name)
        );
        let request = self
            .client
            .get(self.files_url())
            .query(&[("q", query.as_str()), ("fields", FOLDER_FIELDS)]);

        let listing: FileListing = self.send_json(request, "folder search").await?;
        Ok(listing.files.into_iter().next().map(|f| f.id))
    }

    async fn create_child_folder(&self, parent: &str, name: &str) -> SyncResult<String> {
        let request = self.client.post(self.files_url()).json(&serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME,
            "parents": [parent],
        }));

        let created: DriveFile = self.send_json(request, "folder creation").await?;
        info!("Created backup folder: {}", name);
        Ok(created.id)
    }

    /// Lists non-folder files in the sync folder matching `filter`, newest first.
    async fn list_where(&self, filter: &str) -> SyncResult<Vec<CloudFile>> {
        let folder_id = self.sync_folder().await?;
        let query = format!(
            "'{folder_id}' in parents and trashed = false and mimeType != '{FOLDER_MIME}'{filter}"
        );

        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.client.get(self.files_url()).query(&[
                ("q", query.as_str()),
                ("fields", LIST_FIELDS),
                ("orderBy", "modifiedTime desc"),
                ("pageSize", PAGE_SIZE),
            ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: FileListing = self.send_json(request, "file list").await?;
            files.extend(
                page.files
                    .into_iter()
                    .map(|f| f.into_cloud_file(&self.config.base.sync_folder)),
            );

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(files)
    }
}

#[async_trait]
impl CloudStorage for GoogleDriveStorage {
    fn provider_name(&self) -> &'static str {
        "Google Drive"
    }

    fn is_authenticated(&self) -> bool {
        // A held write lock means tokens are being swapped; requests re-check.
        self.session.try_read().map_or(true, |session| session.is_some())
    }

    async fn list_files(&self) -> SyncResult<Vec<CloudFile>> {
        self.list_where("").await
    }

    async fn find_files(&self, name: &str) -> SyncResult<Vec<CloudFile>> {
        self.list_where(&format!(" and name = '{}'", quote(name))).await
    }

    async fn upload(&self, name: &str, content: &[u8]) -> SyncResult<CloudFile> {
        self.config.base.check_size(content.len())?;
        let folder_id = self.sync_folder().await?;
        debug!("Uploading {} ({} bytes)", name, content.len());

        let metadata = serde_json::json!({ "name": name, "parents": [folder_id] });
        let request = self
            .client
            .post(format!("{}/upload/drive/v3/files", self.config.api_base_url))
            .query(&[("uploadType", "multipart"), ("fields", UPLOAD_FIELDS)])
            .header(
                "Content-Type",
                format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(multipart_body(&metadata, content));

        let file: DriveFile = self.send_json(request, "upload").await?;
        info!("Uploaded {} as {}", name, file.id);
        Ok(file.into_cloud_file(&self.config.base.sync_folder))
    }

    async fn download(&self, file_id: &str) -> SyncResult<Vec<u8>> {
        debug!("Downloading {}", file_id);
        let request = self
            .client
            .get(self.file_url(file_id))
            .query(&[("alt", "media")]);

        let bytes = self
            .send(request, "download")
            .await?
            .bytes()
            .await
            .map_err(|e| SyncError::Network(format!("download body failed: {e}")))?;
        Ok(bytes.to_vec())
    }

    async fn delete(&self, file_id: &str) -> SyncResult<()> {
        debug!("Deleting {}", file_id);
        let response = self
            .dispatch(self.client.delete(self.file_url(file_id)), "delete")
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => {
                info!("Deleted {}", file_id);
                Ok(())
            }
            _ => Err(SyncError::Network(format!(
                "delete failed: {}",
                describe_failure(response).await
            ))),
        }
    }

    async fn ensure_sync_folder(&self) -> SyncResult<()> {
        self.sync_folder().await.map(|_| ())
    }
}
