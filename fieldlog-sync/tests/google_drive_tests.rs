use fieldlog_sync::cloud::google_drive::{GoogleDriveConfig, GoogleDriveStorage};
use fieldlog_sync::cloud::CloudStorage;
use fieldlog_sync::SyncError;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use wiremock::matchers::{body_string_contains, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockBuilder, MockServer, Request, ResponseTemplate};

const FILES: &str = "/drive/v3/files";

fn on(verb: &str, route: &str) -> MockBuilder {
    Mock::given(method(verb)).and(path(route.to_string()))
}

fn json_ok(body: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

fn config_for(server: &MockServer) -> GoogleDriveConfig {
    GoogleDriveConfig {
        client_id: "cid".to_string(),
        client_secret: "secret".to_string(),
        api_base_url: server.uri(),
        oauth_base_url: server.uri(),
        ..Default::default()
    }
}

/// A mock Drive plus a transport signed in with `token`.
async fn drive() -> (MockServer, GoogleDriveStorage) {
    let server = MockServer::start().await;
    let storage = GoogleDriveStorage::with_access_token(config_for(&server), "token")
        .await
        .unwrap();
    (server, storage)
}

/// Every folder lookup finds `folder_id`.
async fn folders_exist(server: &MockServer) {
    on("GET", FILES)
        .and(query_param("fields", "files(id,name)"))
        .respond_with(json_ok(json!({"files": [{"id": "folder_id", "name": "FieldLog"}]})))
        .expect(1..)
        .mount(server)
        .await;
}

/// Transport whose access token is already past its expiry.
async fn stale_session(server: &MockServer, refresh: Option<&str>) -> GoogleDriveStorage {
    let storage = GoogleDriveStorage::new(config_for(server)).unwrap();
    storage
        .set_tokens_with_expiry("stale".to_string(), refresh.map(str::to_string), 0)
        .await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    storage
}

// ── Configuration ───────────────────────────────────────────────

#[test]
fn config_defaults_point_at_google() {
    let cfg = GoogleDriveConfig::default();
    assert_eq!(cfg.base.sync_folder, "FieldLog/backup");
    assert!(cfg.client_id.is_empty() && cfg.client_secret.is_empty());
    assert_eq!(cfg.api_base_url, "https://www.googleapis.com");
    assert_eq!(cfg.oauth_base_url, "https://oauth2.googleapis.com");
    assert_eq!(cfg.timeout_secs, 60);
}

#[test]
fn config_reads_flattened_base_fields() {
    let cfg: GoogleDriveConfig =
        serde_json::from_str(r#"{"client_id":"my_id","sync_folder":"Trips/2024"}"#).unwrap();
    assert_eq!(cfg.client_id, "my_id");
    assert_eq!(cfg.base.sync_folder, "Trips/2024");
    assert_eq!(cfg.api_base_url, "https://www.googleapis.com");
}

// ── Sign-in state ───────────────────────────────────────────────

#[tokio::test]
async fn sign_in_and_out() {
    let storage = GoogleDriveStorage::new(GoogleDriveConfig::default()).unwrap();
    assert_eq!(storage.provider_name(), "Google Drive");
    assert!(!storage.is_authenticated());

    storage
        .set_tokens("access".to_string(), Some("refresh".to_string()))
        .await;
    assert!(storage.is_authenticated());

    storage.clear_tokens().await;
    assert!(!storage.is_authenticated());
}

#[tokio::test]
async fn requests_without_tokens_fail_with_auth() {
    let storage = GoogleDriveStorage::new(GoogleDriveConfig::default()).unwrap();
    assert!(matches!(storage.list_files().await, Err(SyncError::Auth(_))));
}

// ── Listing ─────────────────────────────────────────────────────

#[tokio::test]
async fn empty_folder_lists_nothing() {
    let (server, storage) = drive().await;
    folders_exist(&server).await;
    on("GET", FILES)
        .and(query_param("pageSize", "100"))
        .respond_with(json_ok(json!({"files": []})))
        .expect(1..)
        .mount(&server)
        .await;

    assert!(storage.list_files().await.unwrap().is_empty());
}

#[tokio::test]
async fn listing_follows_next_page_token() {
    let (server, storage) = drive().await;
    folders_exist(&server).await;
    // Mounted first so it wins over the generic page below.
    on("GET", FILES)
        .and(query_param("pageToken", "page2"))
        .respond_with(json_ok(json!({"files": [
            {"id": "f2", "name": "b.bin", "size": "7", "modifiedTime": "2024-01-02T00:00:00.250Z"}
        ]})))
        .mount(&server)
        .await;
    on("GET", FILES)
        .and(query_param("pageSize", "100"))
        .respond_with(json_ok(json!({
            "files": [{"id": "f1", "name": "a.bin", "size": "3"}],
            "nextPageToken": "page2"
        })))
        .mount(&server)
        .await;

    let files = storage.list_files().await.unwrap();

    let ids: Vec<_> = files.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, ["f1", "f2"]);
    let second = &files[1];
    assert_eq!(second.size, 7);
    assert_eq!(second.path, "FieldLog/backup/b.bin");
    let millis = second.modified_at.duration_since(UNIX_EPOCH).unwrap().as_millis();
    assert_eq!(millis % 1000, 250);
}

#[tokio::test]
async fn find_files_puts_name_in_query() {
    let (server, storage) = drive().await;
    folders_exist(&server).await;
    on("GET", FILES)
        .and(query_param(
            "q",
            "'folder_id' in parents and trashed = false and mimeType != 'application/vnd.google-apps.folder' and name = 'fieldlog-backup.json'",
        ))
        .respond_with(json_ok(json!({"files": [{"id": "doc1", "name": "fieldlog-backup.json"}]})))
        .expect(1)
        .mount(&server)
        .await;

    let found = storage.find_files("fieldlog-backup.json").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "doc1");
}

// ── Transfers ───────────────────────────────────────────────────

#[tokio::test]
async fn multipart_upload_then_media_download() {
    let (server, storage) = drive().await;
    folders_exist(&server).await;
    Mock::given(method("POST"))
        .and(path_regex("^/upload/drive/v3/files"))
        .and(query_param("uploadType", "multipart"))
        .and(header("authorization", "Bearer token"))
        .and(body_string_contains("\"name\":\"photo.bin\""))
        .respond_with(json_ok(json!({
            "id": "file_123",
            "name": "photo.bin",
            "size": "5",
            "modifiedTime": "2024-01-01T00:00:00Z",
            "md5Checksum": "abc123"
        })))
        .mount(&server)
        .await;
    on("GET", "/drive/v3/files/file_123")
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()))
        .mount(&server)
        .await;

    let uploaded = storage.upload("photo.bin", b"hello").await.unwrap();
    assert_eq!(uploaded.id, "file_123");
    assert_eq!(uploaded.name, "photo.bin");
    assert_eq!(uploaded.content_hash.as_deref(), Some("abc123"));

    assert_eq!(storage.download("file_123").await.unwrap(), b"hello");
}

#[tokio::test]
async fn oversized_upload_never_reaches_the_network() {
    let server = MockServer::start().await;
    let mut config = config_for(&server);
    config.base.max_file_size = 4;
    let storage = GoogleDriveStorage::with_access_token(config, "token")
        .await
        .unwrap();

    let result = storage.upload("big.bin", b"too big").await;

    assert!(matches!(
        result,
        Err(SyncError::FileTooLarge { size: 7, limit: 4 })
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn server_error_on_upload_is_network_error() {
    let (server, storage) = drive().await;
    folders_exist(&server).await;
    Mock::given(method("POST"))
        .and(path_regex("^/upload/drive/v3/files"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend unavailable"))
        .mount(&server)
        .await;

    let result = storage.upload("x.bin", b"data").await;
    assert!(matches!(result, Err(SyncError::Network(_))));
}

#[tokio::test]
async fn rejected_credentials_are_auth_errors_with_body() {
    let (server, storage) = drive().await;
    on("GET", "/drive/v3/files/abc")
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid credentials"))
        .mount(&server)
        .await;

    let err = storage.download("abc").await.unwrap_err();
    assert!(matches!(err, SyncError::Auth(_)));
    assert!(err.user_message().contains("invalid credentials"));
}

#[tokio::test]
async fn missing_file_download_fails() {
    let (server, storage) = drive().await;
    on("GET", "/drive/v3/files/nope")
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    assert!(matches!(
        storage.download("nope").await,
        Err(SyncError::Network(_))
    ));
}

// ── Delete ──────────────────────────────────────────────────────

#[tokio::test]
async fn delete_sends_delete() {
    let (server, storage) = drive().await;
    on("DELETE", "/drive/v3/files/old_doc")
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    storage.delete("old_doc").await.unwrap();
}

#[tokio::test]
async fn deleting_a_gone_file_succeeds() {
    let (server, storage) = drive().await;
    on("DELETE", "/drive/v3/files/gone")
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    storage.delete("gone").await.unwrap();
}

#[tokio::test]
async fn delete_server_error_is_reported() {
    let (server, storage) = drive().await;
    on("DELETE", "/drive/v3/files/stuck")
        .respond_with(ResponseTemplate::new(500).set_body_string("error"))
        .mount(&server)
        .await;

    assert!(storage.delete("stuck").await.is_err());
}

// ── Folder resolution ───────────────────────────────────────────

#[tokio::test]
async fn missing_path_segments_are_created_once() {
    let (server, storage) = drive().await;
    on("GET", FILES)
        .and(query_param("fields", "files(id,name)"))
        .respond_with(json_ok(json!({"files": []})))
        .expect(2)
        .mount(&server)
        .await;

    let created = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&created);
    on("POST", FILES)
        .respond_with(move |_: &Request| {
            let (id, name) = match counter.fetch_add(1, Ordering::SeqCst) {
                0 => ("id_fieldlog", "FieldLog"),
                _ => ("id_backup", "backup"),
            };
            json_ok(json!({"id": id, "name": name}))
        })
        .expect(2)
        .mount(&server)
        .await;

    storage.ensure_sync_folder().await.unwrap();
    // Second call is served from the cache.
    storage.ensure_sync_folder().await.unwrap();

    assert_eq!(created.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn forbidden_folder_creation_is_auth_error() {
    let (server, storage) = drive().await;
    on("GET", FILES)
        .and(query_param("fields", "files(id,name)"))
        .respond_with(json_ok(json!({"files": []})))
        .mount(&server)
        .await;
    on("POST", FILES)
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    assert!(matches!(
        storage.ensure_sync_folder().await,
        Err(SyncError::Auth(_))
    ));
}

// ── Token refresh ───────────────────────────────────────────────

#[tokio::test]
async fn stale_token_is_refreshed_before_the_request() {
    let server = MockServer::start().await;
    on("POST", "/token")
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh"))
        .respond_with(json_ok(json!({"access_token": "fresh", "expires_in": 3600})))
        .expect(1)
        .mount(&server)
        .await;
    on("GET", "/drive/v3/files/f1")
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
        .expect(2)
        .mount(&server)
        .await;

    let storage = stale_session(&server, Some("refresh")).await;

    assert_eq!(storage.download("f1").await.unwrap(), b"ok");
    // The refreshed token is good for an hour; no second exchange.
    assert_eq!(storage.download("f1").await.unwrap(), b"ok");
}

#[tokio::test]
async fn stale_token_without_refresh_token_is_auth_error() {
    let server = MockServer::start().await;
    let storage = stale_session(&server, None).await;

    assert!(matches!(
        storage.download("f1").await,
        Err(SyncError::Auth(_))
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn revoked_refresh_token_is_auth_error() {
    let server = MockServer::start().await;
    on("POST", "/token")
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .mount(&server)
        .await;

    let storage = stale_session(&server, Some("revoked")).await;

    assert!(matches!(
        storage.download("f1").await,
        Err(SyncError::Auth(_))
    ));
}
