#![allow(dead_code)]

use async_trait::async_trait;
use fieldlog_storage::{attachment_ref_for, LocalStore, StorageError, StorageResult};
use fieldlog_sync::{MemoryRemote, StatusEvent, Subscription, SyncConfig, SyncEngine, SyncStatus};
use fieldlog_types::{PreferenceSet, Record, RecordId, Timestamp};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Purely in-memory local store. No blocking pool, so it behaves
/// deterministically under a paused tokio clock.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<Record>>,
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    preferences: Mutex<Option<PreferenceSet>>,
    fail_replace: Mutex<bool>,
}

impl MemoryStore {
    pub fn with_records(records: Vec<Record>) -> Self {
        let store = Self::default();
        *store.records.lock().unwrap() = records;
        store
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }

    pub fn record(&self, id: &str) -> Option<Record> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id.as_str() == id)
            .cloned()
    }

    pub fn insert_blob(&self, data: &[u8]) -> String {
        let local_ref = attachment_ref_for(data);
        self.blobs.lock().unwrap().insert(local_ref.clone(), data.to_vec());
        local_ref
    }

    pub fn blob(&self, local_ref: &str) -> Option<Vec<u8>> {
        self.blobs.lock().unwrap().get(local_ref).cloned()
    }

    pub fn set_preferences(&self, preferences: PreferenceSet) {
        *self.preferences.lock().unwrap() = Some(preferences);
    }

    pub fn preferences(&self) -> PreferenceSet {
        self.preferences.lock().unwrap().clone().unwrap_or_default()
    }

    pub fn fail_replace(&self, fail: bool) {
        *self.fail_replace.lock().unwrap() = fail;
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn get_all_records(&self) -> StorageResult<Vec<Record>> {
        Ok(self.records())
    }

    async fn get_record(&self, id: &RecordId) -> StorageResult<Option<Record>> {
        Ok(self.record(id.as_str()))
    }

    async fn put_record(&self, record: &Record) -> StorageResult<()> {
        let mut records = self.records.lock().unwrap();
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(slot) => *slot = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(())
    }

    async fn delete_record(&self, id: &RecordId) -> StorageResult<()> {
        self.records.lock().unwrap().retain(|r| &r.id != id);
        Ok(())
    }

    async fn replace_all_records(&self, records: &[Record]) -> StorageResult<()> {
        if *self.fail_replace.lock().unwrap() {
            return Err(StorageError::InvalidData("disk full".to_string()));
        }
        *self.records.lock().unwrap() = records.to_vec();
        Ok(())
    }

    async fn get_attachment(&self, local_ref: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.blob(local_ref))
    }

    async fn put_attachment(&self, data: &[u8]) -> StorageResult<String> {
        Ok(self.insert_blob(data))
    }

    async fn get_preferences(&self) -> StorageResult<PreferenceSet> {
        Ok(self.preferences())
    }

    async fn put_preferences(&self, preferences: &PreferenceSet) -> StorageResult<()> {
        self.set_preferences(preferences.clone());
        Ok(())
    }

    async fn purge_tombstones(&self, cutoff: Timestamp) -> StorageResult<usize> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| !(r.is_deleted && r.updated_at < cutoff));
        Ok(before - records.len())
    }
}

pub fn ts(millis: u64) -> Timestamp {
    Timestamp::from_millis(millis)
}

pub fn record(id: &str, updated: u64) -> Record {
    Record::with_timestamps(id, ts(1), ts(updated)).with_field("species", "heron")
}

pub fn tombstone(id: &str, updated: u64) -> Record {
    let mut r = Record::with_timestamps(id, ts(1), ts(updated));
    r.is_deleted = true;
    r
}

pub fn ids(records: &[Record]) -> Vec<&str> {
    records.iter().map(|r| r.id.as_str()).collect()
}

pub async fn connect(local: &Arc<MemoryStore>, remote: &Arc<MemoryRemote>) -> Arc<SyncEngine> {
    connect_with(local, remote, SyncConfig::default()).await
}

pub async fn connect_with(
    local: &Arc<MemoryStore>,
    remote: &Arc<MemoryRemote>,
    config: SyncConfig,
) -> Arc<SyncEngine> {
    SyncEngine::connect(local.clone(), remote.clone(), config)
        .await
        .unwrap()
}

/// Collects every status the engine publishes.
pub fn record_statuses(engine: &SyncEngine) -> (Arc<Mutex<Vec<SyncStatus>>>, Subscription) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let sub = engine.subscribe(move |event: &StatusEvent| {
        sink.lock().unwrap().push(event.status.clone());
    });
    (seen, sub)
}
