//! The local store contract.

use crate::error::StorageResult;
use async_trait::async_trait;
use fieldlog_types::{PreferenceSet, Record, RecordId, Timestamp};
use sha2::{Digest, Sha256};

/// Durable, transactional device store.
///
/// Every method is a suspension point for the sync cycle. Implementations
/// must make [`LocalStore::replace_all_records`] atomic: readers see either
/// the old set or the new one, never a mix.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Returns every record, tombstones included, in insertion order.
    async fn get_all_records(&self) -> StorageResult<Vec<Record>>;

    /// Returns one record by id.
    async fn get_record(&self, id: &RecordId) -> StorageResult<Option<Record>>;

    /// Inserts or overwrites one record.
    async fn put_record(&self, record: &Record) -> StorageResult<()>;

    /// Physically removes one record. The sync engine never calls this; the
    /// UI layer tombstones instead.
    async fn delete_record(&self, id: &RecordId) -> StorageResult<()>;

    /// Atomically replaces the whole record set.
    async fn replace_all_records(&self, records: &[Record]) -> StorageResult<()>;

    /// Fetches an attachment blob.
    async fn get_attachment(&self, local_ref: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Stores an attachment blob and returns its local ref.
    async fn put_attachment(&self, data: &[u8]) -> StorageResult<String>;

    /// Returns the stored preferences, or defaults if none were saved yet.
    async fn get_preferences(&self) -> StorageResult<PreferenceSet>;

    /// Overwrites the stored preferences.
    async fn put_preferences(&self, preferences: &PreferenceSet) -> StorageResult<()>;

    /// Removes tombstones whose `updatedAt` is before `cutoff`. Returns how
    /// many were removed.
    async fn purge_tombstones(&self, cutoff: Timestamp) -> StorageResult<usize>;
}

/// Content-addressed local ref for an attachment.
///
/// Storing the same bytes twice yields the same ref, which keeps re-run
/// downloads from piling up duplicate blobs.
#[must_use]
pub fn attachment_ref_for(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    format!("att-{}", hex::encode(digest))
}
