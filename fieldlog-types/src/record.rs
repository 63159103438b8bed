//! The logged observation entity.
//!
//! A record's descriptive fields (species, notes, coordinates, ...) belong to
//! the UI layer and are carried as an opaque JSON map. The sync engine only
//! reads `id`, `updatedAt` and `isDeleted`, and only ever writes the two
//! attachment reference fields.

use crate::{RecordId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One logged observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Stable identifier, assigned at creation.
    pub id: RecordId,
    /// Immutable creation time.
    pub created_at: Timestamp,
    /// Time of the last mutation.
    pub updated_at: Timestamp,
    /// Tombstone flag. A deleted record keeps its id for merge purposes only.
    #[serde(default)]
    pub is_deleted: bool,
    /// Handle of the attachment blob in the local store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_local_ref: Option<String>,
    /// Handle of the attachment blob in the remote store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_remote_ref: Option<String>,
    /// Descriptive payload, opaque to the engine.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Creates a new live record with a fresh id.
    #[must_use]
    pub fn new(fields: Map<String, Value>) -> Self {
        let now = Timestamp::now();
        Self {
            id: RecordId::new(),
            created_at: now,
            updated_at: now,
            is_deleted: false,
            attachment_local_ref: None,
            attachment_remote_ref: None,
            fields,
        }
    }

    /// Creates a record with explicit id and timestamps (for replay and tests).
    #[must_use]
    pub fn with_timestamps(
        id: impl Into<RecordId>,
        created_at: Timestamp,
        updated_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            created_at,
            updated_at,
            is_deleted: false,
            attachment_local_ref: None,
            attachment_remote_ref: None,
            fields: Map::new(),
        }
    }

    /// Sets a descriptive field, builder style.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Sets the local attachment reference, builder style.
    #[must_use]
    pub fn with_local_attachment(mut self, local_ref: impl Into<String>) -> Self {
        self.attachment_local_ref = Some(local_ref.into());
        self
    }

    /// Sets the remote attachment reference, builder style.
    #[must_use]
    pub fn with_remote_attachment(mut self, remote_ref: impl Into<String>) -> Self {
        self.attachment_remote_ref = Some(remote_ref.into());
        self
    }

    /// Bumps `updatedAt` after a mutation.
    pub fn touch(&mut self) {
        self.updated_at = self.updated_at.tick();
    }

    /// Marks the record deleted.
    ///
    /// Descriptive fields and attachment references are dropped: a tombstone
    /// carries nothing but its identity and the time of deletion.
    pub fn tombstone(&mut self) {
        self.is_deleted = true;
        self.fields.clear();
        self.attachment_local_ref = None;
        self.attachment_remote_ref = None;
        self.touch();
    }

    /// Returns true if either attachment reference is set.
    #[must_use]
    pub fn has_attachment(&self) -> bool {
        self.attachment_local_ref.is_some() || self.attachment_remote_ref.is_some()
    }

    /// Local blob exists but has never been uploaded.
    #[must_use]
    pub fn needs_attachment_upload(&self) -> bool {
        !self.is_deleted
            && self.attachment_local_ref.is_some()
            && self.attachment_remote_ref.is_none()
    }

    /// Remote blob exists but has not been fetched to this device.
    #[must_use]
    pub fn needs_attachment_download(&self) -> bool {
        !self.is_deleted
            && self.attachment_remote_ref.is_some()
            && self.attachment_local_ref.is_none()
    }
}
