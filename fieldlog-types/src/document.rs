//! The remote backup document.

use crate::{PreferenceSet, Record};
use serde::{Deserialize, Serialize};

/// The single structured object stored remotely: every live record plus
/// the preference set. Attachments are separate blobs referenced from the
/// records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupDocument {
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default)]
    pub preferences: PreferenceSet,
}

impl BackupDocument {
    /// Creates a document from its parts.
    #[must_use]
    pub fn new(records: Vec<Record>, preferences: PreferenceSet) -> Self {
        Self {
            records,
            preferences,
        }
    }

    /// Serializes the document to JSON bytes.
    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parses a document from JSON bytes.
    ///
    /// Anything that is not a well-formed document (bad JSON, wrong shape,
    /// records without ids) yields `None`: a corrupted backup degrades to
    /// "no remote data" rather than blocking sync.
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let doc: Self = serde_json::from_slice(bytes).ok()?;
        if doc.records.iter().any(|r| r.id.as_str().trim().is_empty()) {
            return None;
        }
        Some(doc)
    }

    /// Returns a copy without tombstoned records.
    ///
    /// The canonical remote snapshot never accumulates tombstones.
    #[must_use]
    pub fn without_tombstones(&self) -> Self {
        Self {
            records: self.records.iter().filter(|r| !r.is_deleted).cloned().collect(),
            preferences: self.preferences.clone(),
        }
    }
}
