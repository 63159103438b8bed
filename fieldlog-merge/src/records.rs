//! Record-level reconciliation.

use fieldlog_types::{Record, RecordId};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

/// How a single id present on both sides was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Resolution {
    /// Local tombstone: deletion is authoritative once observed.
    LocalDeleted,
    /// Remote tombstone (local still live).
    RemoteDeleted,
    /// Local `updatedAt` strictly newer.
    LocalNewer,
    /// Remote `updatedAt` strictly newer.
    RemoteNewer,
    /// Equal timestamps. Local is kept and nothing is transferred.
    Unchanged,
}

impl Resolution {
    /// True if the local version is the one kept.
    #[must_use]
    pub fn keeps_local(self) -> bool {
        matches!(self, Self::LocalDeleted | Self::LocalNewer | Self::Unchanged)
    }
}

/// Decides between the two versions of a record present on both sides.
///
/// Equal timestamps resolve to local and are treated as already consistent.
/// Two devices editing within the same millisecond (or with skewed clocks)
/// therefore keep whichever version each side already has.
#[must_use]
pub fn resolve(local: &Record, remote: &Record) -> Resolution {
    if local.is_deleted {
        return Resolution::LocalDeleted;
    }
    if remote.is_deleted {
        return Resolution::RemoteDeleted;
    }
    match local.updated_at.cmp(&remote.updated_at) {
        Ordering::Greater => Resolution::LocalNewer,
        Ordering::Less => Resolution::RemoteNewer,
        Ordering::Equal => Resolution::Unchanged,
    }
}

/// Result of reconciling two record collections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    /// The unified record set: local order first, then remote-only records
    /// in remote order.
    pub merged: Vec<Record>,
    /// Records whose winning version must reach the remote store.
    pub needs_upload: Vec<Record>,
    /// Records whose winning version came from the remote store.
    pub needs_download: Vec<Record>,
}

impl MergeOutcome {
    /// Ids of the upload worklist, in order.
    #[must_use]
    pub fn upload_ids(&self) -> Vec<&RecordId> {
        self.needs_upload.iter().map(|r| &r.id).collect()
    }

    /// Ids of the download worklist, in order.
    #[must_use]
    pub fn download_ids(&self) -> Vec<&RecordId> {
        self.needs_download.iter().map(|r| &r.id).collect()
    }

    /// Summary counts for logging and sync reports.
    #[must_use]
    pub fn stats(&self) -> MergeStats {
        MergeStats {
            merged: self.merged.len(),
            uploaded: self.needs_upload.len(),
            downloaded: self.needs_download.len(),
            tombstones: self.merged.iter().filter(|r| r.is_deleted).count(),
        }
    }
}

/// Counts describing a [`MergeOutcome`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub merged: usize,
    pub uploaded: usize,
    pub downloaded: usize,
    pub tombstones: usize,
}

/// Reconciles the local record set against the remote one.
///
/// If an id appears more than once on the remote side the last occurrence
/// shadows the earlier ones.
#[must_use]
pub fn merge_records(local: &[Record], remote: &[Record]) -> MergeOutcome {
    // Slot per remote id, in first-seen order, so remote-only records come
    // out in a stable order.
    let mut remote_slots: Vec<Option<&Record>> = Vec::with_capacity(remote.len());
    let mut remote_index: HashMap<&RecordId, usize> = HashMap::with_capacity(remote.len());
    for record in remote {
        match remote_index.get(&record.id) {
            Some(&slot) => remote_slots[slot] = Some(record),
            None => {
                remote_index.insert(&record.id, remote_slots.len());
                remote_slots.push(Some(record));
            }
        }
    }

    let mut outcome = MergeOutcome {
        merged: Vec::with_capacity(local.len().max(remote.len())),
        ..Default::default()
    };

    for local_record in local {
        let counterpart = remote_index
            .get(&local_record.id)
            .and_then(|&slot| remote_slots[slot].take());

        let Some(remote_record) = counterpart else {
            outcome.merged.push(local_record.clone());
            outcome.needs_upload.push(local_record.clone());
            continue;
        };

        match resolve(local_record, remote_record) {
            Resolution::LocalDeleted | Resolution::LocalNewer => {
                outcome.merged.push(local_record.clone());
                outcome.needs_upload.push(local_record.clone());
            }
            Resolution::RemoteDeleted | Resolution::RemoteNewer => {
                outcome.merged.push(remote_record.clone());
                outcome.needs_download.push(remote_record.clone());
            }
            Resolution::Unchanged => {
                outcome.merged.push(local_record.clone());
            }
        }
    }

    for remote_record in remote_slots.into_iter().flatten() {
        outcome.merged.push(remote_record.clone());
        outcome.needs_download.push(remote_record.clone());
    }

    outcome
}
