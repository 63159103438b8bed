//! Attachment transfer between the local and remote stores.
//!
//! Runs over the merged record set after reconciliation. A record whose blob
//! exists on only one side gets copied across and its missing reference
//! filled in. Transfers go one at a time in record order, and each updated
//! record is written back to the local store right away so a crash cannot
//! lose a linkage that was already paid for.
//!
//! A failed transfer never fails the cycle. It is logged and reported, and
//! the record keeps its incomplete linkage until the next run picks it up.

use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteStore;
use fieldlog_storage::LocalStore;
use fieldlog_types::{Record, RecordId};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Which way a blob was moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    Upload,
    Download,
}

/// One transfer that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentFailure {
    pub id: RecordId,
    pub direction: TransferDirection,
    pub message: String,
}

/// Outcome of an attachment pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttachmentReport {
    pub uploaded: usize,
    pub downloaded: usize,
    pub failures: Vec<AttachmentFailure>,
}

impl AttachmentReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Moves attachment blobs guided by each record's reference fields.
pub struct AttachmentSynchronizer<'a> {
    local: &'a dyn LocalStore,
    remote: &'a dyn RemoteStore,
}

impl<'a> AttachmentSynchronizer<'a> {
    pub fn new(local: &'a dyn LocalStore, remote: &'a dyn RemoteStore) -> Self {
        Self { local, remote }
    }

    /// Uploads local-only blobs and downloads remote-only blobs.
    pub async fn run(&self, records: &mut [Record]) -> AttachmentReport {
        self.pass(records, true).await
    }

    /// Downloads remote-only blobs and leaves local-only ones alone.
    pub async fn download_missing(&self, records: &mut [Record]) -> AttachmentReport {
        self.pass(records, false).await
    }

    async fn pass(&self, records: &mut [Record], with_uploads: bool) -> AttachmentReport {
        let mut report = AttachmentReport::default();

        for record in records.iter_mut() {
            let direction = if with_uploads && record.needs_attachment_upload() {
                TransferDirection::Upload
            } else if record.needs_attachment_download() {
                TransferDirection::Download
            } else {
                continue;
            };

            let result = match direction {
                TransferDirection::Upload => self.upload(record).await,
                TransferDirection::Download => self.download(record).await,
            };

            match result {
                Ok(()) => match direction {
                    TransferDirection::Upload => report.uploaded += 1,
                    TransferDirection::Download => report.downloaded += 1,
                },
                Err(e) => {
                    warn!(
                        "Attachment {:?} for record {} failed, will retry next sync: {e}",
                        direction, record.id
                    );
                    report.failures.push(AttachmentFailure {
                        id: record.id.clone(),
                        direction,
                        message: e.user_message(),
                    });
                }
            }
        }

        if report.uploaded + report.downloaded > 0 || !report.failures.is_empty() {
            info!(
                "Attachments: {} uploaded, {} downloaded, {} failed",
                report.uploaded,
                report.downloaded,
                report.failures.len()
            );
        }
        report
    }

    async fn upload(&self, record: &mut Record) -> SyncResult<()> {
        let Some(local_ref) = record.attachment_local_ref.clone() else {
            return Ok(());
        };

        let data = self
            .local
            .get_attachment(&local_ref)
            .await?
            .ok_or_else(|| SyncError::AttachmentMissing(local_ref.clone()))?;

        let handle = self.remote.upload_attachment(&data).await?;
        debug!("Uploaded attachment {} as {}", local_ref, handle);

        record.attachment_remote_ref = Some(handle);
        self.local.put_record(record).await?;
        Ok(())
    }

    async fn download(&self, record: &mut Record) -> SyncResult<()> {
        let Some(handle) = record.attachment_remote_ref.clone() else {
            return Ok(());
        };

        let data = self.remote.download_attachment(&handle).await?;
        let local_ref = self.local.put_attachment(&data).await?;
        debug!("Downloaded attachment {} as {}", handle, local_ref);

        record.attachment_local_ref = Some(local_ref);
        self.local.put_record(record).await?;
        Ok(())
    }
}

/// Restores device-local attachment refs that the remote copy cannot carry.
///
/// Local refs are stripped from the pushed document, so a remote version
/// that wins the merge arrives without one. The previous local ref is kept
/// when
/// - the winner points at the same remote blob (reused, not downloaded again), or
/// - neither version has a remote blob: the photo was never uploaded and
///   the next upload pass picks it up.
pub fn carry_local_refs(merged: &mut [Record], previous: &[Record]) {
    let known: HashMap<&RecordId, &Record> = previous
        .iter()
        .filter(|r| r.attachment_local_ref.is_some())
        .map(|r| (&r.id, r))
        .collect();

    for record in merged
        .iter_mut()
        .filter(|r| !r.is_deleted && r.attachment_local_ref.is_none())
    {
        let Some(prev) = known.get(&record.id) else {
            continue;
        };
        let same_blob = record.attachment_remote_ref.is_some()
            && prev.attachment_remote_ref == record.attachment_remote_ref;
        let unsent =
            record.attachment_remote_ref.is_none() && prev.attachment_remote_ref.is_none();
        if same_blob || unsent {
            record.attachment_local_ref = prev.attachment_local_ref.clone();
        }
    }
}

/// Links blobs another device uploaded for a version this device already has.
///
/// Uploading does not bump `updatedAt`, so a device holding the same version
/// keeps its copy in the merge and never sees the new handle. When the kept
/// version has no attachment refs and the remote copy at the same `updatedAt`
/// has a remote ref, that ref is taken over and the download pass fetches it.
pub fn adopt_remote_refs(merged: &mut [Record], remote: &[Record]) {
    let uploaded: HashMap<&RecordId, &Record> = remote
        .iter()
        .filter(|r| !r.is_deleted && r.attachment_remote_ref.is_some())
        .map(|r| (&r.id, r))
        .collect();

    for record in merged
        .iter_mut()
        .filter(|r| !r.is_deleted && !r.has_attachment())
    {
        if let Some(theirs) = uploaded.get(&record.id)
            && theirs.updated_at == record.updated_at
        {
            record.attachment_remote_ref = theirs.attachment_remote_ref.clone();
        }
    }
}

/// Copy of `records` with device-local attachment refs removed.
#[must_use]
pub fn strip_local_refs(records: &[Record]) -> Vec<Record> {
    records
        .iter()
        .map(|r| Record {
            attachment_local_ref: None,
            ..r.clone()
        })
        .collect()
}
