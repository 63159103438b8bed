//! Sync orchestrator.
//!
//! One cycle, strictly in this order:
//! 1. load the remote document
//! 2. load local records and preferences
//! 3. merge
//! 4. move attachments (per-record local writes)
//! 5. replace the local record set and preferences
//! 6. push the merged set, minus tombstones, as the new remote document
//!
//! Nothing is written locally before step 4, so a cycle that fails while
//! fetching leaves the device store untouched. Cycles never overlap: a
//! second `sync()` while one is running is rejected without side effects, and
//! a cycle whose future is dropped settles to an error status.

use crate::attachments::{
    adopt_remote_refs, carry_local_refs, strip_local_refs, AttachmentReport, AttachmentSynchronizer,
};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteStore;
use crate::scheduler::AutoSyncHandle;
use crate::status::{StatusEmitter, StatusEvent, Subscription, SyncStatus};
use fieldlog_merge::{merge_preferences, merge_records, MergeStats};
use fieldlog_storage::LocalStore;
use fieldlog_types::{BackupDocument, Record, Timestamp};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Result of one completed sync cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    /// The merged record set now held locally, tombstones included.
    pub records: Vec<Record>,
    pub merge: MergeStats,
    pub attachments: AttachmentReport,
    /// Records written to the remote document.
    pub pushed: usize,
    /// Local tombstones removed by the retention policy.
    pub purged_tombstones: usize,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
}

/// Status message left behind by a cycle whose future was dropped.
const CANCELLED: &str = "sync was cancelled before it finished";

/// Holds the single-flight flag for one cycle and owns its final status.
///
/// `acquire` publishes `Syncing`. A cycle that ends normally calls `settle`;
/// one whose future is dropped mid-way settles to an error on drop, so the
/// status never stays `Syncing` after the flag is released.
struct InFlight<'a> {
    engine: &'a SyncEngine,
    settled: bool,
}

impl<'a> InFlight<'a> {
    fn acquire(engine: &'a SyncEngine) -> SyncResult<Self> {
        engine
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SyncError::AlreadySyncing)?;
        engine.set_status(SyncStatus::Syncing);
        Ok(Self {
            engine,
            settled: false,
        })
    }

    fn settle(mut self, status: SyncStatus) {
        self.settled = true;
        self.engine.set_status(status);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Sync cycle dropped before it finished");
            self.engine.set_status(SyncStatus::Error(CANCELLED.to_string()));
        }
        self.engine.in_flight.store(false, Ordering::Release);
    }
}

/// The sync engine: owns its stores, status and auto-sync timer.
///
/// Engines share nothing with each other; several can run side by side.
pub struct SyncEngine {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    config: SyncConfig,
    status: Mutex<SyncStatus>,
    emitter: StatusEmitter,
    in_flight: AtomicBool,
    auto_sync: Mutex<Option<AutoSyncHandle>>,
}

impl SyncEngine {
    /// Builds an engine after checking that the remote accepts our
    /// credentials. No engine exists for a remote that cannot be reached.
    pub async fn connect(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        config: SyncConfig,
    ) -> SyncResult<Arc<Self>> {
        remote.verify().await?;
        info!(
            "{} connected to {}",
            config.device_name,
            remote.provider_name()
        );

        Ok(Arc::new(Self {
            local,
            remote,
            config,
            status: Mutex::new(SyncStatus::Idle),
            emitter: StatusEmitter::new(),
            in_flight: AtomicBool::new(false),
            auto_sync: Mutex::new(None),
        }))
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &'static str {
        self.remote.provider_name()
    }

    // ── Status ───────────────────────────────────────────────────

    pub fn status(&self) -> SyncStatus {
        self.status.lock().clone()
    }

    /// Message of the failure that put the engine in the error state.
    pub fn last_error(&self) -> Option<String> {
        self.status.lock().error_message().map(str::to_string)
    }

    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Registers a status listener. Listeners run synchronously, in
    /// subscription order, on the task that changes the status.
    pub fn subscribe(
        &self,
        listener: impl Fn(&StatusEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.emitter.subscribe(listener)
    }

    fn set_status(&self, status: SyncStatus) {
        *self.status.lock() = status.clone();
        self.emitter.emit(&StatusEvent::new(status));
    }

    // ── Sync ─────────────────────────────────────────────────────

    /// Runs one full cycle.
    pub async fn sync(&self) -> SyncResult<SyncReport> {
        let cycle = InFlight::acquire(self)?;

        match self.run_cycle().await {
            Ok(report) => {
                cycle.settle(SyncStatus::Idle);
                Ok(report)
            }
            Err(e) => {
                error!("Sync failed: {e}");
                cycle.settle(SyncStatus::Error(e.user_message()));
                Err(e)
            }
        }
    }

    async fn run_cycle(&self) -> SyncResult<SyncReport> {
        let started_at = Timestamp::now();
        info!(
            "Sync started on {} ({})",
            self.config.device_name,
            self.remote.provider_name()
        );

        // 1. Remote snapshot. A missing or malformed document is an empty one.
        let remote_doc = self.remote.load_document().await?.unwrap_or_default();
        debug!("Remote holds {} records", remote_doc.records.len());

        // 2. Local snapshot.
        let local_records = self.local.get_all_records().await?;
        let local_prefs = self.local.get_preferences().await?;
        debug!("Local holds {} records", local_records.len());

        // 3. Merge.
        let outcome = merge_records(&local_records, &remote_doc.records);
        let merge = outcome.stats();
        let preferences = merge_preferences(&local_prefs, &remote_doc.preferences);
        debug!(
            "Merged {} records ({} to upload, {} to download)",
            merge.merged, merge.uploaded, merge.downloaded
        );

        let mut merged = outcome.merged;
        carry_local_refs(&mut merged, &local_records);
        adopt_remote_refs(&mut merged, &remote_doc.records);

        // 4. Attachments. Failures are reported, not raised.
        let attachments = AttachmentSynchronizer::new(self.local.as_ref(), self.remote.as_ref())
            .run(&mut merged)
            .await;

        // 5. Persist locally.
        self.local.replace_all_records(&merged).await?;
        self.local.put_preferences(&preferences).await?;

        let purged_tombstones = match self.config.tombstone_retention() {
            Some(retention) => self.purge_tombstones(&mut merged, retention).await?,
            None => 0,
        };

        // 6. Push. Local refs mean nothing on another device.
        let document =
            BackupDocument::new(strip_local_refs(&merged), preferences).without_tombstones();
        self.remote.save_document(&document).await?;

        let report = SyncReport {
            pushed: document.records.len(),
            records: merged,
            merge,
            attachments,
            purged_tombstones,
            started_at,
            finished_at: Timestamp::now(),
        };

        info!(
            "Sync finished: {} records, {} up, {} down, {} pushed, {} attachment failures",
            report.records.len(),
            report.merge.uploaded,
            report.merge.downloaded,
            report.pushed,
            report.attachments.failures.len()
        );
        Ok(report)
    }

    async fn purge_tombstones(
        &self,
        merged: &mut Vec<Record>,
        retention: Duration,
    ) -> SyncResult<usize> {
        let cutoff = Timestamp::now().saturating_sub(retention);
        let purged = self.local.purge_tombstones(cutoff).await?;
        merged.retain(|r| !(r.is_deleted && r.updated_at < cutoff));
        if purged > 0 {
            info!("Purged {} tombstones older than {}", purged, cutoff);
        }
        Ok(purged)
    }

    // ── Restore ──────────────────────────────────────────────────

    /// Replaces local records and preferences with the remote backup.
    ///
    /// No merge happens: whatever the device had is overwritten. An empty
    /// or unreadable remote is an error, so a restore never wipes the device
    /// by accident. Attachments referenced by the backup are then fetched;
    /// those that fail are retried by the next sync.
    pub async fn restore(&self) -> SyncResult<Vec<Record>> {
        let cycle = InFlight::acquire(self)?;

        match self.run_restore().await {
            Ok(records) => {
                cycle.settle(SyncStatus::Idle);
                Ok(records)
            }
            Err(e) => {
                error!("Restore failed: {e}");
                cycle.settle(SyncStatus::Error(e.user_message()));
                Err(e)
            }
        }
    }

    async fn run_restore(&self) -> SyncResult<Vec<Record>> {
        info!("Restoring from {}", self.remote.provider_name());

        let document = self
            .remote
            .load_document()
            .await?
            .ok_or(SyncError::NoRemoteData)?;

        let previous = self.local.get_all_records().await?;
        let mut records = document.records;
        carry_local_refs(&mut records, &previous);

        self.local.replace_all_records(&records).await?;
        self.local.put_preferences(&document.preferences).await?;

        AttachmentSynchronizer::new(self.local.as_ref(), self.remote.as_ref())
            .download_missing(&mut records)
            .await;

        info!("Restored {} records", records.len());
        Ok(records)
    }

    // ── Auto-sync ────────────────────────────────────────────────

    /// Starts or stops the periodic timer. Enabling twice keeps the running
    /// timer.
    pub fn set_auto_sync(self: &Arc<Self>, enabled: bool) -> SyncResult<()> {
        let mut slot = self.auto_sync.lock();
        if !enabled {
            if slot.take().is_some() {
                info!("Auto-sync disabled");
            }
            return Ok(());
        }
        if slot.is_none() {
            let handle =
                AutoSyncHandle::spawn(Arc::downgrade(self), self.config.auto_sync_interval())?;
            *slot = Some(handle);
        }
        Ok(())
    }

    pub fn auto_sync_enabled(&self) -> bool {
        self.auto_sync.lock().is_some()
    }

    /// Current auto-sync period, if the timer is running.
    pub fn auto_sync_period(&self) -> Option<Duration> {
        self.auto_sync.lock().as_ref().map(AutoSyncHandle::period)
    }

    /// Stops the auto-sync timer. A cycle already running finishes.
    pub fn shutdown(&self) {
        if self.auto_sync.lock().take().is_some() {
            info!("Auto-sync stopped");
        }
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.auto_sync.get_mut().take();
    }
}
