//! Periodic auto-sync task.

use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use std::sync::Weak;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// A running auto-sync timer. Dropping the handle aborts the task.
#[derive(Debug)]
pub(crate) struct AutoSyncHandle {
    task: JoinHandle<()>,
    period: Duration,
}

impl AutoSyncHandle {
    /// Spawns the timer on the current tokio runtime.
    ///
    /// The task only holds a weak reference, so it ends on its own once the
    /// engine is gone. The first tick fires one full period after start.
    pub(crate) fn spawn(engine: Weak<SyncEngine>, period: Duration) -> SyncResult<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| SyncError::Config("auto-sync needs a tokio runtime".to_string()))?;

        let task = runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval.tick().await;

            loop {
                interval.tick().await;

                let Some(engine) = engine.upgrade() else {
                    debug!("Engine dropped, auto-sync stopping");
                    break;
                };

                if engine.is_syncing() {
                    debug!("Auto-sync tick skipped, cycle already in flight");
                    continue;
                }

                match engine.sync().await {
                    Ok(report) => debug!(
                        "Auto-sync finished: {} records, {} pushed",
                        report.records.len(),
                        report.pushed
                    ),
                    Err(SyncError::AlreadySyncing) => {}
                    Err(e) => warn!("Auto-sync failed: {e}"),
                }
                // Next cycle one full period after this one ended.
                interval.reset();
            }
        });

        info!("Auto-sync enabled every {:?}", period);
        Ok(Self { task, period })
    }

    pub(crate) fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for AutoSyncHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
