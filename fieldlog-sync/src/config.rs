//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the sync engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Device name, used in log lines.
    pub device_name: String,
    /// Period of the auto-sync timer (seconds, minimum 1).
    pub auto_sync_interval_secs: u64,
    /// Local tombstones older than this many days are purged after a
    /// successful cycle. `None` keeps them forever.
    pub tombstone_retention_days: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            device_name: "FieldLog Device".to_string(),
            auto_sync_interval_secs: 300,
            tombstone_retention_days: None,
        }
    }
}

impl SyncConfig {
    /// Auto-sync period.
    #[must_use]
    pub fn auto_sync_interval(&self) -> Duration {
        Duration::from_secs(self.auto_sync_interval_secs.max(1))
    }

    /// Tombstone retention window, if any.
    #[must_use]
    pub fn tombstone_retention(&self) -> Option<Duration> {
        self.tombstone_retention_days
            .map(|days| Duration::from_secs(days.saturating_mul(24 * 60 * 60)))
    }
}
