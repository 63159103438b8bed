//! Wall-clock timestamps for record mutation tracking.
//!
//! Records are resolved last-writer-wins on `updatedAt`, so the only thing
//! that matters is a total order. Milliseconds since the Unix epoch are
//! what the backup document stores.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a timestamp at the current time.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self(millis)
    }

    /// Creates a timestamp from milliseconds since the epoch.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns milliseconds since the epoch.
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Returns a timestamp strictly after both `self` and the current time.
    ///
    /// Used when mutating a record so `updatedAt` never goes backwards even
    /// if the system clock does.
    #[must_use]
    pub fn tick(&self) -> Self {
        let now = Self::now();
        if now > *self { now } else { Self(self.0.saturating_add(1)) }
    }

    /// Returns this timestamp moved back by `age`, saturating at the epoch.
    #[must_use]
    pub fn saturating_sub(&self, age: Duration) -> Self {
        Self(self.0.saturating_sub(age.as_millis() as u64))
    }

    /// Parses an RFC 3339 string (as used by cloud provider metadata).
    pub fn parse_rfc3339(s: &str) -> crate::Result<Self> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| crate::Error::InvalidTimestamp(format!("{s}: {e}")))?;
        let millis = dt.timestamp_millis();
        if millis < 0 {
            return Err(crate::Error::InvalidTimestamp(format!("{s}: before epoch")));
        }
        Ok(Self(millis as u64))
    }

    /// Formats the timestamp as RFC 3339 in UTC.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        DateTime::<Utc>::from_timestamp_millis(self.0 as i64)
            .unwrap_or_default()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl From<SystemTime> for Timestamp {
    fn from(t: SystemTime) -> Self {
        Self(t.duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}
