//! Merge engine for FieldLog.
//!
//! Reconciles the device-local record set against the remote backup:
//!
//! - [`merge_records`]: last-writer-wins on `updatedAt`, tombstones
//!   dominate, produces upload/download worklists
//! - [`merge_preferences`]: local scalars win, option lists merge by union
//!
//! Everything here is a pure function over its inputs. There is no clock, no
//! store and no error path; records without ids are a contract violation the
//! caller must rule out upstream.
//!
//! Properties the record merge satisfies:
//! - **Idempotent once absorbed**: `merge(merge(A, B).merged, B).merged == merge(A, B).merged`
//! - **Tombstone dominance**: an id deleted on either side stays deleted
//! - **Complete**: every id from either side appears exactly once in `merged`

mod preferences;
mod records;

pub use preferences::{merge_preferences, union_dedup};
pub use records::{merge_records, resolve, MergeOutcome, MergeStats, Resolution};
