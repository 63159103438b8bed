//! Preference reconciliation.

use fieldlog_types::PreferenceSet;
use std::collections::HashSet;

/// Merges two preference sets.
///
/// Scalars are owned by the local device and always keep the local value.
/// Each option list becomes the union of both sides, local entries first,
/// duplicates removed.
#[must_use]
pub fn merge_preferences(local: &PreferenceSet, remote: &PreferenceSet) -> PreferenceSet {
    PreferenceSet {
        custom_behaviors: union_dedup(&local.custom_behaviors, &remote.custom_behaviors),
        custom_colors: union_dedup(&local.custom_colors, &remote.custom_colors),
        custom_tags: union_dedup(&local.custom_tags, &remote.custom_tags),
        custom_locations: union_dedup(&local.custom_locations, &remote.custom_locations),
        ..local.clone()
    }
}

/// Order-preserving union of two lists with duplicates removed.
#[must_use]
pub fn union_dedup(first: &[String], second: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(first.len() + second.len());
    first
        .iter()
        .chain(second)
        .filter(|entry| seen.insert(entry.as_str()))
        .cloned()
        .collect()
}
