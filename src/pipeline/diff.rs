//! Diff calculation between release snapshots.
//!
//! Releases are never edited upstream, so only additions matter for
//! notifications; removals are counted for logging.

use crate::models::{ReleaseRecord, Snapshot};

/// Result of comparing two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// Records of `current` missing from `previous`, in `current` order
    pub added: Vec<ReleaseRecord>,
    /// Number of records of `previous` missing from `current`
    pub removed: usize,
}

impl SnapshotDiff {
    /// Compare `previous` against `current` by `(section, key)`.
    pub fn calculate(previous: &Snapshot, current: &Snapshot) -> Self {
        let added = current
            .records()
            .filter(|(section, record)| !previous.contains(section, &record.key()))
            .map(|(_, record)| record.clone())
            .collect();
        let removed = previous
            .records()
            .filter(|(section, record)| !current.contains(section, &record.key()))
            .count();
        Self { added, removed }
    }

    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || self.removed > 0
    }
}

/// New records of `current`, in `current` order.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> Vec<ReleaseRecord> {
    SnapshotDiff::calculate(previous, current).added
}
