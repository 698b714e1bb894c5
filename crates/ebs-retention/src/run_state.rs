//! State shared between the backup and retention phases of one run

use std::collections::HashSet;

/// Instances whose backup failed during the current run.
///
/// Snapshots belonging to these instances are held back from deletion, so a
/// failed backup never shrinks the set of restorable snapshots. The state is
/// built fresh for every run and never persisted.
#[derive(Debug, Default, Clone)]
pub struct RunState {
    failed_backups: HashSet<String>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `instance_id` failed to back up in this run
    pub fn mark_failed(&mut self, instance_id: impl Into<String>) {
        self.failed_backups.insert(instance_id.into());
    }

    pub fn is_failed(&self, instance_id: &str) -> bool {
        self.failed_backups.contains(instance_id)
    }

    pub fn failed_count(&self) -> usize {
        self.failed_backups.len()
    }

    /// Failed instance IDs, sorted for stable output
    pub fn failed_instances(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.failed_backups.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}
