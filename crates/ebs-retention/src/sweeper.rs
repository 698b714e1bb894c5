//! Retention sweep over snapshots created by this tool
//!
//! A snapshot is deleted only when it carries the ownership marker, names its
//! instance, has a parseable expiration that has been reached, and its
//! instance did not fail to back up earlier in the same run. Everything else
//! is left untouched.

use crate::aws::{SnapshotService, classify_anyhow_error};
use crate::config::RunFlags;
use crate::run_state::RunState;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ebs_retention_common::tags::{
    CREATED_BY_VALUE, TAG_CREATED_BY, TAG_EXPIRATION_TIME, TAG_INSTANCE_ID, parse_expiration,
};
use ebs_retention_common::{Snapshot, Tag};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

/// Owner filter selecting the caller's own snapshots
pub const OWNER_SELF: &str = "self";

/// Verdict for a single listed snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepDecision {
    /// Expired and eligible for deletion
    Delete,
    /// `CreatedBy` is not our marker
    NotOwned,
    MissingInstanceId,
    MissingExpiration,
    UnparseableExpiration,
    /// Expiration has not been reached
    NotExpired,
    /// Expired, but its instance failed to back up in this run
    HeldForFailedInstance,
}

impl SweepDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            SweepDecision::Delete => "delete",
            SweepDecision::NotOwned => "not-owned",
            SweepDecision::MissingInstanceId => "missing-instance-id",
            SweepDecision::MissingExpiration => "missing-expiration",
            SweepDecision::UnparseableExpiration => "unparseable-expiration",
            SweepDecision::NotExpired => "keep",
            SweepDecision::HeldForFailedInstance => "held",
        }
    }
}

impl fmt::Display for SweepDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide what to do with `snapshot` at `now`.
///
/// A snapshot is deleted once `now` reaches its expiration, inclusive.
pub fn evaluate(snapshot: &Snapshot, run_state: &RunState, now: DateTime<Utc>) -> SweepDecision {
    if !snapshot.is_owned() {
        return SweepDecision::NotOwned;
    }
    let Some(instance_id) = snapshot.tag(TAG_INSTANCE_ID) else {
        return SweepDecision::MissingInstanceId;
    };
    let Some(raw_expiration) = snapshot.tag(TAG_EXPIRATION_TIME) else {
        return SweepDecision::MissingExpiration;
    };
    let Some(expires_at) = parse_expiration(raw_expiration) else {
        return SweepDecision::UnparseableExpiration;
    };
    if now < expires_at {
        return SweepDecision::NotExpired;
    }
    if run_state.is_failed(instance_id) {
        return SweepDecision::HeldForFailedInstance;
    }
    SweepDecision::Delete
}

/// Counts from one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Snapshots returned by the listing
    pub found: usize,
    pub deleted: usize,
    /// Delete calls that reported the snapshot as already gone
    pub already_deleted: usize,
    /// Delete calls that failed for any other reason
    pub failed: usize,
    pub not_expired: usize,
    pub held_for_failed_instance: usize,
    /// Foreign marker, missing tags, or unparseable expiration
    pub skipped: usize,
    /// Expired snapshots left in place because of dry-run
    pub would_delete: usize,
}

/// Deletes expired snapshots after the backup phase
pub struct RetentionSweeper<'a, S> {
    service: &'a S,
    dry_run: bool,
}

impl<'a, S: SnapshotService> RetentionSweeper<'a, S> {
    pub fn new(service: &'a S, flags: RunFlags) -> Self {
        Self {
            service,
            dry_run: flags.dry_run,
        }
    }

    /// List every snapshot carrying the ownership marker
    pub async fn list_owned(&self) -> Result<Vec<Snapshot>> {
        self.service
            .list_snapshots(OWNER_SELF, &Tag::new(TAG_CREATED_BY, CREATED_BY_VALUE))
            .await
            .context("Failed to list owned snapshots")
    }

    /// Delete every eligible snapshot once.
    ///
    /// Only a failed listing is returned as an error; individual delete
    /// failures are logged and counted.
    pub async fn sweep(&self, run_state: &RunState, now: DateTime<Utc>) -> Result<SweepReport> {
        let snapshots = self.list_owned().await?;
        let mut report = SweepReport {
            found: snapshots.len(),
            ..Default::default()
        };
        let mut attempted: HashSet<&str> = HashSet::new();

        for snapshot in &snapshots {
            let decision = evaluate(snapshot, run_state, now);
            match decision {
                SweepDecision::Delete => {}
                SweepDecision::NotExpired => {
                    report.not_expired += 1;
                    continue;
                }
                SweepDecision::HeldForFailedInstance => {
                    info!(
                        snapshot_id = %snapshot.snapshot_id,
                        instance_id = snapshot.tag(TAG_INSTANCE_ID).unwrap_or_default(),
                        "Keeping expired snapshot of instance that failed to back up"
                    );
                    report.held_for_failed_instance += 1;
                    continue;
                }
                SweepDecision::NotOwned
                | SweepDecision::MissingInstanceId
                | SweepDecision::MissingExpiration
                | SweepDecision::UnparseableExpiration => {
                    debug!(
                        snapshot_id = %snapshot.snapshot_id,
                        reason = %decision,
                        "Skipping snapshot"
                    );
                    report.skipped += 1;
                    continue;
                }
            }

            // Pagination can repeat an entry; delete each ID at most once
            if !attempted.insert(snapshot.snapshot_id.as_str()) {
                continue;
            }

            if self.dry_run {
                info!(snapshot_id = %snapshot.snapshot_id, "[DRY RUN] Would delete snapshot");
                report.would_delete += 1;
                continue;
            }

            match self.service.delete_snapshot(&snapshot.snapshot_id).await {
                Ok(()) => {
                    info!(
                        snapshot_id = %snapshot.snapshot_id,
                        description = %snapshot.description,
                        "Deleted expired snapshot"
                    );
                    report.deleted += 1;
                }
                Err(error) => {
                    let classified = classify_anyhow_error(&error);
                    if classified.is_not_found() {
                        debug!(snapshot_id = %snapshot.snapshot_id, "Snapshot already deleted");
                        report.already_deleted += 1;
                    } else {
                        warn!(
                            snapshot_id = %snapshot.snapshot_id,
                            error = ?error,
                            suggestion = ?classified.suggestion(),
                            "Failed to delete snapshot"
                        );
                        report.failed += 1;
                    }
                }
            }
        }

        info!(
            found = report.found,
            deleted = report.deleted,
            failed = report.failed,
            held = report.held_for_failed_instance,
            "Retention sweep complete"
        );
        Ok(report)
    }
}
