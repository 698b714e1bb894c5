//! One scheduled run: list, filter, back up, then sweep
//!
//! The phases run strictly in order on a single task. The sweep starts only
//! after every instance has been attempted, so it sees the complete set of
//! failed backups for the run.

use crate::aws::{AwsContext, Ec2Client, SnapshotService};
use crate::config::{BackupOptions, RunFlags};
use crate::exclusion::is_excluded;
use crate::planner::{BackupOutcome, BackupPlanner};
use crate::run_state::RunState;
use crate::sweeper::{RetentionSweeper, SweepReport};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Counts from the backup phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackupReport {
    pub instances_seen: usize,
    pub excluded: usize,
    pub backed_up: usize,
    /// Instances with no EBS volume attached
    pub nothing_to_back_up: usize,
    pub failed: usize,
    /// Snapshots created, including those taken before an instance failed
    pub snapshots_created: usize,
    /// Snapshots a dry run would have created
    pub planned: usize,
}

/// Result of a complete run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub backup: BackupReport,
    pub sweep: SweepReport,
    /// Instances whose snapshots were held back from deletion
    pub failed_instances: Vec<String>,
}

/// The backup pipeline over a snapshot service
pub struct BackupJob<'a, S> {
    service: &'a S,
    options: &'a BackupOptions,
    flags: RunFlags,
}

impl<'a, S: SnapshotService> BackupJob<'a, S> {
    pub fn new(service: &'a S, options: &'a BackupOptions, flags: RunFlags) -> Self {
        Self {
            service,
            options,
            flags,
        }
    }

    /// Run both phases once with `now` as the run's clock.
    ///
    /// A failed instance listing aborts the run before any sweep, since no
    /// instance is known to have backed up. Per-instance and per-snapshot
    /// failures are logged and counted without stopping the run.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        let (backup, run_state) = self.backup_phase(now).await?;

        info!(
            instances = backup.instances_seen,
            excluded = backup.excluded,
            backed_up = backup.backed_up,
            failed = backup.failed,
            snapshots = backup.snapshots_created,
            "Backup phase complete"
        );

        let sweep = RetentionSweeper::new(self.service, self.flags)
            .sweep(&run_state, now)
            .await?;

        Ok(RunSummary {
            backup,
            sweep,
            failed_instances: run_state
                .failed_instances()
                .into_iter()
                .map(String::from)
                .collect(),
        })
    }

    async fn backup_phase(&self, now: DateTime<Utc>) -> Result<(BackupReport, RunState)> {
        let instances = self
            .service
            .list_instances()
            .await
            .context("Failed to list instances")?;

        let planner = BackupPlanner::new(self.service, self.options, self.flags);
        let mut run_state = RunState::new();
        let mut report = BackupReport {
            instances_seen: instances.len(),
            ..Default::default()
        };

        for instance in &instances {
            if is_excluded(instance, self.options) {
                info!(
                    instance_id = %instance.instance_id,
                    name = instance.name().unwrap_or_default(),
                    "Skipping excluded instance"
                );
                report.excluded += 1;
                continue;
            }

            let outcome = planner.plan_and_execute(instance, now).await;
            report.snapshots_created += outcome.snapshot_ids().len();

            match outcome {
                BackupOutcome::Completed { .. } => report.backed_up += 1,
                BackupOutcome::Planned { volumes, .. } => report.planned += volumes,
                BackupOutcome::NothingToBackUp => {
                    debug!(instance_id = %instance.instance_id, "Nothing to back up");
                    report.nothing_to_back_up += 1;
                }
                BackupOutcome::Failed { error, .. } => {
                    warn!(
                        instance_id = %instance.instance_id,
                        error = %format!("{error:#}"),
                        "Backup failed, holding this instance's snapshots"
                    );
                    run_state.mark_failed(instance.instance_id.clone());
                    report.failed += 1;
                }
            }
        }

        Ok((report, run_state))
    }
}

/// Run the pipeline once against the account `aws` resolves to
pub async fn run_for_account(
    aws: &AwsContext,
    options: &BackupOptions,
    flags: RunFlags,
    now: DateTime<Utc>,
) -> Result<RunSummary> {
    let ec2 = Ec2Client::from_context(aws);
    BackupJob::new(&ec2, options, flags).run(now).await
}

/// Scheduled entry point.
///
/// The scheduler's event and context payloads are accepted and ignored. No
/// options file is read: a scheduled run always uses the built-in defaults,
/// while `ebs-retention run --config` covers custom options.
pub async fn run_backup(
    _event: &serde_json::Value,
    _context: &serde_json::Value,
) -> Result<RunSummary> {
    let aws = AwsContext::load(None, None).await;
    run_for_account(&aws, &BackupOptions::default(), RunFlags::default(), Utc::now()).await
}
