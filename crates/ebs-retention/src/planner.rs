//! Per-instance snapshot creation
//!
//! The planner picks the retention tier once per instance, then snapshots
//! and tags each selected EBS volume. A failed create or tag call abandons
//! the rest of that instance for this run; snapshots already taken for it
//! are kept.

use crate::aws::{SnapshotService, classify_anyhow_error};
use crate::config::{BackupOptions, RunFlags, VolumeSelection};
use chrono::{DateTime, Utc};
use ebs_retention_common::tags::{
    CREATED_BY_VALUE, TAG_CREATED_BY, TAG_EXPIRATION_TIME, TAG_INSTANCE_ID, format_expiration,
};
use ebs_retention_common::tier::RetentionPolicy;
use ebs_retention_common::{Instance, Tag, Tier, TierPlan};
use tracing::{debug, info, warn};

/// Result of backing up one instance
#[derive(Debug)]
pub enum BackupOutcome {
    /// Every selected volume was snapshotted and tagged
    Completed {
        tier: Tier,
        snapshot_ids: Vec<String>,
    },
    /// Dry run: volumes that would have been snapshotted
    Planned { tier: Tier, volumes: usize },
    /// The instance has no EBS volume attached
    NothingToBackUp,
    /// A create or tag call failed; `snapshot_ids` were created before it
    Failed {
        tier: Tier,
        snapshot_ids: Vec<String>,
        error: anyhow::Error,
    },
}

impl BackupOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, BackupOutcome::Failed { .. })
    }

    /// Snapshots created during the attempt, including before a failure
    pub fn snapshot_ids(&self) -> &[String] {
        match self {
            BackupOutcome::Completed { snapshot_ids, .. }
            | BackupOutcome::Failed { snapshot_ids, .. } => snapshot_ids,
            BackupOutcome::Planned { .. } | BackupOutcome::NothingToBackUp => &[],
        }
    }
}

/// Snapshot description recorded on each backup
pub fn snapshot_description(tier: Tier, device_name: &str, instance_id: &str) -> String {
    format!("{tier} backup of {device_name} on instance {instance_id}")
}

/// Retention tags applied to each created snapshot
pub fn snapshot_tags(instance_id: &str, expires_at: DateTime<Utc>) -> Vec<Tag> {
    vec![
        Tag::new(TAG_EXPIRATION_TIME, format_expiration(expires_at)),
        Tag::new(TAG_INSTANCE_ID, instance_id),
        Tag::new(TAG_CREATED_BY, CREATED_BY_VALUE),
    ]
}

/// Creates the snapshots for one run
pub struct BackupPlanner<'a, S> {
    service: &'a S,
    policy: RetentionPolicy,
    volume_selection: VolumeSelection,
    dry_run: bool,
}

impl<'a, S: SnapshotService> BackupPlanner<'a, S> {
    pub fn new(service: &'a S, options: &BackupOptions, flags: RunFlags) -> Self {
        Self {
            service,
            policy: options.retention_policy(),
            volume_selection: options.volume_selection,
            dry_run: flags.dry_run,
        }
    }

    /// Back up every selected EBS volume of `instance` under today's tier
    pub async fn plan_and_execute(&self, instance: &Instance, today: DateTime<Utc>) -> BackupOutcome {
        let volumes: Vec<(&str, &str)> = match self.volume_selection {
            VolumeSelection::All => instance.ebs_volumes().collect(),
            VolumeSelection::First => instance.ebs_volumes().take(1).collect(),
        };

        if volumes.is_empty() {
            debug!(instance_id = %instance.instance_id, "No EBS volumes attached");
            return BackupOutcome::NothingToBackUp;
        }

        let TierPlan { tier, expires_at } = self.policy.plan(today);
        let tags = snapshot_tags(&instance.instance_id, expires_at);

        if self.dry_run {
            for (device_name, volume_id) in &volumes {
                info!(
                    instance_id = %instance.instance_id,
                    device = %device_name,
                    volume_id = %volume_id,
                    %tier,
                    expires_at = %format_expiration(expires_at),
                    "[DRY RUN] Would snapshot"
                );
            }
            return BackupOutcome::Planned {
                tier,
                volumes: volumes.len(),
            };
        }

        let mut snapshot_ids = Vec::with_capacity(volumes.len());
        for (device_name, volume_id) in volumes {
            let description = snapshot_description(tier, device_name, &instance.instance_id);

            let result = async {
                let snapshot_id = self.service.create_snapshot(volume_id, &description).await?;
                // Recorded before tagging: an untagged snapshot still exists
                snapshot_ids.push(snapshot_id.clone());
                self.service.tag_resource(&snapshot_id, tags.clone()).await?;
                Ok::<_, anyhow::Error>(snapshot_id)
            }
            .await;

            match result {
                Ok(snapshot_id) => {
                    info!(
                        instance_id = %instance.instance_id,
                        device = %device_name,
                        volume_id = %volume_id,
                        snapshot_id = %snapshot_id,
                        %tier,
                        "Snapshot created"
                    );
                }
                Err(error) => {
                    warn!(
                        instance_id = %instance.instance_id,
                        device = %device_name,
                        volume_id = %volume_id,
                        error = ?error,
                        suggestion = ?classify_anyhow_error(&error).suggestion(),
                        "Snapshot failed"
                    );
                    return BackupOutcome::Failed {
                        tier,
                        snapshot_ids,
                        error,
                    };
                }
            }
        }

        BackupOutcome::Completed { tier, snapshot_ids }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::MockSnapshotService;
    use chrono::NaiveDate;
    use ebs_retention_common::BlockDevice;

    fn wednesday() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2024, 1, 3)
            .unwrap()
            .and_hms_micro_opt(6, 0, 0, 250_000)
            .unwrap()
            .and_utc()
    }

    fn options(selection: VolumeSelection) -> BackupOptions {
        BackupOptions {
            retention_days: 3,
            volume_selection: selection,
            ..Default::default()
        }
    }

    fn two_volume_instance() -> Instance {
        Instance::new("i-1")
            .with_device(BlockDevice::ebs("/dev/xvda", "vol-1"))
            .with_device(BlockDevice::ephemeral("/dev/sdb"))
            .with_device(BlockDevice::ebs("/dev/xvdf", "vol-2"))
    }

    #[test]
    fn test_description_and_tags() {
        assert_eq!(
            snapshot_description(Tier::Weekly, "/dev/xvda", "i-1"),
            "Weekly backup of /dev/xvda on instance i-1"
        );
        assert_eq!(
            snapshot_tags("i-1", wednesday()),
            vec![
                Tag::new("ExpirationTime", "2024-01-03 06:00:00.250000"),
                Tag::new("InstanceId", "i-1"),
                Tag::new("CreatedBy", "LambdaBackup"),
            ]
        );
    }

    #[tokio::test]
    async fn test_daily_snapshot_of_single_volume() {
        let instance = Instance::new("i-1").with_device(BlockDevice::ebs("/dev/xvda", "vol-1"));
        let expected_tags = snapshot_tags("i-1", wednesday() + chrono::Duration::days(3));

        let mut mock = MockSnapshotService::new();
        mock.expect_create_snapshot()
            .withf(|volume_id, description| {
                volume_id.to_string() == "vol-1"
                    && description.to_string() == "Daily backup of /dev/xvda on instance i-1"
            })
            .times(1)
            .returning(|_, _| Ok("snap-1".to_string()));
        mock.expect_tag_resource()
            .withf(move |resource_id, tags| {
                resource_id.to_string() == "snap-1" && tags.as_slice() == expected_tags.as_slice()
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let opts = options(VolumeSelection::All);
        let planner = BackupPlanner::new(&mock, &opts, RunFlags::default());
        let outcome = planner.plan_and_execute(&instance, wednesday()).await;

        match outcome {
            BackupOutcome::Completed { tier, snapshot_ids } => {
                assert_eq!(tier, Tier::Daily);
                assert_eq!(snapshot_ids, vec!["snap-1"]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_all_volumes_are_snapshotted() {
        let mut mock = MockSnapshotService::new();
        let mut counter = 0;
        mock.expect_create_snapshot()
            .times(2)
            .returning(move |_, _| {
                counter += 1;
                Ok(format!("snap-{counter}"))
            });
        mock.expect_tag_resource().times(2).returning(|_, _| Ok(()));

        let opts = options(VolumeSelection::All);
        let planner = BackupPlanner::new(&mock, &opts, RunFlags::default());
        let outcome = planner.plan_and_execute(&two_volume_instance(), wednesday()).await;

        assert!(!outcome.is_failure());
        assert_eq!(outcome.snapshot_ids(), ["snap-1", "snap-2"]);
    }

    #[tokio::test]
    async fn test_first_only_snapshots_first_ebs_volume() {
        let mut mock = MockSnapshotService::new();
        mock.expect_create_snapshot()
            .withf(|volume_id, _| volume_id.to_string() == "vol-1")
            .times(1)
            .returning(|_, _| Ok("snap-1".to_string()));
        mock.expect_tag_resource().times(1).returning(|_, _| Ok(()));

        let opts = options(VolumeSelection::First);
        let planner = BackupPlanner::new(&mock, &opts, RunFlags::default());
        let outcome = planner.plan_and_execute(&two_volume_instance(), wednesday()).await;

        assert_eq!(outcome.snapshot_ids(), ["snap-1"]);
    }

    #[tokio::test]
    async fn test_first_only_skips_leading_ephemeral_device() {
        let instance = Instance::new("i-1")
            .with_device(BlockDevice::ephemeral("/dev/sdb"))
            .with_device(BlockDevice::ebs("/dev/xvdf", "vol-2"));

        let mut mock = MockSnapshotService::new();
        mock.expect_create_snapshot()
            .withf(|volume_id, _| volume_id.to_string() == "vol-2")
            .times(1)
            .returning(|_, _| Ok("snap-2".to_string()));
        mock.expect_tag_resource().times(1).returning(|_, _| Ok(()));

        let opts = options(VolumeSelection::First);
        let planner = BackupPlanner::new(&mock, &opts, RunFlags::default());
        assert!(!planner.plan_and_execute(&instance, wednesday()).await.is_failure());
    }

    #[tokio::test]
    async fn test_no_ebs_volume_makes_no_calls() {
        let instance = Instance::new("i-1").with_device(BlockDevice::ephemeral("/dev/sdb"));
        let mock = MockSnapshotService::new();

        let opts = options(VolumeSelection::All);
        let planner = BackupPlanner::new(&mock, &opts, RunFlags::default());
        let outcome = planner.plan_and_execute(&instance, wednesday()).await;

        assert!(matches!(outcome, BackupOutcome::NothingToBackUp));
    }

    #[tokio::test]
    async fn test_create_failure_stops_instance_and_keeps_earlier_snapshots() {
        let mut mock = MockSnapshotService::new();
        mock.expect_create_snapshot()
            .withf(|volume_id, _| volume_id.to_string() == "vol-1")
            .times(1)
            .returning(|_, _| Ok("snap-1".to_string()));
        mock.expect_create_snapshot()
            .withf(|volume_id, _| volume_id.to_string() == "vol-2")
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("RequestLimitExceeded")));
        mock.expect_tag_resource().times(1).returning(|_, _| Ok(()));

        let opts = options(VolumeSelection::All);
        let planner = BackupPlanner::new(&mock, &opts, RunFlags::default());
        let outcome = planner.plan_and_execute(&two_volume_instance(), wednesday()).await;

        assert!(outcome.is_failure());
        assert_eq!(outcome.snapshot_ids(), ["snap-1"]);
    }

    #[tokio::test]
    async fn test_tag_failure_fails_instance() {
        let mut mock = MockSnapshotService::new();
        mock.expect_create_snapshot()
            .times(1)
            .returning(|_, _| Ok("snap-1".to_string()));
        mock.expect_tag_resource()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("UnauthorizedOperation")));

        let opts = options(VolumeSelection::All);
        let planner = BackupPlanner::new(&mock, &opts, RunFlags::default());
        let outcome = planner.plan_and_execute(&two_volume_instance(), wednesday()).await;

        match outcome {
            BackupOutcome::Failed {
                tier, snapshot_ids, ..
            } => {
                assert_eq!(tier, Tier::Daily);
                // The untagged snapshot exists and is reported
                assert_eq!(snapshot_ids, vec!["snap-1"]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_calls() {
        let mock = MockSnapshotService::new();

        let opts = options(VolumeSelection::All);
        let planner = BackupPlanner::new(&mock, &opts, RunFlags { dry_run: true });
        let outcome = planner.plan_and_execute(&two_volume_instance(), wednesday()).await;

        assert!(matches!(
            outcome,
            BackupOutcome::Planned {
                tier: Tier::Daily,
                volumes: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_tier_is_shared_by_all_volumes() {
        // 2024-01-08 is a Monday
        let monday = NaiveDate::from_ymd_opt(2024, 1, 8)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc();
        let expected_tags = snapshot_tags("i-1", monday + chrono::Duration::days(28));

        let mut mock = MockSnapshotService::new();
        mock.expect_create_snapshot()
            .withf(|_, description| description.starts_with("Weekly backup of "))
            .times(2)
            .returning(|volume_id, _| Ok(volume_id.replace("vol", "snap")));
        mock.expect_tag_resource()
            .withf(move |_, tags| tags.as_slice() == expected_tags.as_slice())
            .times(2)
            .returning(|_, _| Ok(()));

        let opts = options(VolumeSelection::All);
        let planner = BackupPlanner::new(&mock, &opts, RunFlags::default());
        let outcome = planner.plan_and_execute(&two_volume_instance(), monday).await;

        assert_eq!(outcome.snapshot_ids(), ["snap-1", "snap-2"]);
    }
}
