//! Shared utilities for pipeline and AWS integration tests
//!
//! Provides an in-memory `SnapshotService` that records every call, plus
//! region detection for the tests that talk to real AWS.

#![allow(dead_code)]

use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use ebs_retention::aws::SnapshotService;
use ebs_retention_common::{Instance, Snapshot, Tag};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// Get the AWS region for tests.
///
/// Checks environment variables in order:
/// 1. AWS_REGION
/// 2. AWS_DEFAULT_REGION
/// 3. Falls back to us-east-2
pub fn get_test_region() -> String {
    std::env::var("AWS_REGION")
        .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        .unwrap_or_else(|_| "us-east-2".to_string())
}

/// Midnight UTC on the given date
pub fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// A call made against the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListInstances,
    CreateSnapshot { volume_id: String, description: String },
    TagResource { resource_id: String, tags: Vec<Tag> },
    ListSnapshots { owner: String },
    DeleteSnapshot { snapshot_id: String },
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub instances: Vec<Instance>,
    pub snapshots: Vec<Snapshot>,
    pub calls: Vec<Call>,
    /// Volumes whose create call fails
    pub fail_create: HashSet<String>,
    /// Snapshots whose delete call fails
    pub fail_delete: HashSet<String>,
    pub fail_list_instances: bool,
    /// Return every snapshot regardless of the tag filter
    pub ignore_tag_filter: bool,
    next_snapshot: u32,
}

/// In-memory EC2 account
#[derive(Debug, Default)]
pub struct FakeCloud {
    state: Mutex<FakeState>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instance(self, instance: Instance) -> Self {
        self.state().instances.push(instance);
        self
    }

    pub fn with_snapshot(self, snapshot: Snapshot) -> Self {
        self.state().snapshots.push(snapshot);
        self
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Calls other than the two listings
    pub fn mutating_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::ListInstances | Call::ListSnapshots { .. }))
            .collect()
    }

    pub fn snapshot_ids(&self) -> Vec<String> {
        self.state()
            .snapshots
            .iter()
            .map(|s| s.snapshot_id.clone())
            .collect()
    }

    pub fn snapshot(&self, snapshot_id: &str) -> Option<Snapshot> {
        self.state()
            .snapshots
            .iter()
            .find(|s| s.snapshot_id == snapshot_id)
            .cloned()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }
}

impl SnapshotService for FakeCloud {
    async fn list_instances(&self) -> Result<Vec<Instance>> {
        let mut state = self.state();
        state.calls.push(Call::ListInstances);
        if state.fail_list_instances {
            bail!("AuthFailure: credentials rejected");
        }
        Ok(state.instances.clone())
    }

    async fn create_snapshot(&self, volume_id: &str, description: &str) -> Result<String> {
        let mut state = self.state();
        state.calls.push(Call::CreateSnapshot {
            volume_id: volume_id.to_string(),
            description: description.to_string(),
        });
        if state.fail_create.contains(volume_id) {
            bail!("IncorrectState: volume {volume_id} is not attached");
        }
        state.next_snapshot += 1;
        let snapshot_id = format!("snap-{:08}", state.next_snapshot);
        state.snapshots.push(Snapshot {
            snapshot_id: snapshot_id.clone(),
            description: description.to_string(),
            tags: Vec::new(),
        });
        Ok(snapshot_id)
    }

    async fn tag_resource(&self, resource_id: &str, tags: Vec<Tag>) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::TagResource {
            resource_id: resource_id.to_string(),
            tags: tags.clone(),
        });
        match state
            .snapshots
            .iter_mut()
            .find(|s| s.snapshot_id == resource_id)
        {
            Some(snapshot) => {
                snapshot.tags.extend(tags);
                Ok(())
            }
            None => bail!("InvalidSnapshot.NotFound: {resource_id}"),
        }
    }

    async fn list_snapshots(&self, owner: &str, tag_filter: &Tag) -> Result<Vec<Snapshot>> {
        let mut state = self.state();
        state.calls.push(Call::ListSnapshots {
            owner: owner.to_string(),
        });
        let ignore_filter = state.ignore_tag_filter;
        Ok(state
            .snapshots
            .iter()
            .filter(|s| ignore_filter || s.tags.contains(tag_filter))
            .cloned()
            .collect())
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::DeleteSnapshot {
            snapshot_id: snapshot_id.to_string(),
        });
        if state.fail_delete.contains(snapshot_id) {
            bail!("InvalidSnapshot.InUse: {snapshot_id} is in use by ami-12345678");
        }
        let before = state.snapshots.len();
        state.snapshots.retain(|s| s.snapshot_id != snapshot_id);
        if state.snapshots.len() == before {
            bail!("InvalidSnapshot.NotFound: {snapshot_id}");
        }
        Ok(())
    }
}

/// A snapshot as this tool would have tagged it
pub fn owned_snapshot(snapshot_id: &str, instance_id: &str, expiration: &str) -> Snapshot {
    Snapshot {
        snapshot_id: snapshot_id.to_string(),
        description: format!("Daily backup of /dev/xvda on instance {instance_id}"),
        tags: vec![
            Tag::new("ExpirationTime", expiration),
            Tag::new("InstanceId", instance_id),
            Tag::new("CreatedBy", "LambdaBackup"),
        ],
    }
}
