//! Compute and snapshot operations the backup job depends on

use anyhow::Result;
use ebs_retention_common::{Instance, Snapshot, Tag};

/// Trait for the EC2 operations the job calls, so the policy code can be
/// unit tested without hitting real AWS.
///
/// Every call is made exactly once by the job; implementations must not
/// retry on their own.
#[allow(async_fn_in_trait)] // Internal use only, Send+Sync bounds on trait are sufficient
#[cfg_attr(test, mockall::automock)]
pub trait SnapshotService: Send + Sync {
    /// Enumerate every instance visible to the account, across all
    /// reservations and result pages
    async fn list_instances(&self) -> Result<Vec<Instance>>;

    /// Start a snapshot of `volume_id`, returning the snapshot ID
    async fn create_snapshot(&self, volume_id: &str, description: &str) -> Result<String>;

    /// Attach `tags` to a resource
    async fn tag_resource(&self, resource_id: &str, tags: Vec<Tag>) -> Result<()>;

    /// List snapshots owned by `owner` that carry `tag_filter`, across all pages
    async fn list_snapshots(&self, owner: &str, tag_filter: &Tag) -> Result<Vec<Snapshot>>;

    /// Delete a snapshot
    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()>;
}
