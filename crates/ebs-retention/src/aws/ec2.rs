//! EC2 inventory and snapshot management

use super::context::AwsContext;
use super::service::SnapshotService;
use anyhow::{Context, Result};
use aws_sdk_ec2::{
    Client,
    types::{Filter, Reservation},
};
use ebs_retention_common::{BlockDevice, Instance, Snapshot, Tag};
use tracing::debug;

/// EC2 client for listing instances and managing their snapshots
pub struct Ec2Client {
    client: Client,
}

impl Ec2Client {
    /// Create a new EC2 client (loads AWS config from environment)
    pub async fn new(region: Option<&str>) -> Self {
        let ctx = AwsContext::load(region, None).await;
        Self::from_context(&ctx)
    }

    /// Create an EC2 client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.ec2_client(),
        }
    }

    /// List every instance in the account, draining all result pages
    pub async fn list_instances(&self) -> Result<Vec<Instance>> {
        let instances = drain_pages(|token| async move {
            let response = self
                .client
                .describe_instances()
                .set_next_token(token)
                .send()
                .await
                .context("Failed to describe instances")?;

            Ok::<_, anyhow::Error>((
                flatten_reservations(response.reservations()),
                response.next_token().map(str::to_string),
            ))
        })
        .await?;

        debug!(count = instances.len(), "Listed instances");
        Ok(instances)
    }

    /// Create a snapshot of a volume
    pub async fn create_snapshot(&self, volume_id: &str, description: &str) -> Result<String> {
        let response = self
            .client
            .create_snapshot()
            .volume_id(volume_id)
            .description(description)
            .send()
            .await
            .with_context(|| format!("Failed to create snapshot of {volume_id}"))?;

        let snapshot_id = response
            .snapshot_id()
            .context("No snapshot ID returned")?
            .to_string();

        debug!(volume_id = %volume_id, snapshot_id = %snapshot_id, "Snapshot started");
        Ok(snapshot_id)
    }

    /// Attach tags to a resource
    pub async fn create_tags(&self, resource_id: &str, tags: &[Tag]) -> Result<()> {
        self.client
            .create_tags()
            .resources(resource_id)
            .set_tags(Some(tags.iter().map(to_sdk_tag).collect()))
            .send()
            .await
            .with_context(|| format!("Failed to tag {resource_id}"))?;

        Ok(())
    }

    /// List snapshots owned by `owner` carrying `tag_filter`, draining all pages
    pub async fn describe_snapshots(&self, owner: &str, tag_filter: &Tag) -> Result<Vec<Snapshot>> {
        let snapshots = drain_pages(|token| async move {
            let response = self
                .client
                .describe_snapshots()
                .owner_ids(owner)
                .filters(
                    Filter::builder()
                        .name(format!("tag:{}", tag_filter.key))
                        .values(&tag_filter.value)
                        .build(),
                )
                .set_next_token(token)
                .send()
                .await
                .context("Failed to describe snapshots")?;

            Ok::<_, anyhow::Error>((
                response
                    .snapshots()
                    .iter()
                    .filter_map(snapshot_from_sdk)
                    .collect::<Vec<_>>(),
                response.next_token().map(str::to_string),
            ))
        })
        .await?;

        debug!(count = snapshots.len(), "Listed snapshots");
        Ok(snapshots)
    }

    /// Delete a snapshot
    pub async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
        self.client
            .delete_snapshot()
            .snapshot_id(snapshot_id)
            .send()
            .await
            .with_context(|| format!("Failed to delete snapshot {snapshot_id}"))?;

        Ok(())
    }
}

impl SnapshotService for Ec2Client {
    async fn list_instances(&self) -> Result<Vec<Instance>> {
        Ec2Client::list_instances(self).await
    }

    async fn create_snapshot(&self, volume_id: &str, description: &str) -> Result<String> {
        Ec2Client::create_snapshot(self, volume_id, description).await
    }

    async fn tag_resource(&self, resource_id: &str, tags: Vec<Tag>) -> Result<()> {
        Ec2Client::create_tags(self, resource_id, &tags).await
    }

    async fn list_snapshots(&self, owner: &str, tag_filter: &Tag) -> Result<Vec<Snapshot>> {
        Ec2Client::describe_snapshots(self, owner, tag_filter).await
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
        Ec2Client::delete_snapshot(self, snapshot_id).await
    }
}

/// Collect items across `NextToken` pages.
///
/// `fetch` gets the token of the page to request (`None` for the first) and
/// returns that page's items with the next token. A missing or empty token
/// ends the listing; the first error aborts it.
pub(crate) async fn drain_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, Option<String>)>>,
{
    let mut items = Vec::new();
    let mut next_token = None;

    loop {
        let (page, token) = fetch(next_token.take()).await?;
        items.extend(page);

        match token {
            Some(token) if !token.is_empty() => next_token = Some(token),
            _ => break,
        }
    }

    Ok(items)
}

/// Flatten reservations into their instances, in response order
pub fn flatten_reservations(reservations: &[Reservation]) -> Vec<Instance> {
    reservations
        .iter()
        .flat_map(|r| r.instances())
        .filter_map(instance_from_sdk)
        .collect()
}

/// Convert an SDK instance, skipping entries without an instance ID
fn instance_from_sdk(instance: &aws_sdk_ec2::types::Instance) -> Option<Instance> {
    let Some(instance_id) = instance.instance_id() else {
        debug!("Skipping instance without an ID");
        return None;
    };

    let block_devices = instance
        .block_device_mappings()
        .iter()
        .map(|m| BlockDevice {
            device_name: m.device_name().unwrap_or_default().to_string(),
            volume_id: m.ebs().and_then(|e| e.volume_id()).map(str::to_string),
        })
        .collect();

    Some(Instance {
        instance_id: instance_id.to_string(),
        tags: extract_tags(instance.tags()),
        block_devices,
    })
}

/// Convert an SDK snapshot, skipping entries without a snapshot ID
fn snapshot_from_sdk(snapshot: &aws_sdk_ec2::types::Snapshot) -> Option<Snapshot> {
    Some(Snapshot {
        snapshot_id: snapshot.snapshot_id()?.to_string(),
        description: snapshot.description().unwrap_or_default().to_string(),
        tags: extract_tags(snapshot.tags()),
    })
}

/// Extract tags, keeping order and duplicate keys and dropping incomplete pairs
fn extract_tags(tags: &[aws_sdk_ec2::types::Tag]) -> Vec<Tag> {
    tags.iter()
        .filter_map(|t| match (t.key(), t.value()) {
            (Some(k), Some(v)) => Some(Tag::new(k, v)),
            _ => None,
        })
        .collect()
}

fn to_sdk_tag(tag: &Tag) -> aws_sdk_ec2::types::Tag {
    aws_sdk_ec2::types::Tag::builder()
        .key(&tag.key)
        .value(&tag.value)
        .build()
}
