//! Provider-neutral views of instances and snapshots
//!
//! The AWS binding converts SDK responses into these types so the policy
//! code never sees SDK builders or optional-everything fields.

use crate::tags::{CREATED_BY_VALUE, TAG_CREATED_BY, TAG_NAME};

/// A single key/value tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// First value for `key` in a tag list
///
/// Tag keys are not guaranteed unique in API responses; the first one wins.
pub fn tag_value<'a>(tags: &'a [Tag], key: &str) -> Option<&'a str> {
    tags.iter()
        .find(|t| t.key == key)
        .map(|t| t.value.as_str())
}

/// Block device mapping of an instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDevice {
    /// Device name as attached (e.g., "/dev/xvda")
    pub device_name: String,
    /// EBS volume backing the device, `None` for instance-store devices
    pub volume_id: Option<String>,
}

impl BlockDevice {
    pub fn ebs(device_name: impl Into<String>, volume_id: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            volume_id: Some(volume_id.into()),
        }
    }

    pub fn ephemeral(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            volume_id: None,
        }
    }
}

/// EC2 instance as seen by the backup job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub instance_id: String,
    pub tags: Vec<Tag>,
    pub block_devices: Vec<BlockDevice>,
}

impl Instance {
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            tags: Vec::new(),
            block_devices: Vec::new(),
        }
    }

    /// Add a tag
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(Tag::new(key, value));
        self
    }

    /// Add a block device mapping
    pub fn with_device(mut self, device: BlockDevice) -> Self {
        self.block_devices.push(device);
        self
    }

    /// Value of the `Name` tag
    pub fn name(&self) -> Option<&str> {
        tag_value(&self.tags, TAG_NAME)
    }

    /// Mappings backed by an EBS volume, as (device name, volume id)
    pub fn ebs_volumes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.block_devices.iter().filter_map(|d| {
            d.volume_id
                .as_deref()
                .map(|volume_id| (d.device_name.as_str(), volume_id))
        })
    }
}

/// EBS snapshot as listed back from the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub snapshot_id: String,
    pub description: String,
    pub tags: Vec<Tag>,
}

impl Snapshot {
    /// First value for `key`
    pub fn tag(&self, key: &str) -> Option<&str> {
        tag_value(&self.tags, key)
    }

    /// Whether the ownership marker is present
    pub fn is_owned(&self) -> bool {
        self.tag(TAG_CREATED_BY) == Some(CREATED_BY_VALUE)
    }
}
