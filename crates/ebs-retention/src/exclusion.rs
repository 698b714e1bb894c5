//! Backup opt-out rules

use crate::config::BackupOptions;
use ebs_retention_common::Instance;
use ebs_retention_common::tags::TAG_NAME;

/// Whether `instance` is opted out of backups.
///
/// An instance is skipped when a `Name` tag is listed in
/// `exclude_instance_names`, or when any of its tags equals one of the
/// `exclude_instance_tags` pairs. Every tag is checked, including repeated keys.
pub fn is_excluded(instance: &Instance, options: &BackupOptions) -> bool {
    instance.tags.iter().any(|tag| {
        (tag.key == TAG_NAME && options.exclude_instance_names.contains(&tag.value))
            || options.exclude_instance_tags.contains(tag)
    })
}
