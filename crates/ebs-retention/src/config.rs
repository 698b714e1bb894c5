//! Backup job configuration
//!
//! Options are read from an optional JSON file whose keys match the
//! historical deployment:
//!
//! ```json
//! {
//!     "retentionDays": 3,
//!     "retentionWeeks": 4,
//!     "retentionMonths": 12,
//!     "excludeInstanceNames": ["bastion"],
//!     "excludeInstanceTags": [{"LambdaBackupStrategy": "Never"}],
//!     "volumeSelection": "all"
//! }
//! ```
//!
//! Every field is optional and falls back to the defaults shown above.

use crate::error::ConfigError;
use ebs_retention_common::Tag;
use ebs_retention_common::defaults::{
    DAYS_PER_MONTH, DAYS_PER_WEEK, DEFAULT_EXCLUDE_TAG_KEY, DEFAULT_EXCLUDE_TAG_VALUE,
    MAX_RETENTION_DAYS, default_retention_days, default_retention_months,
    default_retention_weeks,
};
use ebs_retention_common::tier::RetentionPolicy;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Which EBS volumes of an instance get snapshotted in a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeSelection {
    /// Every attached EBS volume
    #[default]
    All,
    /// Only the first attached EBS volume, as earlier deployments did
    First,
}

/// Process-wide backup options, loaded once per run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawBackupOptions")]
pub struct BackupOptions {
    /// Lifetime of a Daily snapshot, in days
    pub retention_days: u32,
    /// Lifetime of a Weekly snapshot, in weeks (0 disables the tier)
    pub retention_weeks: u32,
    /// Lifetime of a Monthly snapshot, in 31-day months (0 disables the tier)
    pub retention_months: u32,
    /// `Name` tag values of instances to skip
    pub exclude_instance_names: BTreeSet<String>,
    /// Tag pairs marking instances to skip
    pub exclude_instance_tags: Vec<Tag>,
    pub volume_selection: VolumeSelection,
}

impl Default for BackupOptions {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            retention_weeks: default_retention_weeks(),
            retention_months: default_retention_months(),
            exclude_instance_names: BTreeSet::new(),
            exclude_instance_tags: vec![Tag::new(
                DEFAULT_EXCLUDE_TAG_KEY,
                DEFAULT_EXCLUDE_TAG_VALUE,
            )],
            volume_selection: VolumeSelection::default(),
        }
    }
}

impl BackupOptions {
    /// Load options from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::io(path.display().to_string(), e))?;
        Self::from_json(&content)
    }

    /// Parse options from a JSON document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from `path` if given, otherwise use the defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Retention lifetimes as a policy
    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            days: self.retention_days,
            weeks: self.retention_weeks,
            months: self.retention_months,
        }
    }

    /// Reject retention horizons beyond `MAX_RETENTION_DAYS`
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("retentionDays", self.retention_days, 1),
            ("retentionWeeks", self.retention_weeks, DAYS_PER_WEEK),
            ("retentionMonths", self.retention_months, DAYS_PER_MONTH),
        ];
        for (field, value, unit_days) in checks {
            if i64::from(value) * unit_days > MAX_RETENTION_DAYS {
                return Err(ConfigError::RetentionTooLong {
                    field,
                    value,
                    max_days: MAX_RETENTION_DAYS,
                });
            }
        }
        Ok(())
    }
}

/// On-disk shape of [`BackupOptions`]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawBackupOptions {
    #[serde(default = "default_retention_days")]
    retention_days: u32,
    #[serde(default = "default_retention_weeks")]
    retention_weeks: u32,
    #[serde(default = "default_retention_months")]
    retention_months: u32,
    #[serde(default)]
    exclude_instance_names: BTreeSet<String>,
    /// Each entry is a single-entry object: `{"TagKey": "TagValue"}`
    #[serde(default = "default_exclude_instance_tags")]
    exclude_instance_tags: Vec<BTreeMap<String, String>>,
    #[serde(default)]
    volume_selection: VolumeSelection,
}

fn default_exclude_instance_tags() -> Vec<BTreeMap<String, String>> {
    vec![BTreeMap::from([(
        DEFAULT_EXCLUDE_TAG_KEY.to_string(),
        DEFAULT_EXCLUDE_TAG_VALUE.to_string(),
    )])]
}

impl TryFrom<RawBackupOptions> for BackupOptions {
    type Error = ConfigError;

    fn try_from(raw: RawBackupOptions) -> Result<Self, Self::Error> {
        let exclude_instance_tags = raw
            .exclude_instance_tags
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                if entry.len() != 1 {
                    return Err(ConfigError::InvalidExcludeTag {
                        index,
                        count: entry.len(),
                    });
                }
                let (key, value) = entry.into_iter().next().ok_or(
                    ConfigError::InvalidExcludeTag { index, count: 0 },
                )?;
                Ok(Tag::new(key, value))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let options = Self {
            retention_days: raw.retention_days,
            retention_weeks: raw.retention_weeks,
            retention_months: raw.retention_months,
            exclude_instance_names: raw.exclude_instance_names,
            exclude_instance_tags,
            volume_selection: raw.volume_selection,
        };
        options.validate()?;
        Ok(options)
    }
}

/// Runtime behavior flags
#[derive(Debug, Clone, Copy, Default)]
pub struct RunFlags {
    /// Log intended creates/deletes without calling AWS mutating APIs
    pub dry_run: bool,
}
