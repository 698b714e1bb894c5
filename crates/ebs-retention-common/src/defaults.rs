//! Default configuration values
//!
//! These match the schedule the job has always shipped with, so an empty
//! configuration file behaves like the historical deployment.

/// Default lifetime of a Daily snapshot, in days
pub const DEFAULT_RETENTION_DAYS: u32 = 3;

/// Default lifetime of a Weekly snapshot, in weeks
pub const DEFAULT_RETENTION_WEEKS: u32 = 4;

/// Default lifetime of a Monthly snapshot, in months
pub const DEFAULT_RETENTION_MONTHS: u32 = 12;

/// Tag key of the default opt-out tag
pub const DEFAULT_EXCLUDE_TAG_KEY: &str = "LambdaBackupStrategy";

/// Tag value of the default opt-out tag
pub const DEFAULT_EXCLUDE_TAG_VALUE: &str = "Never";

/// Days in a retention week
pub const DAYS_PER_WEEK: i64 = 7;

/// Days in a retention month (months are approximated as 31 days)
pub const DAYS_PER_MONTH: i64 = 31;

/// Longest accepted retention horizon, in days (100 years)
pub const MAX_RETENTION_DAYS: i64 = 36_500;

// Serde default functions for struct field defaults

/// Returns the default daily retention
pub fn default_retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}

/// Returns the default weekly retention
pub fn default_retention_weeks() -> u32 {
    DEFAULT_RETENTION_WEEKS
}

/// Returns the default monthly retention
pub fn default_retention_months() -> u32 {
    DEFAULT_RETENTION_MONTHS
}
