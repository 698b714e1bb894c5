//! Snapshot tag schema for ebs-retention
//!
//! Every snapshot created by the job carries these tags. They are the only
//! durable state the job has: the retention sweep rebuilds everything it
//! needs from them on each run.
//!
//! ## Tag Schema
//!
//! | Tag Key | Description |
//! |---------|-------------|
//! | `CreatedBy` | Static ownership marker (`LambdaBackup`) |
//! | `InstanceId` | Instance whose volume was snapshotted |
//! | `ExpirationTime` | `YYYY-MM-DD HH:MM:SS.ffffff` UTC wall-clock expiry |
//!
//! The key names and marker value predate this implementation and must not
//! change, otherwise snapshots taken by earlier deployments are never swept.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Tag key for ownership - the sweeper only ever touches snapshots with this tag
pub const TAG_CREATED_BY: &str = "CreatedBy";

/// Tag value marking a snapshot as owned by this tool
pub const CREATED_BY_VALUE: &str = "LambdaBackup";

/// Tag key for the owning instance identifier
pub const TAG_INSTANCE_ID: &str = "InstanceId";

/// Tag key for the expiration timestamp
pub const TAG_EXPIRATION_TIME: &str = "ExpirationTime";

/// Instance tag holding the human-readable name
pub const TAG_NAME: &str = "Name";

/// Write format of `ExpirationTime`, always six fractional digits
const EXPIRATION_WRITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Read format of `ExpirationTime`
///
/// `%.f` also accepts a missing fraction, which older writers emitted when
/// the microsecond component was zero.
const EXPIRATION_READ_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Format an expiration timestamp for the `ExpirationTime` tag
pub fn format_expiration(time: DateTime<Utc>) -> String {
    time.naive_utc().format(EXPIRATION_WRITE_FORMAT).to_string()
}

/// Parse an `ExpirationTime` tag value
pub fn parse_expiration(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s.trim(), EXPIRATION_READ_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
