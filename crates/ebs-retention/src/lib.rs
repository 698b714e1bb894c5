//! ebs-retention - scheduled EBS snapshot backups with tag-driven retention
//!
//! Each run lists every instance, skips the opted-out ones, snapshots the
//! EBS volumes of the rest under a Daily, Weekly or Monthly tier, and then
//! deletes the tool's own snapshots whose `ExpirationTime` tag has passed.

pub mod aws;
pub mod config;
pub mod error;
pub mod exclusion;
pub mod job;
pub mod planner;
pub mod run_state;
pub mod sweeper;

pub use job::{BackupJob, BackupReport, RunSummary, run_backup, run_for_account};
