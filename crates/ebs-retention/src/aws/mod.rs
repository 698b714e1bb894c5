//! AWS client modules
//!
//! This module provides:
//! - context: SDK configuration loaded once per run
//! - ec2: Instance inventory and snapshot create/tag/list/delete
//! - error: EC2 error code classification
//! - service: The `SnapshotService` seam the policy code is written against

pub mod context;
pub mod ec2;
pub mod error;
pub mod service;

pub use context::AwsContext;
pub use ec2::Ec2Client;
pub use error::{AwsError, classify_anyhow_error, classify_aws_error};
pub use service::SnapshotService;

#[cfg(test)]
pub use service::MockSnapshotService;
