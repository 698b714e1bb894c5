//! ebs-retention-common - Shared types and utilities
//!
//! This crate provides the snapshot tag schema and retention policy types used
//! by the backup job, without any AWS SDK dependencies to keep it lightweight.
//!
//! ## Modules
//!
//! - [`defaults`]: Default retention configuration values
//! - [`tags`]: Snapshot tag keys, ownership marker and expiration timestamp format
//! - [`tier`]: Daily/Weekly/Monthly tier selection and expiration arithmetic
//! - [`types`]: Provider-neutral instance, volume and snapshot types

pub mod defaults;
pub mod tags;
pub mod tier;
pub mod types;

// Re-export commonly used types
pub use tier::{RetentionPolicy, Tier, TierPlan};
pub use types::{BlockDevice, Instance, Snapshot, Tag};
