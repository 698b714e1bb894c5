//! AWS error classification
//!
//! Maps EC2 error codes onto the few categories the job reacts to, using the
//! SDK's `.code()` metadata instead of string matching on Debug output where
//! possible.

use thiserror::Error;

/// EC2 error categories relevant to snapshot management
#[derive(Debug, Error)]
pub enum AwsError {
    /// Resource was not found (a snapshot deleted between listing and deletion)
    #[error("Resource not found: {message}")]
    NotFound { message: String },

    /// Snapshot is still referenced, typically by a registered AMI
    #[error("Resource is in use: {message}")]
    InUse { message: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    Throttled,

    /// Any other SDK error, with its code when one was reported
    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    /// Check if this is an "in use" error
    pub fn is_in_use(&self) -> bool {
        matches!(self, AwsError::InUse { .. })
    }

    /// Get a user-friendly suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            AwsError::InUse { .. } => suggestion_for_code("InvalidSnapshot.InUse"),
            AwsError::Throttled => suggestion_for_code("RequestLimitExceeded"),
            AwsError::Sdk { code: Some(c), .. } => suggestion_for_code(c),
            _ => None,
        }
    }
}

/// Known EC2 error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "InvalidSnapshot.NotFound",
    "InvalidVolume.NotFound",
    "InvalidInstanceID.NotFound",
];

/// Known EC2 error codes for resources still referenced elsewhere
const IN_USE_CODES: &[&str] = &["InvalidSnapshot.InUse"];

/// Known EC2 error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "SnapshotCreationPerVolumeRateExceeded",
];

/// Classify an EC2 error from its code and message.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound { message },
        Some(c) if IN_USE_CODES.contains(&c) => AwsError::InUse { message },
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled,
        _ => AwsError::Sdk {
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}

/// Classify an `anyhow::Error` by extracting the EC2 error code.
///
/// Walks the error chain looking for the SDK errors of the operations this
/// crate calls. Falls back to scanning the Debug representation for a known
/// code when no typed error is found.
pub fn classify_anyhow_error(error: &anyhow::Error) -> AwsError {
    use aws_sdk_ec2::error::{ProvideErrorMetadata, SdkError};
    use aws_sdk_ec2::operation::{
        create_snapshot::CreateSnapshotError, create_tags::CreateTagsError,
        delete_snapshot::DeleteSnapshotError, describe_instances::DescribeInstancesError,
        describe_snapshots::DescribeSnapshotsError,
    };

    for cause in error.chain() {
        if let Some(e) = cause.downcast_ref::<SdkError<DeleteSnapshotError>>() {
            return classify_aws_error(e.code(), e.message());
        }
        if let Some(e) = cause.downcast_ref::<SdkError<CreateSnapshotError>>() {
            return classify_aws_error(e.code(), e.message());
        }
        if let Some(e) = cause.downcast_ref::<SdkError<CreateTagsError>>() {
            return classify_aws_error(e.code(), e.message());
        }
        if let Some(e) = cause.downcast_ref::<SdkError<DescribeSnapshotsError>>() {
            return classify_aws_error(e.code(), e.message());
        }
        if let Some(e) = cause.downcast_ref::<SdkError<DescribeInstancesError>>() {
            return classify_aws_error(e.code(), e.message());
        }
    }

    // Fallback: extract error code from debug string representation
    let debug_str = format!("{:?}", error);
    if let Some(code) = extract_error_code(&debug_str) {
        return classify_aws_error(Some(code), Some(&error.to_string()));
    }

    AwsError::Sdk {
        code: None,
        message: error.to_string(),
    }
}

/// Extract a known EC2 error code from a debug string representation
fn extract_error_code(debug_str: &str) -> Option<&'static str> {
    NOT_FOUND_CODES
        .iter()
        .chain(IN_USE_CODES)
        .chain(THROTTLING_CODES)
        .find(|code| debug_str.contains(*code))
        .copied()
}

/// Error code to user-friendly suggestion mapping
const SUGGESTIONS: &[(&str, &str)] = &[
    (
        "InvalidSnapshot.InUse",
        "The snapshot backs a registered AMI. Deregister the image to let retention remove it.",
    ),
    (
        "RequestLimitExceeded",
        "EC2 API rate limit hit. The snapshot will be retried on the next scheduled run.",
    ),
    (
        "SnapshotCreationPerVolumeRateExceeded",
        "Snapshots of this volume are being created too quickly. Check for overlapping schedules.",
    ),
    (
        "UnauthorizedOperation",
        "The job's role lacks an EC2 snapshot permission. Check its IAM policy.",
    ),
];

/// Get a user-friendly suggestion for a known error code.
fn suggestion_for_code(code: &str) -> Option<&'static str> {
    SUGGESTIONS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, s)| *s)
}
