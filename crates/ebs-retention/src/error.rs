//! Configuration loading and validation errors

use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An `excludeInstanceTags` entry is not a single key/value pair
    #[error("excludeInstanceTags[{index}] must contain exactly one tag, got {count}")]
    InvalidExcludeTag { index: usize, count: usize },

    /// A retention horizon is beyond the accepted maximum
    #[error("{field} of {value} exceeds the maximum retention of {max_days} days")]
    RetentionTooLong {
        field: &'static str,
        value: u32,
        max_days: i64,
    },

    /// Failed to parse JSON configuration
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Failed to read configuration file
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Create an IO error with path context
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
