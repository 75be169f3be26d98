//! Transfer service configuration.
//!
//! # Example
//!
//! ```toml
//! [transfer]
//! base_url = "https://storagetransfer.googleapis.com/v1"
//! shadow_bucket_suffix = "-shadow"
//! lookback_days = 365
//! max_prefix_count = 1000
//! exclude_prefixes = ["landing/", "tmp/"]
//! ```

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Connection and policy settings for the external transfer service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransferConfig {
    /// Base URL of the transfer service REST API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Suffix appended to a source bucket to name its shadow bucket.
    /// Removed objects are moved there rather than destroyed outright.
    #[serde(default = "default_shadow_bucket_suffix")]
    pub shadow_bucket_suffix: String,

    /// How far back dataset prefix generation reaches, in days.
    /// Bounds the prefix list for buckets with long histories.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Maximum number of include/exclude prefixes one job may carry.
    /// Service-imposed limit; overflow is split across jobs or deferred.
    #[serde(default = "default_max_prefix_count")]
    pub max_prefix_count: usize,

    /// Prefixes every bucket-wide job excludes in addition to the
    /// sibling dataset paths.
    #[serde(default)]
    pub exclude_prefixes: Vec<String>,

    /// Exclude prefixes applied when a bucket-wide job would otherwise
    /// have an empty exclude list. An empty list here makes the engine
    /// generate a throwaway no-op prefix instead, since the service
    /// rejects catch-all jobs without any exclusion.
    #[serde(default)]
    pub fallback_exclude_prefixes: Vec<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            shadow_bucket_suffix: default_shadow_bucket_suffix(),
            lookback_days: default_lookback_days(),
            max_prefix_count: default_max_prefix_count(),
            exclude_prefixes: Vec::new(),
            fallback_exclude_prefixes: Vec::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl TransferConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::Validation(
                "transfer.base_url cannot be empty".into(),
            ));
        }
        if self.max_prefix_count == 0 {
            return Err(ConfigError::Validation(
                "transfer.max_prefix_count must be at least 1".into(),
            ));
        }
        if self.lookback_days == 0 {
            return Err(ConfigError::Validation(
                "transfer.lookback_days must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_base_url() -> String {
    "https://storagetransfer.googleapis.com/v1".to_string()
}

fn default_shadow_bucket_suffix() -> String {
    "-shadow".to_string()
}

fn default_lookback_days() -> u32 {
    365
}

fn default_max_prefix_count() -> usize {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}
