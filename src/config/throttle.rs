use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Submission rate limiting for the transfer service.
///
/// Job creations and patches pass through a queue that releases at most
/// `limit` submissions every `interval_ms` milliseconds, so a burst of
/// rules never trips the service's admission quota.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThrottleConfig {
    /// Maximum submissions released per tick.
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Tick interval in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Upper bound on concurrently executing submissions.
    #[serde(default = "default_worker_pool")]
    pub worker_pool: usize,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            interval_ms: default_interval_ms(),
            worker_pool: default_worker_pool(),
        }
    }
}

impl ThrottleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limit == 0 {
            return Err(ConfigError::Validation(
                "throttle.limit must be at least 1".into(),
            ));
        }
        if self.worker_pool == 0 {
            return Err(ConfigError::Validation(
                "throttle.worker_pool must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.interval_ms)
    }
}

fn default_limit() -> usize {
    10
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_worker_pool() -> usize {
    20
}
