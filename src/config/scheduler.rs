//! Background cycle scheduling.
//!
//! # Example
//!
//! ```toml
//! [scheduler.rule_batch]
//! enabled = true
//! interval_secs = 3600
//!
//! [scheduler.dm_batch]
//! enabled = true
//! interval_secs = 300
//! max_retry = 5
//!
//! [scheduler.validation]
//! enabled = true
//! interval_secs = 600
//! ```

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Settings for the three background cycles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Rule-driven job reconciliation.
    #[serde(default)]
    pub rule_batch: RuleBatchConfig,

    /// On-demand delete queue processing.
    #[serde(default)]
    pub dm_batch: DmBatchConfig,

    /// Transfer operation status polling.
    #[serde(default)]
    pub validation: ValidationConfig,
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, interval, lease) in [
            (
                "rule_batch",
                self.rule_batch.interval_secs,
                Some(self.rule_batch.lock_lease_secs),
            ),
            (
                "dm_batch",
                self.dm_batch.interval_secs,
                Some(self.dm_batch.lock_lease_secs),
            ),
            ("validation", self.validation.interval_secs, None),
        ] {
            if interval == 0 {
                return Err(ConfigError::Validation(format!(
                    "scheduler.{name}.interval_secs must be at least 1"
                )));
            }
            if lease == Some(0) {
                return Err(ConfigError::Validation(format!(
                    "scheduler.{name}.lock_lease_secs must be at least 1"
                )));
            }
        }
        Ok(())
    }
}

/// Rule batch cycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleBatchConfig {
    /// Whether the cycle runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between cycle starts.
    #[serde(default = "default_rule_interval_secs")]
    pub interval_secs: u64,

    /// Lock lease duration. Must comfortably exceed the worst-case
    /// cycle time; an expired lease can be reclaimed by a peer while
    /// the previous holder is still working.
    #[serde(default = "default_lock_lease_secs")]
    pub lock_lease_secs: u64,
}

impl Default for RuleBatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_rule_interval_secs(),
            lock_lease_secs: default_lock_lease_secs(),
        }
    }
}

/// Delete queue cycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DmBatchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_dm_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_lock_lease_secs")]
    pub lock_lease_secs: u64,

    /// Requests whose jobs keep failing are dropped after this many
    /// rescheduling attempts.
    #[serde(default = "default_max_retry")]
    pub max_retry: i32,

    /// Completed and failed requests are purged once they are this
    /// many days old. 0 keeps them forever.
    #[serde(default = "default_purge_after_days")]
    pub purge_after_days: u32,
}

impl Default for DmBatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_dm_interval_secs(),
            lock_lease_secs: default_lock_lease_secs(),
            max_retry: default_max_retry(),
            purge_after_days: default_purge_after_days(),
        }
    }
}

/// Validation cycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_validation_interval_secs")]
    pub interval_secs: u64,

    /// Recurring global catch-all jobs are re-checked once their latest
    /// validation is older than this many hours.
    #[serde(default = "default_revalidate_after_hours")]
    pub revalidate_after_hours: u32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_validation_interval_secs(),
            revalidate_after_hours: default_revalidate_after_hours(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_rule_interval_secs() -> u64 {
    3600
}

fn default_dm_interval_secs() -> u64 {
    300
}

fn default_validation_interval_secs() -> u64 {
    600
}

fn default_lock_lease_secs() -> u64 {
    300
}

fn default_max_retry() -> i32 {
    5
}

fn default_revalidate_after_hours() -> u32 {
    24
}

fn default_purge_after_days() -> u32 {
    7
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert!(config.rule_batch.enabled);
        assert_eq!(config.rule_batch.interval_secs, 3600);
        assert_eq!(config.dm_batch.interval_secs, 300);
        assert_eq!(config.dm_batch.max_retry, 5);
        assert_eq!(config.validation.revalidate_after_hours, 24);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
            [dm_batch]
            enabled = false
            max_retry = 3
        "#;
        let config: SchedulerConfig = toml::from_str(toml).unwrap();
        assert!(config.rule_batch.enabled);
        assert!(!config.dm_batch.enabled);
        assert_eq!(config.dm_batch.max_retry, 3);
    }

    #[test]
    fn test_rejects_zero_lease() {
        let toml = r#"
            [rule_batch]
            lock_lease_secs = 0
        "#;
        let config: SchedulerConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }
}
