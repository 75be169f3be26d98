use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scope of a retention rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    /// Applies to a single dataset path inside a bucket.
    Dataset,
    /// Bucket-wide catch-all that excludes the sibling dataset rules.
    Default,
    /// Organization-wide catch-all applied to buckets without a default rule.
    Global,
    /// On-demand delete requests batched from the queue.
    User,
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleType::Dataset => write!(f, "dataset"),
            RuleType::Default => write!(f, "default"),
            RuleType::Global => write!(f, "global"),
            RuleType::User => write!(f, "user"),
        }
    }
}

impl std::str::FromStr for RuleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dataset" => Ok(RuleType::Dataset),
            "default" => Ok(RuleType::Default),
            "global" => Ok(RuleType::Global),
            "user" => Ok(RuleType::User),
            _ => Err(format!("Invalid rule type: {}", s)),
        }
    }
}

/// A retention rule for a storage scope.
///
/// `data_storage_name` is `bucket` for default/global rules and
/// `bucket/dataset/path` for dataset rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionRule {
    pub id: i32,
    pub rule_type: RuleType,
    pub project_id: String,
    pub data_storage_name: String,
    /// Objects older than this many days are eligible for removal.
    pub retention_days: i32,
    pub version: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
