use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RuleType;

/// A record of one submission to the external transfer service.
///
/// `name` is the service-assigned job name; it stays `None` when the
/// submission failed so the row still documents the attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionJob {
    pub id: i32,
    pub name: Option<String>,
    pub project_id: String,
    pub data_storage_name: String,
    /// Bucket the job operates on, without any dataset path.
    pub data_storage_root: String,
    pub rule_type: RuleType,
    pub rule_version: i32,
    /// Correlates the jobs created by one engine cycle.
    pub batch_id: Option<String>,
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for recording a job submission.
#[derive(Debug, Clone)]
pub struct CreateRetentionJob {
    pub name: Option<String>,
    pub project_id: String,
    pub data_storage_name: String,
    pub data_storage_root: String,
    pub rule_type: RuleType,
    pub rule_version: i32,
    pub batch_id: Option<String>,
    pub metadata: Option<String>,
}
