use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of an on-demand delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DmStatus {
    /// Waiting to be picked up by a batch cycle.
    Pending,
    /// Attached to a submitted retention job, awaiting its outcome.
    Scheduled,
    /// The job it rode on failed; eligible for another cycle.
    Retry,
    Success,
    /// Exhausted its retry budget.
    Fail,
}

impl std::fmt::Display for DmStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DmStatus::Pending => write!(f, "pending"),
            DmStatus::Scheduled => write!(f, "scheduled"),
            DmStatus::Retry => write!(f, "retry"),
            DmStatus::Success => write!(f, "success"),
            DmStatus::Fail => write!(f, "fail"),
        }
    }
}

impl std::str::FromStr for DmStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DmStatus::Pending),
            "scheduled" => Ok(DmStatus::Scheduled),
            "retry" => Ok(DmStatus::Retry),
            "success" => Ok(DmStatus::Success),
            "fail" => Ok(DmStatus::Fail),
            _ => Err(format!("Invalid request status: {}", s)),
        }
    }
}

/// A queued request to delete one dataset path on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DmRequest {
    pub id: i32,
    pub project_id: String,
    /// Bucket the dataset lives in.
    pub data_storage_root: String,
    /// Full storage name, `bucket/dataset/path`.
    pub data_storage_name: String,
    pub status: DmStatus,
    pub priority: i64,
    pub number_of_retry: i32,
    /// Set once the request is attached to a submitted job.
    pub retention_job_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
