use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of the most recent status check for one transfer operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    /// The operation has not finished yet.
    Pending,
    Success,
    Error,
}

impl ValidationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ValidationStatus::Pending)
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationStatus::Pending => write!(f, "pending"),
            ValidationStatus::Success => write!(f, "success"),
            ValidationStatus::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for ValidationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ValidationStatus::Pending),
            "success" => Ok(ValidationStatus::Success),
            "error" => Ok(ValidationStatus::Error),
            _ => Err(format!("Invalid validation status: {}", s)),
        }
    }
}

/// Latest observed state of one operation run by a retention job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobValidation {
    pub id: i32,
    pub retention_job_id: i32,
    /// Operation name as reported by the transfer service.
    pub job_operation_name: String,
    pub status: ValidationStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for recording an operation's observed state. When `id` is set the
/// existing row is updated in place, otherwise a new row is inserted.
#[derive(Debug, Clone)]
pub struct UpsertValidation {
    pub id: Option<i32>,
    pub retention_job_id: i32,
    pub job_operation_name: String,
    pub status: ValidationStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}
