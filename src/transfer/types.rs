//! Wire types for the transfer service REST API.
//!
//! The service speaks camelCase JSON. Calendar dates travel as exploded
//! `{year, month, day}` objects rather than strings, and durations as
//! second-counts with an `s` suffix.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A bulk copy/delete job definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferJob {
    /// Service-assigned resource name, `transferJobs/<id>`. Absent on
    /// creation requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub project_id: String,

    pub status: JobStatus,

    pub schedule: Schedule,

    pub transfer_spec: TransferSpec,

    /// Output-only; set by the service on every mutation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modification_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    #[serde(rename = "ENABLED")]
    Enabled,
    #[serde(rename = "DISABLED")]
    Disabled,
    #[serde(rename = "DELETED")]
    Deleted,
}

/// When and how often a job runs.
///
/// A start date equal to the end date makes the job one-shot; no end date
/// makes it recur daily. The service runs a job immediately when its start
/// date is in the past, which is why submissions date jobs to yesterday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub schedule_start_date: WireDate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_end_date: Option<WireDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time_of_day: Option<TimeOfDay>,
}

impl Schedule {
    /// One-shot schedule that the service will run as soon as it admits
    /// the job.
    pub fn once_immediately(now: DateTime<Utc>) -> Self {
        let yesterday = WireDate::from(now.date_naive().pred_opt().unwrap_or(now.date_naive()));
        Schedule {
            schedule_start_date: yesterday,
            schedule_end_date: Some(yesterday),
            start_time_of_day: None,
        }
    }

    /// Daily recurring schedule, first run as soon as admitted.
    pub fn daily_from(now: DateTime<Utc>) -> Self {
        Schedule {
            schedule_start_date: WireDate::from(
                now.date_naive().pred_opt().unwrap_or(now.date_naive()),
            ),
            schedule_end_date: None,
            start_time_of_day: None,
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.schedule_end_date.is_none()
    }
}

/// Calendar date in wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl From<NaiveDate> for WireDate {
    fn from(d: NaiveDate) -> Self {
        WireDate {
            year: d.year(),
            month: d.month(),
            day: d.day(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    #[serde(default)]
    pub hours: u32,
    #[serde(default)]
    pub minutes: u32,
    #[serde(default)]
    pub seconds: u32,
}

/// What a job moves and where.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSpec {
    pub gcs_data_source: BucketRef,

    pub gcs_data_sink: BucketRef,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_conditions: Option<ObjectConditions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_options: Option<TransferOptions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketRef {
    pub bucket_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectConditions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_prefixes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_prefixes: Vec<String>,

    /// Only objects older than this duration are touched, e.g. `"8640000s"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_time_elapsed_since_last_modification: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOptions {
    #[serde(default)]
    pub delete_objects_from_source_after_transfer: bool,
}

/// Patch envelope for `PATCH /v1/transferJobs/<id>`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJobRequest {
    pub project_id: String,
    pub transfer_job: TransferJob,
    pub update_transfer_job_field_mask: String,
}

/// One execution of a job.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// `transferOperations/transferJob-<jobid>-<opid>`.
    pub name: String,

    #[serde(default)]
    pub done: bool,

    #[serde(default)]
    pub metadata: Option<OperationMetadata>,

    #[serde(default)]
    pub response: Option<serde_json::Value>,

    #[serde(default)]
    pub error: Option<OperationError>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationMetadata {
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationError {
    #[serde(default)]
    pub code: Option<i32>,

    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOperationsResponse {
    #[serde(default)]
    pub operations: Vec<Operation>,

    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Encode a day count the way the wire wants durations.
pub fn duration_days(days: u32) -> String {
    format!("{}s", u64::from(days) * 86_400)
}
