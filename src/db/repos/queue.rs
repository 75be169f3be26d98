use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    db::error::DbResult,
    models::{CreateRetentionJob, DmRequest, DmStatus, RetentionJob},
};

/// Retry and priority bookkeeping applied to a request as it is
/// attached to a job.
#[derive(Debug, Clone)]
pub struct ScheduleUpdate {
    pub request_id: i32,
    pub number_of_retry: i32,
    pub priority: i64,
}

/// Status transition applied after a job outcome is known.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub request_id: i32,
    pub status: DmStatus,
    pub number_of_retry: i32,
}

/// Repository for the on-demand delete queue.
#[async_trait]
pub trait QueueRepo: Send + Sync {
    /// Requests waiting for a batch cycle, ordered by priority descending,
    /// retry count descending, then age. Retries sort before fresh work at
    /// equal priority so a request cannot starve behind new arrivals.
    async fn find_ready(&self) -> DbResult<Vec<DmRequest>>;

    /// Requests attached to one submitted job.
    async fn find_scheduled_for_job(&self, retention_job_id: i32) -> DbResult<Vec<DmRequest>>;

    /// Record a job submission and flip the batched requests to scheduled,
    /// in one transaction. Requests left out of `updates` stay pending and
    /// surface again next cycle.
    async fn schedule_batch(
        &self,
        job: CreateRetentionJob,
        updates: &[ScheduleUpdate],
    ) -> DbResult<RetentionJob>;

    /// Apply outcome transitions. Returns the number of rows changed.
    async fn update_statuses(&self, updates: &[StatusUpdate]) -> DbResult<usize>;

    /// Purge success/fail rows last touched before the cutoff.
    async fn delete_terminal_older_than(&self, cutoff: DateTime<Utc>) -> DbResult<u64>;
}
