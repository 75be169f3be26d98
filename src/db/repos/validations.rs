use async_trait::async_trait;

use crate::{
    db::error::DbResult,
    models::{JobValidation, UpsertValidation},
};

/// Repository for per-operation validation results.
#[async_trait]
pub trait ValidationRepo: Send + Sync {
    /// All validation rows belonging to the given jobs.
    async fn find_for_jobs(&self, job_ids: &[i32]) -> DbResult<Vec<JobValidation>>;

    /// Insert or update a batch of observed operation states. Rows with an
    /// `id` update in place, the rest are inserted. Returns the row count.
    async fn upsert_batch(&self, rows: Vec<UpsertValidation>) -> DbResult<usize>;
}
