use async_trait::async_trait;
use chrono::Duration;

use crate::{
    db::error::DbResult,
    models::{CreateRetentionJob, RetentionJob, RuleType},
};

/// Repository for submitted retention jobs.
#[async_trait]
pub trait JobRepo: Send + Sync {
    async fn create(&self, input: CreateRetentionJob) -> DbResult<RetentionJob>;

    /// Most recent job for a bucket and rule type that got a service name.
    /// Bucket-wide and queue jobs are patched in place, so the latest named
    /// row points at the live external job.
    async fn find_latest_named_for_scope(
        &self,
        data_storage_root: &str,
        rule_type: RuleType,
    ) -> DbResult<Option<RetentionJob>>;

    /// Jobs whose outcome is still unknown: named jobs whose latest
    /// validation is missing or pending, plus global catch-all jobs
    /// whose latest validation is older than `revalidate_after`.
    async fn find_needing_validation(
        &self,
        revalidate_after: Duration,
    ) -> DbResult<Vec<RetentionJob>>;
}
