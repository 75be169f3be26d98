//! Client for the external bulk copy/delete job service.

mod client;
mod error;
mod types;

pub use client::HttpTransferClient;
pub use error::TransferError;
pub use types::{
    BucketRef, JobStatus, ListOperationsResponse, ObjectConditions, Operation, OperationError,
    OperationMetadata, Schedule, TimeOfDay, TransferJob, TransferOptions, TransferSpec,
    UpdateJobRequest, WireDate, duration_days,
};

use async_trait::async_trait;

/// The four calls the engine makes against the job service.
///
/// A trait seam so the reconcilers can be exercised against an in-memory
/// fake; `HttpTransferClient` is the production implementation.
#[async_trait]
pub trait TransferApi: Send + Sync {
    /// Submit a new job. The returned job carries the service-assigned name.
    async fn create_job(&self, job: &TransferJob) -> Result<TransferJob, TransferError>;

    /// Patch an existing job in place.
    async fn patch_job(
        &self,
        name: &str,
        request: &UpdateJobRequest,
    ) -> Result<TransferJob, TransferError>;

    /// Fetch a job by name. `None` when the service no longer knows it.
    async fn get_job(
        &self,
        project_id: &str,
        name: &str,
    ) -> Result<Option<TransferJob>, TransferError>;

    /// All operations run by the named jobs, across every result page.
    async fn list_operations(
        &self,
        project_id: &str,
        job_names: &[String],
    ) -> Result<Vec<Operation>, TransferError>;
}
