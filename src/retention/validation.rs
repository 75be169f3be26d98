//! Polling reconciliation of transfer operation status.
//!
//! The transfer service executes jobs asynchronously; the only way to
//! learn an outcome is to list each job's operations. Every cycle loads
//! the jobs still awaiting confirmation, asks the service per project
//! (the listing call is project-scoped), records one validation row per
//! operation, and cascades terminal outcomes of delete-queue jobs to the
//! requests riding on them.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::{
    db::{JobRepo, QueueRepo, StatusUpdate, ValidationRepo},
    models::{DmStatus, RetentionJob, RuleType, UpsertValidation, ValidationStatus},
    transfer::{Operation, TransferApi},
};

#[derive(Debug, Error)]
pub enum ValidationError {
    /// The service returned an operation name this engine cannot parse.
    /// That means the upstream naming contract changed; retrying will not
    /// help, code has to change.
    #[error("Operation name {0:?} does not match transferOperations/transferJob-<job>-<run>")]
    NamingContract(String),

    #[error(transparent)]
    Db(#[from] crate::db::DbError),
}

/// Tally of one validation cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationRunResult {
    pub jobs_checked: usize,
    pub validations_recorded: usize,
    pub projects_skipped: usize,
    pub requests_completed: usize,
    pub requests_retried: usize,
    pub requests_failed: usize,
}

pub struct ValidationReconciler {
    jobs: Arc<dyn JobRepo>,
    validations: Arc<dyn ValidationRepo>,
    queue: Arc<dyn QueueRepo>,
    transfer: Arc<dyn TransferApi>,
    /// Delete requests give up after this many reschedules.
    max_retry: i32,
    /// Staleness horizon for re-checking recurring bucket-wide jobs.
    revalidate_after: Duration,
}

impl ValidationReconciler {
    pub fn new(
        jobs: Arc<dyn JobRepo>,
        validations: Arc<dyn ValidationRepo>,
        queue: Arc<dyn QueueRepo>,
        transfer: Arc<dyn TransferApi>,
        max_retry: i32,
        revalidate_after: Duration,
    ) -> Self {
        Self {
            jobs,
            validations,
            queue,
            transfer,
            max_retry,
            revalidate_after,
        }
    }

    pub async fn run(&self) -> Result<ValidationRunResult, ValidationError> {
        let mut result = ValidationRunResult::default();

        let jobs = self.jobs.find_needing_validation(self.revalidate_after).await?;
        if jobs.is_empty() {
            return Ok(result);
        }
        result.jobs_checked = jobs.len();

        let existing = self
            .validations
            .find_for_jobs(&jobs.iter().map(|j| j.id).collect::<Vec<_>>())
            .await?;
        let existing_ids: HashMap<(i32, String), i32> = existing
            .into_iter()
            .map(|v| ((v.retention_job_id, v.job_operation_name), v.id))
            .collect();

        // The status listing is project-scoped.
        let mut by_project: BTreeMap<&str, Vec<&RetentionJob>> = BTreeMap::new();
        for job in &jobs {
            by_project.entry(&job.project_id).or_default().push(job);
        }

        let mut upserts: Vec<UpsertValidation> = Vec::new();
        let mut outcomes: Vec<(&RetentionJob, ValidationStatus)> = Vec::new();

        for (project_id, project_jobs) in by_project {
            let mut names = Vec::new();
            let mut by_service_id: HashMap<&str, &RetentionJob> = HashMap::new();
            for job in project_jobs {
                let Some(name) = job.name.as_deref() else {
                    continue;
                };
                names.push(name.to_string());
                if let Some(id) = name.rsplit('/').next() {
                    by_service_id.insert(id, job);
                }
            }
            if names.is_empty() {
                continue;
            }

            let operations = match self.transfer.list_operations(project_id, &names).await {
                Ok(operations) => operations,
                Err(e) => {
                    tracing::warn!(project_id, error = %e,
                        "operation listing failed; project deferred to next cycle");
                    result.projects_skipped += 1;
                    continue;
                }
            };

            let mut per_job: HashMap<i32, (&RetentionJob, Vec<ObservedOperation>)> = HashMap::new();
            for operation in &operations {
                let service_id = job_id_of_operation(&operation.name)?;
                let Some(job) = by_service_id.get(service_id) else {
                    tracing::debug!(operation = %operation.name,
                        "operation belongs to a job outside this cycle");
                    continue;
                };
                let observed = classify_operation(operation);
                upserts.push(UpsertValidation {
                    id: existing_ids
                        .get(&(job.id, operation.name.clone()))
                        .copied(),
                    retention_job_id: job.id,
                    job_operation_name: operation.name.clone(),
                    status: observed.status,
                    start_time: observed.start_time,
                    end_time: observed.end_time,
                });
                per_job
                    .entry(job.id)
                    .or_insert_with(|| (*job, Vec::new()))
                    .1
                    .push(observed);
            }

            for (_, (job, observed)) in per_job {
                if let Some(outcome) = job_outcome(&observed) {
                    outcomes.push((job, outcome));
                }
            }
        }

        result.validations_recorded = self.validations.upsert_batch(upserts).await?;
        self.cascade(&outcomes, &mut result).await?;

        Ok(result)
    }

    /// Push terminal delete-job outcomes down to the queue entries that
    /// were scheduled on them.
    async fn cascade(
        &self,
        outcomes: &[(&RetentionJob, ValidationStatus)],
        result: &mut ValidationRunResult,
    ) -> Result<(), ValidationError> {
        let mut updates: Vec<StatusUpdate> = Vec::new();

        for (job, outcome) in outcomes {
            if job.rule_type != RuleType::User || !outcome.is_terminal() {
                continue;
            }
            for request in self.queue.find_scheduled_for_job(job.id).await? {
                let Some((status, retries)) =
                    next_request_state(*outcome, request.number_of_retry, self.max_retry)
                else {
                    continue;
                };
                match status {
                    DmStatus::Success => result.requests_completed += 1,
                    DmStatus::Retry => result.requests_retried += 1,
                    DmStatus::Fail => {
                        tracing::error!(
                            request_id = request.id,
                            storage = %request.data_storage_name,
                            retries,
                            "delete request exhausted its retry budget"
                        );
                        result.requests_failed += 1;
                    }
                    _ => {}
                }
                updates.push(StatusUpdate {
                    request_id: request.id,
                    status,
                    number_of_retry: retries,
                });
            }
        }

        self.queue.update_statuses(&updates).await?;
        Ok(())
    }
}

/// One operation's observed state.
#[derive(Debug, Clone, Copy)]
struct ObservedOperation {
    status: ValidationStatus,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
}

/// Extract the service job id out of an operation name,
/// `transferOperations/transferJob-<jobid>-<opid>`: the text between the
/// first and the last hyphen, so job ids containing hyphens survive.
fn job_id_of_operation(name: &str) -> Result<&str, ValidationError> {
    let (Some(first), Some(last)) = (name.find('-'), name.rfind('-')) else {
        return Err(ValidationError::NamingContract(name.to_string()));
    };
    if first + 1 >= last {
        return Err(ValidationError::NamingContract(name.to_string()));
    }
    Ok(&name[first + 1..last])
}

fn classify_operation(operation: &Operation) -> ObservedOperation {
    let (start_time, end_time) = operation
        .metadata
        .as_ref()
        .map(|m| (m.start_time, m.end_time))
        .unwrap_or((None, None));

    let status = if !operation.done {
        ValidationStatus::Pending
    } else if operation.error.is_some() {
        ValidationStatus::Error
    } else if operation.response.is_some() {
        ValidationStatus::Success
    } else {
        // Done without response or error: the service has not finished
        // materializing the result yet.
        ValidationStatus::Pending
    };

    ObservedOperation {
        status,
        start_time,
        end_time,
    }
}

/// The job-level outcome is the state of its newest run.
fn job_outcome(observed: &[ObservedOperation]) -> Option<ValidationStatus> {
    observed
        .iter()
        .max_by_key(|o| o.start_time)
        .map(|o| o.status)
}

/// Queue transition for one request given its job's terminal outcome.
/// Errors consume one retry; the request fails for good once the budget
/// is spent.
fn next_request_state(
    outcome: ValidationStatus,
    number_of_retry: i32,
    max_retry: i32,
) -> Option<(DmStatus, i32)> {
    match outcome {
        ValidationStatus::Success => Some((DmStatus::Success, number_of_retry)),
        ValidationStatus::Error => {
            if number_of_retry < max_retry {
                Some((DmStatus::Retry, number_of_retry + 1))
            } else {
                Some((DmStatus::Fail, number_of_retry))
            }
        }
        ValidationStatus::Pending => None,
    }
}

/// Periodic driver for the validation cycle. Runs until the task is
/// aborted.
pub async fn validation_worker(
    reconciler: Arc<ValidationReconciler>,
    config: crate::config::ValidationConfig,
) {
    if !config.enabled {
        tracing::info!("validation cycle disabled");
        return;
    }
    let interval = std::time::Duration::from_secs(config.interval_secs);
    tracing::info!(interval_secs = interval.as_secs(), "validation worker started");

    loop {
        match reconciler.run().await {
            Ok(result) if result.jobs_checked > 0 => {
                tracing::info!(
                    jobs = result.jobs_checked,
                    recorded = result.validations_recorded,
                    skipped_projects = result.projects_skipped,
                    completed = result.requests_completed,
                    retried = result.requests_retried,
                    failed = result.requests_failed,
                    "validation cycle finished"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "validation cycle failed"),
        }
        tokio::time::sleep(interval).await;
    }
}
