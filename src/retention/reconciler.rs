//! Reconciliation of retention rules and queued delete requests into
//! transfer service jobs.
//!
//! Dataset rules become one-shot jobs whose include prefixes cover the
//! expired part of the dataset timeline. Bucket-wide rules (default and
//! global) each map to a single recurring job that is patched in place
//! when its derived shape drifts. Queued delete requests are folded into
//! one recurring job per bucket, appending prefixes until the service's
//! per-job cap is reached.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::prefix::{self, time_prefixes};
use crate::{
    config::TransferConfig,
    db::{JobRepo, ScheduleUpdate},
    models::{CreateRetentionJob, DmRequest, RetentionRule, RuleType},
    notify::NotificationPublisher,
    throttle::QuotaThrottle,
    transfer::{
        BucketRef, JobStatus, ObjectConditions, Schedule, TransferApi, TransferError, TransferJob,
        TransferOptions, TransferSpec, UpdateJobRequest, duration_days,
    },
};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Rule {rule_id} has type {actual}, expected {expected}")]
    RuleTypeMismatch {
        rule_id: i32,
        actual: RuleType,
        expected: RuleType,
    },

    #[error(transparent)]
    Db(#[from] crate::db::DbError),
}

/// What happened to a bucket-wide job during reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultAction {
    Created,
    Patched,
    /// The live job already matches the rule; nothing was sent.
    Unchanged,
    /// The service call failed; the returned row carries no job name.
    Failed,
}

pub struct DefaultOutcome {
    pub job: CreateRetentionJob,
    pub action: DefaultAction,
}

/// A delete-queue batch ready to be persisted: the job row plus the
/// bookkeeping for every request that was attached to it.
pub struct DmBatchPlan {
    pub job: CreateRetentionJob,
    pub updates: Vec<ScheduleUpdate>,
}

pub struct JobReconciler {
    transfer: Arc<dyn TransferApi>,
    throttle: Arc<QuotaThrottle>,
    jobs: Arc<dyn JobRepo>,
    notifier: Arc<dyn NotificationPublisher>,
    config: TransferConfig,
}

impl JobReconciler {
    pub fn new(
        transfer: Arc<dyn TransferApi>,
        throttle: Arc<QuotaThrottle>,
        jobs: Arc<dyn JobRepo>,
        notifier: Arc<dyn NotificationPublisher>,
        config: TransferConfig,
    ) -> Self {
        Self {
            transfer,
            throttle,
            jobs,
            notifier,
            config,
        }
    }

    /// Reconcile the dataset rules of one bucket.
    ///
    /// Rules are packed first-fit into as few jobs as the prefix cap
    /// allows. A failed submission is recorded as a row without a job
    /// name; the remaining chunks still go out.
    pub async fn reconcile_dataset_rules(
        &self,
        project_id: &str,
        bucket: &str,
        rules: &[RetentionRule],
        now: DateTime<Utc>,
    ) -> Result<Vec<CreateRetentionJob>, ReconcileError> {
        for rule in rules {
            if rule.rule_type != RuleType::Dataset {
                return Err(ReconcileError::RuleTypeMismatch {
                    rule_id: rule.id,
                    actual: rule.rule_type,
                    expected: RuleType::Dataset,
                });
            }
        }

        let batch_id = Uuid::new_v4().to_string();
        let chunks = self.pack_dataset_chunks(rules, now);
        let mut created = Vec::new();

        for chunk in chunks {
            self.notifier
                .publish_scheduled_removal(project_id, bucket, &chunk.prefixes)
                .await;

            let job = TransferJob {
                name: None,
                description: Some(describe_rules("dataset", bucket, &chunk.rules)),
                project_id: project_id.to_string(),
                status: JobStatus::Enabled,
                schedule: Schedule::once_immediately(now),
                transfer_spec: self.spec_for_bucket(bucket, chunk.prefixes.clone(), vec![], None),
                last_modification_time: None,
            };

            let name = match self.submit_create(job).await {
                Ok(submitted) => submitted.name,
                Err(e) => {
                    tracing::warn!(
                        bucket,
                        rule_count = chunk.rules.len(),
                        error = %e,
                        "dataset job submission failed; recording unnamed job"
                    );
                    None
                }
            };

            for rule in &chunk.rules {
                created.push(CreateRetentionJob {
                    name: name.clone(),
                    project_id: rule.project_id.clone(),
                    data_storage_name: rule.data_storage_name.clone(),
                    data_storage_root: bucket.to_string(),
                    rule_type: RuleType::Dataset,
                    rule_version: rule.version,
                    batch_id: Some(batch_id.clone()),
                    metadata: None,
                });
            }
        }

        Ok(created)
    }

    /// Reconcile one bucket-wide rule (default or global) against the
    /// live job for its bucket.
    pub async fn reconcile_default_rule(
        &self,
        project_id: &str,
        bucket: &str,
        rule: &RetentionRule,
        sibling_datasets: &[RetentionRule],
        now: DateTime<Utc>,
    ) -> Result<DefaultOutcome, ReconcileError> {
        if !matches!(rule.rule_type, RuleType::Default | RuleType::Global) {
            return Err(ReconcileError::RuleTypeMismatch {
                rule_id: rule.id,
                actual: rule.rule_type,
                expected: RuleType::Default,
            });
        }

        let excludes = self.default_excludes(sibling_datasets);
        let min_age = duration_days(rule.retention_days.max(0) as u32);
        let row = |name: Option<String>| CreateRetentionJob {
            name,
            project_id: project_id.to_string(),
            data_storage_name: bucket.to_string(),
            data_storage_root: bucket.to_string(),
            rule_type: rule.rule_type,
            rule_version: rule.version,
            batch_id: None,
            metadata: None,
        };

        let current = match self.find_live_job(project_id, bucket, rule.rule_type).await {
            Ok(current) => current,
            Err(e) => {
                tracing::warn!(bucket, error = %e, "live job lookup failed");
                return Ok(DefaultOutcome {
                    job: row(None),
                    action: DefaultAction::Failed,
                });
            }
        };

        if let Some(current) = current {
            let name = current.name.clone().unwrap_or_default();
            if !default_job_needs_patch(&current, &excludes, &min_age) {
                return Ok(DefaultOutcome {
                    job: row(Some(name)),
                    action: DefaultAction::Unchanged,
                });
            }

            let mut patched = current.clone();
            patched.transfer_spec.object_conditions = Some(ObjectConditions {
                include_prefixes: vec![],
                exclude_prefixes: excludes,
                min_time_elapsed_since_last_modification: Some(min_age),
            });
            patched.status = JobStatus::Enabled;

            let request = UpdateJobRequest {
                project_id: project_id.to_string(),
                transfer_job: patched,
                update_transfer_job_field_mask: "transferSpec,status".to_string(),
            };
            return match self.submit_patch(name.clone(), request).await {
                Ok(_) => Ok(DefaultOutcome {
                    job: row(Some(name)),
                    action: DefaultAction::Patched,
                }),
                Err(e) => {
                    tracing::warn!(bucket, job = name, error = %e, "bucket-wide job patch failed");
                    Ok(DefaultOutcome {
                        job: row(None),
                        action: DefaultAction::Failed,
                    })
                }
            };
        }

        let job = TransferJob {
            name: None,
            description: Some(describe_rules(
                rule.rule_type.to_string().as_str(),
                bucket,
                &[rule],
            )),
            project_id: project_id.to_string(),
            status: JobStatus::Enabled,
            schedule: Schedule::daily_from(now),
            transfer_spec: self.spec_for_bucket(bucket, vec![], excludes, Some(min_age)),
            last_modification_time: None,
        };

        match self.submit_create(job).await {
            Ok(submitted) => Ok(DefaultOutcome {
                job: row(submitted.name),
                action: DefaultAction::Created,
            }),
            Err(e) => {
                tracing::warn!(bucket, error = %e, "bucket-wide job submission failed");
                Ok(DefaultOutcome {
                    job: row(None),
                    action: DefaultAction::Failed,
                })
            }
        }
    }

    /// Fold queued delete requests for one bucket into its delete job.
    ///
    /// Requests are taken in queue order until the prefix cap fills;
    /// whatever does not fit stays pending for a later cycle. Returns
    /// `None` when nothing could be attached or the service refused.
    pub async fn reconcile_dm_batch(
        &self,
        project_id: &str,
        bucket: &str,
        requests: &[DmRequest],
        now: DateTime<Utc>,
    ) -> Result<Option<DmBatchPlan>, ReconcileError> {
        let current = match self.find_live_job(project_id, bucket, RuleType::User).await {
            Ok(current) => current,
            Err(e) => {
                tracing::warn!(bucket, error = %e, "live delete job lookup failed; leaving requests queued");
                return Ok(None);
            }
        };

        let mut include = prefix::consolidate(match &current {
            Some(job) if !include_list_consumed(job.last_modification_time, now) => job
                .transfer_spec
                .object_conditions
                .as_ref()
                .map(|c| c.include_prefixes.clone())
                .unwrap_or_default(),
            _ => Vec::new(),
        });

        let mut updates = Vec::new();
        let mut attached_prefixes = Vec::new();
        for request in requests {
            let Some(candidate) = prefix::delete_prefix(&request.data_storage_name) else {
                tracing::warn!(
                    request_id = request.id,
                    name = %request.data_storage_name,
                    "delete request without a dataset path; skipping"
                );
                continue;
            };

            // A request whose prefix is already covered rides along for
            // free; otherwise the candidate may subsume narrower entries
            // before it counts against the cap.
            if !include.iter().any(|k| candidate.starts_with(k.as_str())) {
                include.retain(|k| !k.starts_with(candidate.as_str()));
                if include.len() + 1 > self.config.max_prefix_count {
                    break;
                }
                include.push(candidate.clone());
            }
            attached_prefixes.push(candidate);
            // Retry counting is owned by the validation cascade; here a
            // retried request only has its priority recomputed.
            updates.push(ScheduleUpdate {
                request_id: request.id,
                number_of_retry: request.number_of_retry,
                priority: prefix::requeue_priority(request.number_of_retry),
            });
        }

        if updates.is_empty() {
            return Ok(None);
        }
        let include = prefix::consolidate(include);

        self.notifier
            .publish_scheduled_removal(project_id, bucket, &attached_prefixes)
            .await;

        let submitted_name = match current {
            Some(live) => {
                let name = live.name.clone().unwrap_or_default();
                let mut patched = live;
                patched.transfer_spec.object_conditions = Some(ObjectConditions {
                    include_prefixes: include,
                    exclude_prefixes: vec![],
                    min_time_elapsed_since_last_modification: None,
                });
                patched.status = JobStatus::Enabled;

                let request = UpdateJobRequest {
                    project_id: project_id.to_string(),
                    transfer_job: patched,
                    update_transfer_job_field_mask: "transferSpec,status".to_string(),
                };
                self.submit_patch(name.clone(), request).await.map(|_| name)
            }
            None => {
                let job = TransferJob {
                    name: None,
                    description: Some(format!("on-demand deletes for {bucket}")),
                    project_id: project_id.to_string(),
                    status: JobStatus::Enabled,
                    schedule: Schedule::daily_from(now),
                    transfer_spec: self.spec_for_bucket(bucket, include, vec![], None),
                    last_modification_time: None,
                };
                self.submit_create(job)
                    .await
                    .map(|submitted| submitted.name.unwrap_or_default())
            }
        };

        match submitted_name {
            Ok(name) => Ok(Some(DmBatchPlan {
                job: CreateRetentionJob {
                    name: Some(name),
                    project_id: project_id.to_string(),
                    data_storage_name: bucket.to_string(),
                    data_storage_root: bucket.to_string(),
                    rule_type: RuleType::User,
                    rule_version: 0,
                    batch_id: Some(Uuid::new_v4().to_string()),
                    metadata: None,
                },
                updates,
            })),
            Err(e) => {
                tracing::warn!(bucket, error = %e, "delete job submission failed; leaving requests queued");
                Ok(None)
            }
        }
    }

    fn pack_dataset_chunks<'a>(
        &self,
        rules: &'a [RetentionRule],
        now: DateTime<Utc>,
    ) -> Vec<DatasetChunk<'a>> {
        let mut chunks: Vec<DatasetChunk<'a>> = Vec::new();

        for rule in rules {
            let Some(path) = prefix::dataset_path(&rule.data_storage_name) else {
                tracing::warn!(rule_id = rule.id, name = %rule.data_storage_name,
                    "dataset rule without a dataset path; skipping");
                continue;
            };

            let lower = now - Duration::days(i64::from(self.config.lookback_days));
            let upper = now - Duration::days(i64::from(rule.retention_days.max(0) as u32));
            let prefixes = match time_prefixes(path, lower, upper) {
                Ok(prefixes) => prefixes,
                Err(e) => {
                    tracing::warn!(rule_id = rule.id, error = %e,
                        "retention window exceeds lookback; skipping rule");
                    continue;
                }
            };
            if prefixes.is_empty() {
                tracing::debug!(rule_id = rule.id, "no expired partitions for rule");
                continue;
            }

            let slot = chunks
                .iter_mut()
                .find(|c| c.prefixes.len() + prefixes.len() <= self.config.max_prefix_count);
            match slot {
                Some(chunk) => {
                    chunk.rules.push(rule);
                    chunk.prefixes.extend(prefixes);
                }
                None => chunks.push(DatasetChunk {
                    rules: vec![rule],
                    prefixes,
                }),
            }
        }

        chunks
    }

    /// Exclude list for a bucket-wide job: configured permanent excludes
    /// plus every sibling dataset path, so dataset rules keep sole
    /// ownership of their subtrees. Falls back to the configured fallback
    /// list, then to a generated no-match prefix, because the service
    /// rejects a catch-all job with an empty exclusion set.
    fn default_excludes(&self, sibling_datasets: &[RetentionRule]) -> Vec<String> {
        let mut excludes: Vec<String> = self.config.exclude_prefixes.clone();
        excludes.extend(
            sibling_datasets
                .iter()
                .filter_map(|r| prefix::delete_prefix(&r.data_storage_name)),
        );

        if excludes.is_empty() {
            excludes = self.config.fallback_exclude_prefixes.clone();
        }
        if excludes.is_empty() {
            excludes.push(format!("{}-noop-exclude/", Uuid::new_v4()));
        }
        prefix::consolidate(excludes)
    }

    fn spec_for_bucket(
        &self,
        bucket: &str,
        include_prefixes: Vec<String>,
        exclude_prefixes: Vec<String>,
        min_age: Option<String>,
    ) -> TransferSpec {
        TransferSpec {
            gcs_data_source: BucketRef {
                bucket_name: bucket.to_string(),
            },
            gcs_data_sink: BucketRef {
                bucket_name: format!("{bucket}{}", self.config.shadow_bucket_suffix),
            },
            object_conditions: Some(ObjectConditions {
                include_prefixes,
                exclude_prefixes,
                min_time_elapsed_since_last_modification: min_age,
            }),
            transfer_options: Some(TransferOptions {
                delete_objects_from_source_after_transfer: true,
            }),
        }
    }

    /// Latest job recorded for the scope, resolved against the service.
    /// A row whose job the service no longer has (or keeps disabled) is
    /// treated as absent.
    async fn find_live_job(
        &self,
        project_id: &str,
        bucket: &str,
        rule_type: RuleType,
    ) -> Result<Option<TransferJob>, TransferError> {
        let row = match self.jobs.find_latest_named_for_scope(bucket, rule_type).await {
            Ok(row) => row,
            Err(e) => {
                return Err(TransferError::Api {
                    status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                    message: format!("job lookup failed: {e}"),
                });
            }
        };
        let Some(name) = row.and_then(|r| r.name) else {
            return Ok(None);
        };

        match self.transfer.get_job(project_id, &name).await? {
            Some(job) if job.status == JobStatus::Enabled => Ok(Some(job)),
            Some(job) => {
                tracing::info!(bucket, job = name, status = ?job.status,
                    "recorded job is no longer enabled; will create a fresh one");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn submit_create(&self, job: TransferJob) -> Result<TransferJob, TransferError> {
        let api = Arc::clone(&self.transfer);
        self.throttle
            .submit(async move { api.create_job(&job).await })
            .wait()
            .await
    }

    async fn submit_patch(
        &self,
        name: String,
        request: UpdateJobRequest,
    ) -> Result<TransferJob, TransferError> {
        let api = Arc::clone(&self.transfer);
        self.throttle
            .submit(async move { api.patch_job(&name, &request).await })
            .wait()
            .await
    }
}

struct DatasetChunk<'a> {
    rules: Vec<&'a RetentionRule>,
    prefixes: Vec<String>,
}

/// Whether the live job's shape already matches the rule-derived shape.
/// Exclude lists compare order-insensitively; the service is free to
/// reorder them.
fn default_job_needs_patch(current: &TransferJob, excludes: &[String], min_age: &str) -> bool {
    let conditions = current.transfer_spec.object_conditions.clone().unwrap_or_default();

    let mut current_excludes = conditions.exclude_prefixes;
    current_excludes.sort();
    let mut wanted = excludes.to_vec();
    wanted.sort();

    current.status != JobStatus::Enabled
        || current_excludes != wanted
        || conditions.min_time_elapsed_since_last_modification.as_deref() != Some(min_age)
}

/// A daily job's include list is spent once a full recurrence has passed
/// without anyone touching the job: the service has executed it, so the
/// next batch replaces the list instead of appending.
fn include_list_consumed(last_modification: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_modification {
        Some(t) => now.signed_duration_since(t) >= Duration::hours(24),
        None => false,
    }
}

fn describe_rules(kind: &str, bucket: &str, rules: &[&RetentionRule]) -> String {
    let ids: Vec<String> = rules
        .iter()
        .map(|r| format!("{}:{}", r.id, r.version))
        .collect();
    format!("{kind} retention for {bucket} [{}]", ids.join(","))
}
