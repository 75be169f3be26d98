//! Lock-guarded batch cycles.
//!
//! Several engine replicas may run at once; each cycle takes a named
//! lease-row lock first and quietly stands down when a peer holds it.
//! The rule cycle turns active rules into transfer jobs, the delete
//! cycle drains the on-demand queue. Both release their lease at the
//! end and complain loudly when the lease turns out to have been
//! reclaimed mid-cycle.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};

use super::{
    prefix,
    reconciler::{DefaultAction, JobReconciler, ReconcileError},
};
use crate::{
    config::{DmBatchConfig, RuleBatchConfig},
    db::{JobRepo, Lease, LockRepo, QueueRepo, RuleRepo, StatusUpdate},
    models::{DmRequest, DmStatus, RetentionRule, RuleType},
};

const RULE_BATCH_LOCK: &str = "rule-batch";
const DM_BATCH_LOCK: &str = "dm-batch";

/// Tally of one rule cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RuleCycleResult {
    pub dataset_jobs: usize,
    pub defaults_created: usize,
    pub defaults_patched: usize,
    pub defaults_unchanged: usize,
    pub defaults_failed: usize,
}

/// Tally of one delete-queue cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DmCycleResult {
    pub batches: usize,
    pub requests_scheduled: usize,
    /// Requests whose storage name has no dataset path. They can never
    /// be satisfied, so they fail outright instead of being reloaded
    /// every cycle.
    pub requests_rejected: usize,
    pub purged: u64,
}

pub struct BatchRunner {
    locks: Arc<dyn LockRepo>,
    rules: Arc<dyn RuleRepo>,
    jobs: Arc<dyn JobRepo>,
    queue: Arc<dyn QueueRepo>,
    reconciler: Arc<JobReconciler>,
    rule_config: RuleBatchConfig,
    dm_config: DmBatchConfig,
}

impl BatchRunner {
    pub fn new(
        locks: Arc<dyn LockRepo>,
        rules: Arc<dyn RuleRepo>,
        jobs: Arc<dyn JobRepo>,
        queue: Arc<dyn QueueRepo>,
        reconciler: Arc<JobReconciler>,
        rule_config: RuleBatchConfig,
        dm_config: DmBatchConfig,
    ) -> Self {
        Self {
            locks,
            rules,
            jobs,
            queue,
            reconciler,
            rule_config,
            dm_config,
        }
    }

    /// Run one rule cycle. `Ok(None)` means a peer holds the lock and
    /// this replica did nothing.
    pub async fn run_rule_cycle(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<RuleCycleResult>, ReconcileError> {
        let lease = Duration::from_secs(self.rule_config.lock_lease_secs);
        let Some(lease) = self.locks.try_acquire(RULE_BATCH_LOCK, lease).await? else {
            tracing::debug!(lock = RULE_BATCH_LOCK, "cycle held by a peer; skipping");
            return Ok(None);
        };

        let outcome = self.rule_cycle_locked(now).await;
        self.release(&lease).await;
        outcome.map(Some)
    }

    /// Run one delete-queue cycle. `Ok(None)` means a peer holds the
    /// lock.
    pub async fn run_dm_cycle(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<DmCycleResult>, ReconcileError> {
        let lease = Duration::from_secs(self.dm_config.lock_lease_secs);
        let Some(lease) = self.locks.try_acquire(DM_BATCH_LOCK, lease).await? else {
            tracing::debug!(lock = DM_BATCH_LOCK, "cycle held by a peer; skipping");
            return Ok(None);
        };

        let outcome = self.dm_cycle_locked(now).await;
        self.release(&lease).await;
        outcome.map(Some)
    }

    async fn rule_cycle_locked(&self, now: DateTime<Utc>) -> Result<RuleCycleResult, ReconcileError> {
        let mut result = RuleCycleResult::default();

        let dataset_groups =
            group_by_bucket(self.rules.find_active_by_type(RuleType::Dataset).await?);
        for ((project_id, bucket), rules) in &dataset_groups {
            let rows = self
                .reconciler
                .reconcile_dataset_rules(project_id, bucket, rules, now)
                .await?;
            for row in rows {
                self.jobs.create(row).await?;
                result.dataset_jobs += 1;
            }
        }

        let default_groups =
            group_by_bucket(self.rules.find_active_by_type(RuleType::Default).await?);
        for ((project_id, bucket), rules) in &default_groups {
            // The active-scope constraint allows one default rule per bucket.
            let Some(rule) = rules.first() else {
                continue;
            };
            let siblings = dataset_groups
                .get(&(project_id.clone(), bucket.clone()))
                .map(Vec::as_slice)
                .unwrap_or_default();
            self.apply_bucket_rule(project_id, bucket, rule, siblings, now, &mut result)
                .await?;
        }

        // The global catch-all covers buckets that have dataset rules
        // but no default of their own.
        let global_rules = self.rules.find_active_by_type(RuleType::Global).await?;
        if let Some(global) = global_rules.first() {
            for ((project_id, bucket), siblings) in &dataset_groups {
                if default_groups.contains_key(&(project_id.clone(), bucket.clone())) {
                    continue;
                }
                self.apply_bucket_rule(project_id, bucket, global, siblings, now, &mut result)
                    .await?;
            }
        }

        Ok(result)
    }

    async fn apply_bucket_rule(
        &self,
        project_id: &str,
        bucket: &str,
        rule: &RetentionRule,
        siblings: &[RetentionRule],
        now: DateTime<Utc>,
        result: &mut RuleCycleResult,
    ) -> Result<(), ReconcileError> {
        let outcome = self
            .reconciler
            .reconcile_default_rule(project_id, bucket, rule, siblings, now)
            .await?;

        match outcome.action {
            DefaultAction::Created => result.defaults_created += 1,
            DefaultAction::Patched => result.defaults_patched += 1,
            DefaultAction::Unchanged => result.defaults_unchanged += 1,
            DefaultAction::Failed => result.defaults_failed += 1,
        }
        // An unchanged job produced no service call; writing a row for it
        // every cycle would bury the history under no-ops.
        if outcome.action != DefaultAction::Unchanged {
            self.jobs.create(outcome.job).await?;
        }
        Ok(())
    }

    async fn dm_cycle_locked(&self, now: DateTime<Utc>) -> Result<DmCycleResult, ReconcileError> {
        let mut result = DmCycleResult::default();

        let (requests, malformed): (Vec<_>, Vec<_>) = self
            .queue
            .find_ready()
            .await?
            .into_iter()
            .partition(|r| prefix::delete_prefix(&r.data_storage_name).is_some());
        if !malformed.is_empty() {
            let rejections: Vec<StatusUpdate> = malformed
                .iter()
                .map(|request| {
                    tracing::warn!(
                        request_id = request.id,
                        name = %request.data_storage_name,
                        "delete request without a dataset path; failing it"
                    );
                    StatusUpdate {
                        request_id: request.id,
                        status: DmStatus::Fail,
                        number_of_retry: request.number_of_retry,
                    }
                })
                .collect();
            result.requests_rejected = self.queue.update_statuses(&rejections).await?;
        }

        for ((project_id, bucket), requests) in group_requests(requests) {
            let Some(plan) = self
                .reconciler
                .reconcile_dm_batch(&project_id, &bucket, &requests, now)
                .await?
            else {
                continue;
            };

            let scheduled = plan.updates.len();
            let job = self.queue.schedule_batch(plan.job, &plan.updates).await?;
            tracing::info!(
                bucket,
                job = job.name.as_deref().unwrap_or("<unnamed>"),
                requests = scheduled,
                "delete batch scheduled"
            );
            result.batches += 1;
            result.requests_scheduled += scheduled;
        }

        if self.dm_config.purge_after_days > 0 {
            let cutoff = now - chrono::Duration::days(i64::from(self.dm_config.purge_after_days));
            result.purged = self.queue.delete_terminal_older_than(cutoff).await?;
        }

        Ok(result)
    }

    async fn release(&self, lease: &Lease) {
        match self.locks.release(lease).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::error!(
                    lock = %lease.lock_id,
                    "lease was reclaimed mid-cycle; this cycle may have raced a peer"
                );
            }
            Err(e) => {
                tracing::error!(lock = %lease.lock_id, error = %e, "lock release failed");
            }
        }
    }
}

/// Group rules per (project, bucket). Ordered so cycles walk buckets in
/// a stable order.
fn group_by_bucket(rules: Vec<RetentionRule>) -> BTreeMap<(String, String), Vec<RetentionRule>> {
    let mut groups: BTreeMap<(String, String), Vec<RetentionRule>> = BTreeMap::new();
    for rule in rules {
        let bucket = prefix::bucket_name(&rule.data_storage_name).to_string();
        groups
            .entry((rule.project_id.clone(), bucket))
            .or_default()
            .push(rule);
    }
    groups
}

/// Group queued requests per (project, bucket) while keeping the queue
/// order inside each group intact.
fn group_requests(requests: Vec<DmRequest>) -> Vec<((String, String), Vec<DmRequest>)> {
    let mut groups: Vec<((String, String), Vec<DmRequest>)> = Vec::new();
    for request in requests {
        let key = (
            request.project_id.clone(),
            request.data_storage_root.clone(),
        );
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, group)) => group.push(request),
            None => groups.push((key, vec![request])),
        }
    }
    groups
}

/// Periodic driver for the rule cycle. Runs until the task is aborted.
pub async fn rule_batch_worker(runner: Arc<BatchRunner>) {
    if !runner.rule_config.enabled {
        tracing::info!("rule batch cycle disabled");
        return;
    }
    let interval = Duration::from_secs(runner.rule_config.interval_secs);
    tracing::info!(interval_secs = interval.as_secs(), "rule batch worker started");

    loop {
        match runner.run_rule_cycle(Utc::now()).await {
            Ok(Some(result)) => {
                tracing::info!(
                    dataset_jobs = result.dataset_jobs,
                    created = result.defaults_created,
                    patched = result.defaults_patched,
                    unchanged = result.defaults_unchanged,
                    failed = result.defaults_failed,
                    "rule cycle finished"
                );
            }
            Ok(None) => {}
            Err(e) => tracing::error!(error = %e, "rule cycle failed"),
        }
        tokio::time::sleep(interval).await;
    }
}

/// Periodic driver for the delete-queue cycle.
pub async fn dm_batch_worker(runner: Arc<BatchRunner>) {
    if !runner.dm_config.enabled {
        tracing::info!("delete batch cycle disabled");
        return;
    }
    let interval = Duration::from_secs(runner.dm_config.interval_secs);
    tracing::info!(interval_secs = interval.as_secs(), "delete batch worker started");

    loop {
        match runner.run_dm_cycle(Utc::now()).await {
            Ok(Some(result)) => {
                if result.batches > 0 || result.requests_rejected > 0 || result.purged > 0 {
                    tracing::info!(
                        batches = result.batches,
                        requests = result.requests_scheduled,
                        rejected = result.requests_rejected,
                        purged = result.purged,
                        "delete cycle finished"
                    );
                }
            }
            Ok(None) => {}
            Err(e) => tracing::error!(error = %e, "delete cycle failed"),
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use chrono::TimeZone;
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::{ThrottleConfig, TransferConfig},
        db::{DbResult, ScheduleUpdate, StatusUpdate},
        models::{CreateRetentionJob, DmStatus, RetentionJob},
        notify::LogNotifier,
        throttle::QuotaThrottle,
        transfer::{
            Operation, TransferApi, TransferError, TransferJob, UpdateJobRequest,
        },
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 6, 0, 0).unwrap()
    }

    struct FakeLocks {
        available: AtomicBool,
        releases: AtomicUsize,
    }

    impl FakeLocks {
        fn new(available: bool) -> Self {
            Self {
                available: AtomicBool::new(available),
                releases: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LockRepo for FakeLocks {
        async fn try_acquire(
            &self,
            lock_id: &str,
            _lease_duration: Duration,
        ) -> DbResult<Option<Lease>> {
            if !self.available.load(Ordering::SeqCst) {
                return Ok(None);
            }
            Ok(Some(Lease {
                lock_id: lock_id.to_string(),
                token: Uuid::new_v4().to_string(),
                acquired_at: now(),
            }))
        }

        async fn release(&self, _lease: &Lease) -> DbResult<bool> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    #[derive(Default)]
    struct FakeRules {
        dataset: Vec<RetentionRule>,
        default_: Vec<RetentionRule>,
        global: Vec<RetentionRule>,
    }

    #[async_trait]
    impl RuleRepo for FakeRules {
        async fn find_active_by_type(&self, rule_type: RuleType) -> DbResult<Vec<RetentionRule>> {
            Ok(match rule_type {
                RuleType::Dataset => self.dataset.clone(),
                RuleType::Default => self.default_.clone(),
                RuleType::Global => self.global.clone(),
                RuleType::User => vec![],
            })
        }
    }

    #[derive(Default)]
    struct FakeJobs {
        created: Mutex<Vec<CreateRetentionJob>>,
    }

    fn persisted(input: &CreateRetentionJob, id: i32) -> RetentionJob {
        RetentionJob {
            id,
            name: input.name.clone(),
            project_id: input.project_id.clone(),
            data_storage_name: input.data_storage_name.clone(),
            data_storage_root: input.data_storage_root.clone(),
            rule_type: input.rule_type,
            rule_version: input.rule_version,
            batch_id: input.batch_id.clone(),
            metadata: input.metadata.clone(),
            created_at: now(),
            updated_at: now(),
        }
    }

    #[async_trait]
    impl JobRepo for FakeJobs {
        async fn create(&self, input: CreateRetentionJob) -> DbResult<RetentionJob> {
            let mut created = self.created.lock().unwrap();
            let row = persisted(&input, created.len() as i32 + 1);
            created.push(input);
            Ok(row)
        }

        async fn find_latest_named_for_scope(
            &self,
            _root: &str,
            _rule_type: RuleType,
        ) -> DbResult<Option<RetentionJob>> {
            Ok(None)
        }

        async fn find_needing_validation(
            &self,
            _after: chrono::Duration,
        ) -> DbResult<Vec<RetentionJob>> {
            unreachable!()
        }
    }

    #[derive(Default)]
    struct FakeQueue {
        ready: Vec<DmRequest>,
        scheduled: Mutex<Vec<(CreateRetentionJob, Vec<ScheduleUpdate>)>>,
        status_updates: Mutex<Vec<StatusUpdate>>,
        purge_cutoffs: Mutex<Vec<DateTime<Utc>>>,
    }

    #[async_trait]
    impl QueueRepo for FakeQueue {
        async fn find_ready(&self) -> DbResult<Vec<DmRequest>> {
            Ok(self.ready.clone())
        }
        async fn find_scheduled_for_job(&self, _retention_job_id: i32) -> DbResult<Vec<DmRequest>> {
            unreachable!()
        }
        async fn schedule_batch(
            &self,
            job: CreateRetentionJob,
            updates: &[ScheduleUpdate],
        ) -> DbResult<RetentionJob> {
            let row = persisted(&job, 1);
            self.scheduled.lock().unwrap().push((job, updates.to_vec()));
            Ok(row)
        }
        async fn update_statuses(&self, updates: &[StatusUpdate]) -> DbResult<usize> {
            self.status_updates
                .lock()
                .unwrap()
                .extend(updates.iter().cloned());
            Ok(updates.len())
        }
        async fn delete_terminal_older_than(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
            self.purge_cutoffs.lock().unwrap().push(cutoff);
            Ok(3)
        }
    }

    struct FakeTransfer {
        counter: AtomicUsize,
    }

    #[async_trait]
    impl TransferApi for FakeTransfer {
        async fn create_job(&self, job: &TransferJob) -> Result<TransferJob, TransferError> {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            let mut created = job.clone();
            created.name = Some(format!("transferJobs/{n}"));
            Ok(created)
        }
        async fn patch_job(
            &self,
            _name: &str,
            _request: &UpdateJobRequest,
        ) -> Result<TransferJob, TransferError> {
            unreachable!()
        }
        async fn get_job(
            &self,
            _project_id: &str,
            _name: &str,
        ) -> Result<Option<TransferJob>, TransferError> {
            unreachable!()
        }
        async fn list_operations(
            &self,
            _project_id: &str,
            _job_names: &[String],
        ) -> Result<Vec<Operation>, TransferError> {
            unreachable!()
        }
    }

    fn rule(id: i32, rule_type: RuleType, project: &str, name: &str, days: i32) -> RetentionRule {
        RetentionRule {
            id,
            rule_type,
            project_id: project.to_string(),
            data_storage_name: name.to_string(),
            retention_days: days,
            version: 1,
            is_active: true,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn request(id: i32, project: &str, root: &str, dataset: &str) -> DmRequest {
        DmRequest {
            id,
            project_id: project.to_string(),
            data_storage_root: root.to_string(),
            data_storage_name: format!("{root}/{dataset}"),
            status: DmStatus::Pending,
            priority: 0,
            number_of_retry: 0,
            retention_job_id: None,
            created_at: now(),
            updated_at: now(),
        }
    }

    struct Fixture {
        locks: Arc<FakeLocks>,
        jobs: Arc<FakeJobs>,
        queue: Arc<FakeQueue>,
        runner: BatchRunner,
    }

    fn fixture(rules: FakeRules, queue: FakeQueue, lock_available: bool) -> Fixture {
        let locks = Arc::new(FakeLocks::new(lock_available));
        let jobs = Arc::new(FakeJobs::default());
        let queue = Arc::new(queue);
        let throttle = Arc::new(QuotaThrottle::new(&ThrottleConfig {
            limit: 100,
            interval_ms: 1,
            ..ThrottleConfig::default()
        }));
        let reconciler = Arc::new(JobReconciler::new(
            Arc::new(FakeTransfer {
                counter: AtomicUsize::new(0),
            }),
            throttle,
            Arc::clone(&jobs) as Arc<dyn JobRepo>,
            Arc::new(LogNotifier),
            TransferConfig {
                lookback_days: 3,
                ..TransferConfig::default()
            },
        ));

        let runner = BatchRunner::new(
            Arc::clone(&locks) as Arc<dyn LockRepo>,
            Arc::new(rules),
            Arc::clone(&jobs) as Arc<dyn JobRepo>,
            Arc::clone(&queue) as Arc<dyn QueueRepo>,
            reconciler,
            RuleBatchConfig::default(),
            DmBatchConfig::default(),
        );

        Fixture {
            locks,
            jobs,
            queue,
            runner,
        }
    }

    #[tokio::test]
    async fn test_cycles_stand_down_when_lock_is_held() {
        let f = fixture(FakeRules::default(), FakeQueue::default(), false);
        assert!(f.runner.run_rule_cycle(now()).await.unwrap().is_none());
        assert!(f.runner.run_dm_cycle(now()).await.unwrap().is_none());
        assert_eq!(f.locks.releases.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rule_cycle_persists_jobs_and_releases_lock() {
        let rules = FakeRules {
            dataset: vec![rule(1, RuleType::Dataset, "proj", "bkt/logs", 1)],
            default_: vec![rule(2, RuleType::Default, "proj", "bkt", 7)],
            ..FakeRules::default()
        };
        let f = fixture(rules, FakeQueue::default(), true);

        let result = f.runner.run_rule_cycle(now()).await.unwrap().unwrap();
        assert_eq!(result.dataset_jobs, 1);
        assert_eq!(result.defaults_created, 1);
        assert_eq!(f.locks.releases.load(Ordering::SeqCst), 1);

        let created = f.jobs.created.lock().unwrap();
        assert_eq!(created.len(), 2);
        let dataset_row = created
            .iter()
            .find(|j| j.rule_type == RuleType::Dataset)
            .unwrap();
        assert!(dataset_row.name.is_some());
        assert_eq!(dataset_row.data_storage_root, "bkt");
        let default_row = created
            .iter()
            .find(|j| j.rule_type == RuleType::Default)
            .unwrap();
        assert!(default_row.name.is_some());
    }

    #[tokio::test]
    async fn test_global_rule_covers_buckets_without_default() {
        let rules = FakeRules {
            dataset: vec![
                rule(1, RuleType::Dataset, "proj", "covered/logs", 1),
                rule(2, RuleType::Dataset, "proj", "orphan/logs", 1),
            ],
            default_: vec![rule(3, RuleType::Default, "proj", "covered", 7)],
            global: vec![rule(4, RuleType::Global, "proj", "org", 30)],
        };
        let f = fixture(rules, FakeQueue::default(), true);

        let result = f.runner.run_rule_cycle(now()).await.unwrap().unwrap();
        assert_eq!(result.defaults_created, 2);

        let created = f.jobs.created.lock().unwrap();
        let global_rows: Vec<_> = created
            .iter()
            .filter(|j| j.rule_type == RuleType::Global)
            .collect();
        assert_eq!(global_rows.len(), 1);
        assert_eq!(global_rows[0].data_storage_root, "orphan");
        assert!(
            created
                .iter()
                .any(|j| j.rule_type == RuleType::Default && j.data_storage_root == "covered")
        );
    }

    #[tokio::test]
    async fn test_dm_cycle_schedules_per_bucket_and_purges() {
        let queue = FakeQueue {
            ready: vec![
                request(1, "proj", "bkt-a", "alpha"),
                request(2, "proj", "bkt-b", "beta"),
                request(3, "proj", "bkt-a", "gamma"),
            ],
            ..FakeQueue::default()
        };
        let f = fixture(FakeRules::default(), queue, true);

        let result = f.runner.run_dm_cycle(now()).await.unwrap().unwrap();
        assert_eq!(result.batches, 2);
        assert_eq!(result.requests_scheduled, 3);
        assert_eq!(result.purged, 3);

        let scheduled = f.queue.scheduled.lock().unwrap();
        let (job_a, updates_a) = scheduled
            .iter()
            .find(|(job, _)| job.data_storage_root == "bkt-a")
            .unwrap();
        assert_eq!(job_a.rule_type, RuleType::User);
        assert_eq!(updates_a.len(), 2);

        let cutoffs = f.queue.purge_cutoffs.lock().unwrap();
        assert_eq!(cutoffs[0], now() - chrono::Duration::days(7));
    }

    #[tokio::test]
    async fn test_dm_cycle_fails_requests_without_dataset_path() {
        let mut bucket_only = request(7, "proj", "bkt-a", "unused");
        bucket_only.data_storage_name = "bkt-a".to_string();
        bucket_only.number_of_retry = 2;

        let queue = FakeQueue {
            ready: vec![bucket_only, request(8, "proj", "bkt-a", "alpha")],
            ..FakeQueue::default()
        };
        let f = fixture(FakeRules::default(), queue, true);

        let result = f.runner.run_dm_cycle(now()).await.unwrap().unwrap();
        assert_eq!(result.requests_rejected, 1);
        assert_eq!(result.requests_scheduled, 1);

        // The unsatisfiable request is failed for good, not left to be
        // reloaded every cycle.
        let updates = f.queue.status_updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].request_id, 7);
        assert_eq!(updates[0].status, DmStatus::Fail);
        assert_eq!(updates[0].number_of_retry, 2);

        let scheduled = f.queue.scheduled.lock().unwrap();
        assert_eq!(scheduled[0].1.len(), 1);
        assert_eq!(scheduled[0].1[0].request_id, 8);
    }

    #[tokio::test]
    async fn test_dm_cycle_skips_purge_when_disabled() {
        let f = fixture(FakeRules::default(), FakeQueue::default(), true);
        let runner = BatchRunner {
            dm_config: DmBatchConfig {
                purge_after_days: 0,
                ..DmBatchConfig::default()
            },
            ..f.runner
        };

        let result = runner.run_dm_cycle(now()).await.unwrap().unwrap();
        assert_eq!(result.purged, 0);
        assert!(f.queue.purge_cutoffs.lock().unwrap().is_empty());
    }
}
