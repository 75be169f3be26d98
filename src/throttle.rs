//! Rate-limited submission queue for transfer service mutations.
//!
//! The service admits only a handful of job mutations per interval, while
//! a batch cycle can want hundreds at once. Callers enqueue their call as
//! a future and await the handle; a ticker releases up to `limit` queued
//! submissions per tick into a bounded set of runners. The settings are
//! re-read every tick, so an operator can loosen the quota on a live
//! process.

use std::{
    collections::VecDeque,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::sync::{RwLock, Semaphore, oneshot};

use crate::{config::ThrottleConfig, transfer::{TransferError, TransferJob}};

type SubmissionFuture = Pin<Box<dyn Future<Output = Result<TransferJob, TransferError>> + Send>>;

struct Submission {
    op: SubmissionFuture,
    done: oneshot::Sender<Result<TransferJob, TransferError>>,
}

/// Live-tunable rate settings.
#[derive(Debug, Clone, Copy)]
pub struct ThrottleSettings {
    /// Submissions released per tick.
    pub limit: usize,
    /// Tick interval.
    pub interval: Duration,
}

impl From<&ThrottleConfig> for ThrottleSettings {
    fn from(config: &ThrottleConfig) -> Self {
        ThrottleSettings {
            limit: config.limit,
            interval: config.interval(),
        }
    }
}

/// Completion handle for one queued submission.
pub struct SubmitHandle {
    rx: oneshot::Receiver<Result<TransferJob, TransferError>>,
}

impl SubmitHandle {
    /// Wait for the submission to be released and executed. A submission
    /// dropped without running (throttle shut down, or its runner
    /// panicked) resolves to `TransferError::Cancelled`.
    pub async fn wait(self) -> Result<TransferJob, TransferError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(TransferError::Cancelled),
        }
    }
}

/// The submission queue.
pub struct QuotaThrottle {
    queue: Arc<Mutex<VecDeque<Submission>>>,
    settings: Arc<RwLock<ThrottleSettings>>,
    ticker: tokio::task::JoinHandle<()>,
}

impl QuotaThrottle {
    pub fn new(config: &ThrottleConfig) -> Self {
        let queue: Arc<Mutex<VecDeque<Submission>>> = Arc::new(Mutex::new(VecDeque::new()));
        let settings = Arc::new(RwLock::new(ThrottleSettings::from(config)));
        let runners = Arc::new(Semaphore::new(config.worker_pool));

        let ticker = tokio::spawn(Self::run_ticker(
            Arc::clone(&queue),
            Arc::clone(&settings),
            runners,
        ));

        QuotaThrottle {
            queue,
            settings,
            ticker,
        }
    }

    /// Handle for adjusting the rate at runtime.
    pub fn settings(&self) -> Arc<RwLock<ThrottleSettings>> {
        Arc::clone(&self.settings)
    }

    /// Number of submissions waiting for a tick.
    pub fn queued(&self) -> usize {
        self.queue.lock().expect("throttle queue poisoned").len()
    }

    /// Enqueue a submission. The future does not start executing until
    /// the ticker releases it.
    pub fn submit(
        &self,
        op: impl Future<Output = Result<TransferJob, TransferError>> + Send + 'static,
    ) -> SubmitHandle {
        let (done, rx) = oneshot::channel();
        self.queue
            .lock()
            .expect("throttle queue poisoned")
            .push_back(Submission {
                op: Box::pin(op),
                done,
            });
        SubmitHandle { rx }
    }

    async fn run_ticker(
        queue: Arc<Mutex<VecDeque<Submission>>>,
        settings: Arc<RwLock<ThrottleSettings>>,
        runners: Arc<Semaphore>,
    ) {
        loop {
            let ThrottleSettings { limit, interval } = *settings.read().await;
            tokio::time::sleep(interval).await;

            for submission in drain_batch(&queue, limit) {
                let runners = Arc::clone(&runners);
                tokio::spawn(async move {
                    // Closed semaphore only happens at shutdown.
                    let Ok(_permit) = runners.acquire_owned().await else {
                        return;
                    };
                    let result = submission.op.await;
                    let _ = submission.done.send(result);
                });
            }
        }
    }
}

impl Drop for QuotaThrottle {
    fn drop(&mut self) {
        // Queued-but-unreleased submissions resolve to Cancelled through
        // their dropped senders.
        self.ticker.abort();
    }
}

fn drain_batch(queue: &Mutex<VecDeque<Submission>>, limit: usize) -> Vec<Submission> {
    let mut queue = queue.lock().expect("throttle queue poisoned");
    let take = queue.len().min(limit);
    queue.drain(..take).collect()
}
