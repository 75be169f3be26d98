//! The retention engine proper: prefix arithmetic, rule and queue
//! reconciliation, lock-guarded batch cycles, and operation status
//! validation.

pub mod batch;
pub mod prefix;
pub mod reconciler;
pub mod validation;

pub use batch::{BatchRunner, DmCycleResult, RuleCycleResult, dm_batch_worker, rule_batch_worker};
pub use reconciler::{
    DefaultAction, DefaultOutcome, DmBatchPlan, JobReconciler, ReconcileError,
};
pub use validation::{
    ValidationError, ValidationReconciler, ValidationRunResult, validation_worker,
};
