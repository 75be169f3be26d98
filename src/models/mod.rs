mod dm_request;
mod job;
mod rule;
mod validation;

pub use dm_request::{DmRequest, DmStatus};
pub use job::{CreateRetentionJob, RetentionJob};
pub use rule::{RetentionRule, RuleType};
pub use validation::{JobValidation, UpsertValidation, ValidationStatus};
