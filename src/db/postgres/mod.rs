mod jobs;
mod locks;
mod queue;
mod rules;
mod validations;

pub use jobs::PostgresJobRepo;
pub use locks::PostgresLockRepo;
pub use queue::PostgresQueueRepo;
pub use rules::PostgresRuleRepo;
pub use validations::PostgresValidationRepo;
