mod jobs;
mod locks;
mod queue;
mod rules;
mod validations;

pub use jobs::JobRepo;
pub use locks::{Lease, LockRepo, lease_expired};
pub use queue::{QueueRepo, ScheduleUpdate, StatusUpdate};
pub use rules::RuleRepo;
pub use validations::ValidationRepo;
