use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::error::DbResult;

/// Proof of lock ownership. Only the holder of the matching token can
/// release the row; a stale holder whose lease was reclaimed cannot
/// release the lock out from under the new owner.
#[derive(Debug, Clone)]
pub struct Lease {
    pub lock_id: String,
    pub token: String,
    pub acquired_at: DateTime<Utc>,
}

/// Cross-process mutex backed by lease rows.
///
/// A lock is held by inserting a row and released by deleting it. Crashed
/// holders never release, so acquisition treats a row older than its lease
/// duration as abandoned and reclaims it.
#[async_trait]
pub trait LockRepo: Send + Sync {
    /// Try to take the lock. Returns `None` when another live holder has it.
    async fn try_acquire(&self, lock_id: &str, lease_duration: Duration)
    -> DbResult<Option<Lease>>;

    /// Release a held lock. Returns false if the lease had already been
    /// reclaimed, in which case the work done under it may have raced a
    /// peer and the caller should say so loudly.
    async fn release(&self, lease: &Lease) -> DbResult<bool>;
}

/// Whether a lease row is old enough to be reclaimed.
pub fn lease_expired(now: DateTime<Utc>, acquired_at: DateTime<Utc>, lease_duration: Duration) -> bool {
    let age = now.signed_duration_since(acquired_at);
    age >= chrono::Duration::from_std(lease_duration).unwrap_or(chrono::Duration::MAX)
}
