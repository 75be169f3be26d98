//! Shared tests for LockRepo implementations.
//!
//! Tests are written as async functions taking `&dyn LockRepo`, wrapped
//! by the PostgreSQL test module below.

use std::{sync::Arc, time::Duration};

use crate::db::repos::LockRepo;

const LOCK: &str = "rule-batch";

pub async fn test_acquire_is_exclusive(repo: &dyn LockRepo) {
    let lease = repo
        .try_acquire(LOCK, Duration::from_secs(60))
        .await
        .expect("Failed to acquire lock");
    assert!(lease.is_some());

    let contender = repo
        .try_acquire(LOCK, Duration::from_secs(60))
        .await
        .expect("Failed to contend for lock");
    assert!(contender.is_none());
}

pub async fn test_independent_locks_do_not_contend(repo: &dyn LockRepo) {
    let rule = repo
        .try_acquire("rule-batch", Duration::from_secs(60))
        .await
        .expect("Failed to acquire rule lock");
    let dm = repo
        .try_acquire("dm-batch", Duration::from_secs(60))
        .await
        .expect("Failed to acquire dm lock");

    assert!(rule.is_some());
    assert!(dm.is_some());
}

pub async fn test_release_allows_reacquire(repo: &dyn LockRepo) {
    let first = repo
        .try_acquire(LOCK, Duration::from_secs(60))
        .await
        .expect("Failed to acquire lock")
        .expect("Lock should be free");

    assert!(repo.release(&first).await.expect("Failed to release"));

    let second = repo
        .try_acquire(LOCK, Duration::from_secs(60))
        .await
        .expect("Failed to reacquire lock")
        .expect("Released lock should be free");
    assert_ne!(first.token, second.token);
}

pub async fn test_release_is_idempotent_only_for_the_holder(repo: &dyn LockRepo) {
    let lease = repo
        .try_acquire(LOCK, Duration::from_secs(60))
        .await
        .expect("Failed to acquire lock")
        .expect("Lock should be free");

    assert!(repo.release(&lease).await.expect("Failed to release"));
    // The row is gone; a second release with the same token finds nothing.
    assert!(!repo.release(&lease).await.expect("Failed to re-release"));
}

pub async fn test_expired_lease_is_reclaimed_and_old_token_invalidated(repo: &dyn LockRepo) {
    // A zero-duration lease is expired the moment it is taken.
    let stale = repo
        .try_acquire(LOCK, Duration::from_secs(0))
        .await
        .expect("Failed to acquire lock")
        .expect("Lock should be free");

    let fresh = repo
        .try_acquire(LOCK, Duration::from_secs(60))
        .await
        .expect("Failed to reclaim lock")
        .expect("Expired lease should be reclaimable");
    assert_ne!(stale.token, fresh.token);

    // The overrun holder cannot release the lock out from under the new
    // owner.
    assert!(!repo.release(&stale).await.expect("Failed to release stale"));
    assert!(repo.release(&fresh).await.expect("Failed to release fresh"));
}

pub async fn test_concurrent_contenders_yield_one_winner(repo: Arc<dyn LockRepo>) {
    let mut attempts = Vec::new();
    for _ in 0..8 {
        let repo = Arc::clone(&repo);
        attempts.push(tokio::spawn(async move {
            repo.try_acquire(LOCK, Duration::from_secs(60)).await
        }));
    }

    let mut winners = 0;
    for attempt in attempts {
        let lease = attempt
            .await
            .expect("Contender panicked")
            .expect("Contention must not surface as an error");
        if lease.is_some() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

// ============================================================================
// PostgreSQL Tests - Require Docker, run with `cargo test -- --ignored`
// ============================================================================

mod postgres_tests {
    use std::sync::Arc;

    use crate::db::{
        postgres::PostgresLockRepo,
        tests::harness::{create_isolated_postgres_pool, run_postgres_migrations},
    };

    macro_rules! postgres_test {
        ($name:ident) => {
            #[tokio::test]
            #[ignore = "Requires Docker - run with `cargo test -- --ignored`"]
            async fn $name() {
                let pool = create_isolated_postgres_pool().await;
                run_postgres_migrations(&pool).await;
                let repo = PostgresLockRepo::new(pool);
                super::$name(&repo).await;
            }
        };
    }

    postgres_test!(test_acquire_is_exclusive);
    postgres_test!(test_independent_locks_do_not_contend);
    postgres_test!(test_release_allows_reacquire);
    postgres_test!(test_release_is_idempotent_only_for_the_holder);
    postgres_test!(test_expired_lease_is_reclaimed_and_old_token_invalidated);

    #[tokio::test]
    #[ignore = "Requires Docker - run with `cargo test -- --ignored`"]
    async fn test_concurrent_contenders_yield_one_winner() {
        let pool = create_isolated_postgres_pool().await;
        run_postgres_migrations(&pool).await;
        let repo = Arc::new(PostgresLockRepo::new(pool));
        super::test_concurrent_contenders_yield_one_winner(repo).await;
    }
}
