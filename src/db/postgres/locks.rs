use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::db::{
    error::DbResult,
    repos::{Lease, LockRepo, lease_expired},
};

pub struct PostgresLockRepo {
    pool: PgPool,
}

impl PostgresLockRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LockRepo for PostgresLockRepo {
    async fn try_acquire(
        &self,
        lock_id: &str,
        lease_duration: Duration,
    ) -> DbResult<Option<Lease>> {
        let mut tx = self.pool.begin().await?;

        // Row-lock the lease while deciding, so two contenders cannot both
        // observe it expired and reclaim it.
        let row = sqlx::query(
            r#"
            SELECT token, lease_duration_seconds, created_at
            FROM distributed_lock
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(lock_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = row {
            let acquired_at: DateTime<Utc> = row.get("created_at");
            let held_for = Duration::from_secs(row.get::<i64, _>("lease_duration_seconds") as u64);

            if !lease_expired(Utc::now(), acquired_at, held_for) {
                tx.rollback().await?;
                return Ok(None);
            }

            tracing::warn!(
                lock_id,
                held_since = %acquired_at,
                "reclaiming expired lock lease; previous holder overran or crashed"
            );
            sqlx::query("DELETE FROM distributed_lock WHERE id = $1")
                .bind(lock_id)
                .execute(&mut *tx)
                .await?;
        }

        let token = Uuid::new_v4().to_string();
        let acquired_at = Utc::now();
        let inserted = sqlx::query(
            r#"
            INSERT INTO distributed_lock (id, token, lease_duration_seconds, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(lock_id)
        .bind(&token)
        .bind(lease_duration.as_secs() as i64)
        .bind(acquired_at)
        .execute(&mut *tx)
        .await;

        // When the row is absent, FOR UPDATE locks nothing and two
        // contenders can both reach the insert. The loser hits the
        // primary key and has simply lost the race.
        if let Err(e) = inserted {
            if e.as_database_error().is_some_and(|d| d.is_unique_violation()) {
                tx.rollback().await?;
                return Ok(None);
            }
            return Err(e.into());
        }

        tx.commit().await?;
        Ok(Some(Lease {
            lock_id: lock_id.to_string(),
            token,
            acquired_at,
        }))
    }

    async fn release(&self, lease: &Lease) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM distributed_lock
            WHERE id = $1 AND token = $2
            "#,
        )
        .bind(&lease.lock_id)
        .bind(&lease.token)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
