use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};

use super::jobs::{JOB_COLUMNS, job_from_row};
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::{QueueRepo, ScheduleUpdate, StatusUpdate},
    },
    models::{CreateRetentionJob, DmRequest, RetentionJob},
};

pub struct PostgresQueueRepo {
    pool: PgPool,
}

impl PostgresQueueRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn request_from_row(row: &PgRow) -> DbResult<DmRequest> {
    Ok(DmRequest {
        id: row.get("id"),
        project_id: row.get("project_id"),
        data_storage_root: row.get("data_storage_root"),
        data_storage_name: row.get("data_storage_name"),
        status: row
            .get::<String, _>("status")
            .parse()
            .map_err(DbError::Internal)?,
        priority: row.get("priority"),
        number_of_retry: row.get("number_of_retry"),
        retention_job_id: row.get("retention_job_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

const REQUEST_COLUMNS: &str = "id, project_id, data_storage_root, data_storage_name, \
     status, priority, number_of_retry, retention_job_id, created_at, updated_at";

#[async_trait]
impl QueueRepo for PostgresQueueRepo {
    async fn find_ready(&self) -> DbResult<Vec<DmRequest>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {REQUEST_COLUMNS}
            FROM dm_request
            WHERE status IN ('pending', 'retry')
            ORDER BY priority DESC, number_of_retry DESC, created_at ASC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(request_from_row).collect()
    }

    async fn find_scheduled_for_job(&self, retention_job_id: i32) -> DbResult<Vec<DmRequest>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {REQUEST_COLUMNS}
            FROM dm_request
            WHERE retention_job_id = $1 AND status = 'scheduled'
            "#
        ))
        .bind(retention_job_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(request_from_row).collect()
    }

    async fn schedule_batch(
        &self,
        job: CreateRetentionJob,
        updates: &[ScheduleUpdate],
    ) -> DbResult<RetentionJob> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO retention_job (
                name, project_id, data_storage_name, data_storage_root,
                rule_type, rule_version, batch_id, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(&job.name)
        .bind(&job.project_id)
        .bind(&job.data_storage_name)
        .bind(&job.data_storage_root)
        .bind(job.rule_type.to_string())
        .bind(job.rule_version)
        .bind(&job.batch_id)
        .bind(&job.metadata)
        .fetch_one(&mut *tx)
        .await?;
        let created = job_from_row(&row)?;

        for update in updates {
            sqlx::query(
                r#"
                UPDATE dm_request
                SET status = 'scheduled', retention_job_id = $2,
                    number_of_retry = $3, priority = $4, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(update.request_id)
            .bind(created.id)
            .bind(update.number_of_retry)
            .bind(update.priority)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn update_statuses(&self, updates: &[StatusUpdate]) -> DbResult<usize> {
        if updates.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut changed = 0usize;

        for update in updates {
            let result = sqlx::query(
                r#"
                UPDATE dm_request
                SET status = $2, number_of_retry = $3, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(update.request_id)
            .bind(update.status.to_string())
            .bind(update.number_of_retry)
            .execute(&mut *tx)
            .await?;
            changed += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(changed)
    }

    async fn delete_terminal_older_than(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM dm_request
            WHERE status IN ('success', 'fail') AND updated_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
