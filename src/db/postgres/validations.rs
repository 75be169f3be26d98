use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    db::{
        error::{DbError, DbResult},
        repos::ValidationRepo,
    },
    models::{JobValidation, UpsertValidation},
};

pub struct PostgresValidationRepo {
    pool: PgPool,
}

impl PostgresValidationRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn validation_from_row(row: &PgRow) -> DbResult<JobValidation> {
    Ok(JobValidation {
        id: row.get("id"),
        retention_job_id: row.get("retention_job_id"),
        job_operation_name: row.get("job_operation_name"),
        status: row
            .get::<String, _>("status")
            .parse()
            .map_err(DbError::Internal)?,
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl ValidationRepo for PostgresValidationRepo {
    async fn find_for_jobs(&self, job_ids: &[i32]) -> DbResult<Vec<JobValidation>> {
        if job_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT id, retention_job_id, job_operation_name, status,
                   start_time, end_time, created_at, updated_at
            FROM retention_job_validation
            WHERE retention_job_id = ANY($1)
            "#,
        )
        .bind(job_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(validation_from_row).collect()
    }

    async fn upsert_batch(&self, rows: Vec<UpsertValidation>) -> DbResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let count = rows.len();
        let mut tx = self.pool.begin().await?;

        for row in rows {
            match row.id {
                Some(id) => {
                    sqlx::query(
                        r#"
                        UPDATE retention_job_validation
                        SET status = $2, start_time = $3, end_time = $4,
                            updated_at = NOW()
                        WHERE id = $1
                        "#,
                    )
                    .bind(id)
                    .bind(row.status.to_string())
                    .bind(row.start_time)
                    .bind(row.end_time)
                    .execute(&mut *tx)
                    .await?;
                }
                None => {
                    sqlx::query(
                        r#"
                        INSERT INTO retention_job_validation (
                            retention_job_id, job_operation_name, status,
                            start_time, end_time
                        )
                        VALUES ($1, $2, $3, $4, $5)
                        ON CONFLICT (retention_job_id, job_operation_name)
                        DO UPDATE SET status = EXCLUDED.status,
                                      start_time = EXCLUDED.start_time,
                                      end_time = EXCLUDED.end_time,
                                      updated_at = NOW()
                        "#,
                    )
                    .bind(row.retention_job_id)
                    .bind(&row.job_operation_name)
                    .bind(row.status.to_string())
                    .bind(row.start_time)
                    .bind(row.end_time)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(count)
    }
}
