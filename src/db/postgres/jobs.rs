use async_trait::async_trait;
use chrono::Duration;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    db::{
        error::{DbError, DbResult},
        repos::JobRepo,
    },
    models::{CreateRetentionJob, RetentionJob, RuleType},
};

pub struct PostgresJobRepo {
    pool: PgPool,
}

impl PostgresJobRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn job_from_row(row: &PgRow) -> DbResult<RetentionJob> {
    Ok(RetentionJob {
        id: row.get("id"),
        name: row.get("name"),
        project_id: row.get("project_id"),
        data_storage_name: row.get("data_storage_name"),
        data_storage_root: row.get("data_storage_root"),
        rule_type: row
            .get::<String, _>("rule_type")
            .parse()
            .map_err(DbError::Internal)?,
        rule_version: row.get("rule_version"),
        batch_id: row.get("batch_id"),
        metadata: row.get("metadata"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

pub(crate) const JOB_COLUMNS: &str = "id, name, project_id, data_storage_name, \
     data_storage_root, rule_type, rule_version, batch_id, metadata, \
     created_at, updated_at";

#[async_trait]
impl JobRepo for PostgresJobRepo {
    async fn create(&self, input: CreateRetentionJob) -> DbResult<RetentionJob> {
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
        .bind(&input.name)
        .bind(&input.project_id)
        .bind(&input.data_storage_name)
        .bind(&input.data_storage_root)
        .bind(input.rule_type.to_string())
        .bind(input.rule_version)
        .bind(&input.batch_id)
        .bind(&input.metadata)
        .fetch_one(&self.pool)
        .await?;

        job_from_row(&row)
    }

    async fn find_latest_named_for_scope(
        &self,
        data_storage_root: &str,
        rule_type: RuleType,
    ) -> DbResult<Option<RetentionJob>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM retention_job
            WHERE data_storage_root = $1 AND rule_type = $2 AND name IS NOT NULL
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(data_storage_root)
        .bind(rule_type.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(job_from_row).transpose()
    }

    async fn find_needing_validation(
        &self,
        revalidate_after: Duration,
    ) -> DbResult<Vec<RetentionJob>> {
        // One row per job with its latest validation attached. Jobs without
        // any validation row, or with a pending one, are always due. Global
        // catch-all jobs recur daily and additionally go stale on a clock.
        let rows = sqlx::query(
            r#"
            SELECT j.id, j.name, j.project_id, j.data_storage_name,
                   j.data_storage_root, j.rule_type, j.rule_version,
                   j.batch_id, j.metadata, j.created_at, j.updated_at
            FROM retention_job j
            LEFT JOIN LATERAL (
                SELECT v.status, v.updated_at
                FROM retention_job_validation v
                WHERE v.retention_job_id = j.id
                ORDER BY v.updated_at DESC
                LIMIT 1
            ) latest ON TRUE
            WHERE j.name IS NOT NULL
              AND (
                latest.status IS NULL
                OR latest.status = 'pending'
                OR (
                    j.rule_type = 'global'
                    AND latest.updated_at < NOW() - $1 * INTERVAL '1 second'
                )
              )
            ORDER BY j.project_id, j.id
            "#,
        )
        .bind(revalidate_after.num_seconds())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(job_from_row).collect()
    }
}
