use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::{
    db::{
        error::{DbError, DbResult},
        repos::RuleRepo,
    },
    models::{RetentionRule, RuleType},
};

pub struct PostgresRuleRepo {
    pool: PgPool,
}

impl PostgresRuleRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn rule_from_row(row: &sqlx::postgres::PgRow) -> DbResult<RetentionRule> {
    Ok(RetentionRule {
        id: row.get("id"),
        rule_type: row
            .get::<String, _>("rule_type")
            .parse()
            .map_err(DbError::Internal)?,
        project_id: row.get("project_id"),
        data_storage_name: row.get("data_storage_name"),
        retention_days: row.get("retention_days"),
        version: row.get("version"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl RuleRepo for PostgresRuleRepo {
    async fn find_active_by_type(&self, rule_type: RuleType) -> DbResult<Vec<RetentionRule>> {
        let rows = sqlx::query(
            r#"
            SELECT id, rule_type, project_id, data_storage_name, retention_days,
                   version, is_active, created_at, updated_at
            FROM retention_rule
            WHERE rule_type = $1 AND is_active
            ORDER BY project_id, data_storage_name
            "#,
        )
        .bind(rule_type.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(rule_from_row).collect()
    }
}
