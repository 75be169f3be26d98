mod error;
pub mod postgres;
pub mod repos;

#[cfg(test)]
mod tests;

use std::sync::Arc;

pub use error::{DbError, DbResult};
pub use repos::*;

use crate::config::DatabaseConfig;

/// Cached repository trait objects, created once at startup.
struct CachedRepos {
    rules: Arc<dyn RuleRepo>,
    jobs: Arc<dyn JobRepo>,
    validations: Arc<dyn ValidationRepo>,
    queue: Arc<dyn QueueRepo>,
    locks: Arc<dyn LockRepo>,
}

/// PostgreSQL-backed database handle.
///
/// Repositories are cached at construction time to avoid allocation on
/// each access.
pub struct DbPool {
    pool: sqlx::PgPool,
    repos: CachedRepos,
}

impl DbPool {
    /// Connect using the given configuration.
    pub async fn from_config(config: &DatabaseConfig) -> DbResult<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;
        Ok(Self::from_pg_pool(pool))
    }

    /// Wrap an existing pool. Primarily useful for testing.
    pub fn from_pg_pool(pool: sqlx::PgPool) -> Self {
        let repos = CachedRepos {
            rules: Arc::new(postgres::PostgresRuleRepo::new(pool.clone())),
            jobs: Arc::new(postgres::PostgresJobRepo::new(pool.clone())),
            validations: Arc::new(postgres::PostgresValidationRepo::new(pool.clone())),
            queue: Arc::new(postgres::PostgresQueueRepo::new(pool.clone())),
            locks: Arc::new(postgres::PostgresLockRepo::new(pool.clone())),
        };
        DbPool { pool, repos }
    }

    /// Run database migrations using sqlx's migration runner.
    /// This automatically creates and manages a _sqlx_migrations table.
    pub async fn run_migrations(&self) -> DbResult<()> {
        tracing::info!("Running PostgreSQL migrations");
        sqlx::migrate!("./migrations_sqlx/postgres")
            .run(&self.pool)
            .await?;
        tracing::info!("PostgreSQL migrations completed successfully");
        Ok(())
    }

    /// Verify the database is reachable.
    pub async fn health_check(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub fn rules(&self) -> Arc<dyn RuleRepo> {
        Arc::clone(&self.repos.rules)
    }

    pub fn jobs(&self) -> Arc<dyn JobRepo> {
        Arc::clone(&self.repos.jobs)
    }

    pub fn validations(&self) -> Arc<dyn ValidationRepo> {
        Arc::clone(&self.repos.validations)
    }

    pub fn queue(&self) -> Arc<dyn QueueRepo> {
        Arc::clone(&self.repos.queue)
    }

    pub fn locks(&self) -> Arc<dyn LockRepo> {
        Arc::clone(&self.repos.locks)
    }
}
