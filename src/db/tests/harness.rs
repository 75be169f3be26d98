//! Test harness for repository testing against real PostgreSQL.
//!
//! A single container is shared across the test run; each test gets its
//! own schema with fresh migrations, so tests stay isolated without
//! paying container startup per test.

use std::sync::OnceLock;

use sqlx::PgPool;
use testcontainers_modules::{
    postgres::Postgres,
    testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner},
};
use tokio::sync::OnceCell;

struct SharedContainer {
    #[allow(dead_code)] // Test infrastructure: keeps container alive
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static SHARED_CONTAINER: OnceLock<OnceCell<SharedContainer>> = OnceLock::new();

async fn get_shared_container() -> &'static SharedContainer {
    let cell = SHARED_CONTAINER.get_or_init(OnceCell::new);
    cell.get_or_init(|| async {
        let container = Postgres::default()
            .with_tag("18-alpine")
            .start()
            .await
            .expect("Failed to start PostgreSQL container");

        let host = container.get_host().await.expect("Failed to get host");
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("Failed to get port");

        let connection_string =
            format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

        SharedContainer {
            container,
            connection_string,
        }
    })
    .await
}

/// Create an isolated database schema for a single test.
pub async fn create_isolated_postgres_pool() -> PgPool {
    let shared = get_shared_container().await;

    let admin_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(1)
        .connect(&shared.connection_string)
        .await
        .expect("Failed to connect to PostgreSQL");

    let schema_name = format!("test_{}", uuid::Uuid::new_v4().simple());

    sqlx::query(&format!("CREATE SCHEMA \"{}\"", schema_name))
        .execute(&admin_pool)
        .await
        .expect("Failed to create test schema");

    let isolated_url = format!(
        "{}?options=-c search_path={}",
        shared.connection_string, schema_name
    );

    sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&isolated_url)
        .await
        .expect("Failed to connect to isolated schema")
}

/// Run the production migrations on the pool.
pub async fn run_postgres_migrations(pool: &PgPool) {
    sqlx::migrate!("./migrations_sqlx/postgres")
        .run(pool)
        .await
        .expect("Failed to run PostgreSQL migrations");
}
