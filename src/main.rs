use std::sync::Arc;

use clap::Parser;

mod config;
mod credentials;
mod db;
mod models;
mod notify;
mod observability;
mod retention;
mod throttle;
mod transfer;

/// Environment variable holding the bearer token for transfer service
/// calls. Read on every request so rotation needs no restart.
const TRANSFER_TOKEN_VAR: &str = "TRANSFER_API_TOKEN";

#[derive(Parser, Debug)]
#[command(version, about = "Retention engine for bucket lifecycle jobs", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the TOML config file
    #[arg(short, long, global = true, default_value = "retentiond.toml")]
    config: String,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run the engine (default)
    Serve,
    /// Run database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Some(Command::Migrate) => run_migrate(&args.config).await,
        Some(Command::Serve) | None => run_server(&args.config).await,
    }
}

fn load_config(path: &str) -> config::EngineConfig {
    match config::EngineConfig::from_file(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config from {path}: {e}");
            std::process::exit(1);
        }
    }
}

async fn run_migrate(config_path: &str) {
    let config = load_config(config_path);
    observability::init_tracing(&config.observability);

    tracing::info!(config_file = config_path, "Running database migrations");

    let pool = match db::DbPool::from_config(&config.database).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "Database connection failed");
            std::process::exit(1);
        }
    };
    match pool.run_migrations().await {
        Ok(()) => tracing::info!("Database migrations completed"),
        Err(e) => {
            tracing::error!(error = %e, "Database migrations failed");
            std::process::exit(1);
        }
    }
}

async fn run_server(config_path: &str) {
    let config = load_config(config_path);
    observability::init_tracing(&config.observability);

    tracing::info!(config_file = config_path, "Starting retention engine");

    let pool = match db::DbPool::from_config(&config.database).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "Database connection failed");
            std::process::exit(1);
        }
    };
    if config.database.run_migrations {
        if let Err(e) = pool.run_migrations().await {
            tracing::error!(error = %e, "Database migrations failed");
            std::process::exit(1);
        }
    }
    if let Err(e) = pool.health_check().await {
        tracing::error!(error = %e, "Database health check failed");
        std::process::exit(1);
    }

    let credentials = Arc::new(credentials::EnvTokenProvider::new(TRANSFER_TOKEN_VAR));
    let transfer: Arc<dyn transfer::TransferApi> =
        match transfer::HttpTransferClient::new(&config.transfer, credentials) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                tracing::error!(error = %e, "Transfer client construction failed");
                std::process::exit(1);
            }
        };
    let throttle = Arc::new(throttle::QuotaThrottle::new(&config.throttle));

    let reconciler = Arc::new(retention::JobReconciler::new(
        Arc::clone(&transfer),
        throttle,
        pool.jobs(),
        Arc::new(notify::LogNotifier),
        config.transfer.clone(),
    ));

    let runner = Arc::new(retention::BatchRunner::new(
        pool.locks(),
        pool.rules(),
        pool.jobs(),
        pool.queue(),
        reconciler,
        config.scheduler.rule_batch.clone(),
        config.scheduler.dm_batch.clone(),
    ));

    let validator = Arc::new(retention::ValidationReconciler::new(
        pool.jobs(),
        pool.validations(),
        pool.queue(),
        Arc::clone(&transfer),
        config.scheduler.dm_batch.max_retry,
        chrono::Duration::hours(i64::from(
            config.scheduler.validation.revalidate_after_hours,
        )),
    ));

    let workers = vec![
        tokio::spawn(retention::rule_batch_worker(Arc::clone(&runner))),
        tokio::spawn(retention::dm_batch_worker(runner)),
        tokio::spawn(retention::validation_worker(
            validator,
            config.scheduler.validation.clone(),
        )),
    ];

    tracing::info!("Retention engine started");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received; stopping workers");
    for worker in &workers {
        worker.abort();
    }
}
