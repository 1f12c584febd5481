//! pcm-server: HTTP front end and background runner for catalog migrations

use anyhow::{Context, Result};
use pcm_common::logging::{init_logging, LogConfig};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tracing::{error, info, warn};

use pcm_server::{
    api,
    config::{Config, DatabaseConfig},
    features::FeatureState,
    migration::{
        postgres::{PgJobStore, PgRecordStore},
        MigrationOrchestrator,
    },
    storage::{config::StorageConfig, Storage},
};

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = init_logging(
        &LogConfig::builder()
            .log_file_prefix("pcm-server")
            .filter_directives("pcm_server=debug,tower_http=debug,sqlx=warn")
            .build()
            .merge_env()?,
    )?;

    let config = Config::load()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        batch_size = config.migration.batch_size,
        "pcm-server starting"
    );

    let pool = connect(&config.database).await?;

    let storage = Storage::new(StorageConfig::from_env()?);
    let orchestrator = MigrationOrchestrator::new(
        Arc::new(PgJobStore::new(pool.clone())),
        Arc::new(PgRecordStore::new(pool)),
        Arc::new(storage),
        config.migration.batch_config(),
    );

    let app = api::create_router(FeatureState::new(orchestrator), &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "Accepting requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(Duration::from_secs(
            config.server.shutdown_timeout_secs,
        )))
        .await?;

    info!("pcm-server stopped");
    Ok(())
}

/// Open the pool and bring the schema up to date
async fn connect(database: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(database.max_connections)
        .min_connections(database.min_connections)
        .acquire_timeout(Duration::from_secs(database.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(database.idle_timeout_secs))
        .connect(&database.url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .context("Failed to apply database migrations")?;
    info!(max_connections = database.max_connections, "Database ready");

    Ok(pool)
}

/// Resolves on Ctrl+C or SIGTERM, then allows running jobs a grace period
async fn wait_for_shutdown(grace: Duration) {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Ctrl+C handler unavailable");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => error!(error = %e, "SIGTERM handler unavailable"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let source = tokio::select! {
        _ = interrupt => "ctrl-c",
        _ = terminate => "sigterm",
    };

    warn!(signal = source, grace_secs = grace.as_secs(), "Shutting down");
    tokio::time::sleep(grace.min(Duration::from_secs(5))).await;
}
