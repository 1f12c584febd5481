//! Migration routes
//!
//! `POST /migrations` starts a job, `GET /migrations/:job_id` reports its
//! progress.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use uuid::Uuid;

use super::commands::{start::handle as handle_start, StartMigrationCommand, StartMigrationError};
use super::queries::{
    get_status::handle as handle_get_status, GetMigrationStatusError, GetMigrationStatusQuery,
};
use crate::error::AppError;
use crate::migration::MigrationOrchestrator;

/// Create migration routes
pub fn migrations_routes() -> Router<MigrationOrchestrator> {
    Router::new()
        .route("/migrations", post(start_migration))
        .route("/migrations/:job_id", get(get_migration_status))
}

/// Start a migration
///
/// POST /migrations
async fn start_migration(
    State(orchestrator): State<MigrationOrchestrator>,
    Json(command): Json<StartMigrationCommand>,
) -> Result<Response, AppError> {
    let response = handle_start(orchestrator, command).await?;

    tracing::info!(job_id = %response.job_id, "Migration started via API");

    Ok((StatusCode::ACCEPTED, Json(json!(response))).into_response())
}

/// Get the status of a migration job
///
/// GET /migrations/:job_id
async fn get_migration_status(
    State(orchestrator): State<MigrationOrchestrator>,
    Path(job_id): Path<String>,
) -> Result<Response, AppError> {
    let job_id = Uuid::parse_str(&job_id)
        .map_err(|_| AppError::BadRequest(format!("Invalid job id '{}'", job_id)))?;

    let view = handle_get_status(orchestrator, GetMigrationStatusQuery { job_id }).await?;

    Ok((StatusCode::OK, Json(json!(view))).into_response())
}

impl From<StartMigrationError> for AppError {
    fn from(err: StartMigrationError) -> Self {
        match err {
            StartMigrationError::Migration(e) => AppError::Migration(e),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl From<GetMigrationStatusError> for AppError {
    fn from(err: GetMigrationStatusError) -> Self {
        match err {
            GetMigrationStatusError::NotFound => {
                AppError::NotFound("Migration job not found".to_string())
            },
            GetMigrationStatusError::Migration(e) => AppError::Migration(e),
        }
    }
}
