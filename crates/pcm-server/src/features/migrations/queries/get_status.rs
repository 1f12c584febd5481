//! Get migration status query
//!
//! A plain read of the job record, safe to poll.

use crate::migration::{JobStatusView, MigrationError, MigrationOrchestrator};
use mediator::Request;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetMigrationStatusQuery {
    pub job_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum GetMigrationStatusError {
    #[error("Migration job not found")]
    NotFound,
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
}

impl Request<Result<JobStatusView, GetMigrationStatusError>> for GetMigrationStatusQuery {}

pub async fn handle(
    orchestrator: MigrationOrchestrator,
    query: GetMigrationStatusQuery,
) -> Result<JobStatusView, GetMigrationStatusError> {
    orchestrator
        .job_status(query.job_id)
        .await?
        .ok_or(GetMigrationStatusError::NotFound)
}
