//! Feature modules implementing the PCM API
//!
//! Each feature is a vertical slice with its own commands, queries and
//! routes:
//!
//! - **migrations**: start a migration job and poll its status
//! - **files**: upload source CSVs and download error reports
//!
//! Commands and queries implement `mediator::Request` so they can be
//! dispatched through a mediator as well as called directly.

pub mod files;
pub mod migrations;

use crate::migration::{FileStore, MigrationOrchestrator};
use axum::Router;
use std::sync::Arc;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// Runs migration jobs and answers status queries
    pub orchestrator: MigrationOrchestrator,
    /// Backend for uploaded files and error reports
    pub files: Arc<dyn FileStore>,
}

impl FeatureState {
    pub fn new(orchestrator: MigrationOrchestrator) -> Self {
        let files = orchestrator.files();
        Self {
            orchestrator,
            files,
        }
    }
}

/// Creates the API router with all feature routes mounted
pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .merge(migrations::migrations_routes().with_state(state.orchestrator.clone()))
        .merge(files::files_routes().with_state(state.files.clone()))
}
