//! Start migration command
//!
//! Creates a `Queued` job for four uploaded files and schedules it.

use crate::migration::{MigrationError, MigrationFiles, MigrationOrchestrator};
use mediator::Request;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartMigrationCommand {
    #[serde(default)]
    pub programs_file_id: String,
    #[serde(default)]
    pub chapters_file_id: String,
    #[serde(default)]
    pub program_chapters_file_id: String,
    #[serde(default)]
    pub product_templates_file_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartMigrationResponse {
    pub job_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum StartMigrationError {
    #[error("Programs file id is required and cannot be empty")]
    ProgramsFileRequired,
    #[error("Chapters file id is required and cannot be empty")]
    ChaptersFileRequired,
    #[error("Program-Chapters file id is required and cannot be empty")]
    ProgramChaptersFileRequired,
    #[error("Product Templates file id is required and cannot be empty")]
    ProductTemplatesFileRequired,
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
}

impl Request<Result<StartMigrationResponse, StartMigrationError>> for StartMigrationCommand {}

impl StartMigrationCommand {
    pub fn validate(&self) -> Result<(), StartMigrationError> {
        if self.programs_file_id.trim().is_empty() {
            return Err(StartMigrationError::ProgramsFileRequired);
        }
        if self.chapters_file_id.trim().is_empty() {
            return Err(StartMigrationError::ChaptersFileRequired);
        }
        if self.program_chapters_file_id.trim().is_empty() {
            return Err(StartMigrationError::ProgramChaptersFileRequired);
        }
        if self.product_templates_file_id.trim().is_empty() {
            return Err(StartMigrationError::ProductTemplatesFileRequired);
        }
        Ok(())
    }

    fn into_files(self) -> MigrationFiles {
        MigrationFiles {
            programs_file_id: self.programs_file_id.trim().to_string(),
            chapters_file_id: self.chapters_file_id.trim().to_string(),
            program_chapters_file_id: self.program_chapters_file_id.trim().to_string(),
            product_templates_file_id: self.product_templates_file_id.trim().to_string(),
        }
    }
}

#[tracing::instrument(skip(orchestrator, command))]
pub async fn handle(
    orchestrator: MigrationOrchestrator,
    command: StartMigrationCommand,
) -> Result<StartMigrationResponse, StartMigrationError> {
    command.validate()?;

    let job_id = orchestrator.start_migration(command.into_files()).await?;

    Ok(StartMigrationResponse { job_id })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> StartMigrationCommand {
        StartMigrationCommand {
            programs_file_id: "uploads/a/programs.csv".to_string(),
            chapters_file_id: "uploads/b/chapters.csv".to_string(),
            program_chapters_file_id: "uploads/c/program_chapters.csv".to_string(),
            product_templates_file_id: "uploads/d/product_templates.csv".to_string(),
        }
    }

    #[test]
    fn test_validation_success() {
        assert!(command().validate().is_ok());
    }

    #[test]
    fn test_validation_empty_chapters() {
        let cmd = StartMigrationCommand {
            chapters_file_id: "  ".to_string(),
            ..command()
        };
        assert!(matches!(
            cmd.validate(),
            Err(StartMigrationError::ChaptersFileRequired)
        ));
    }

    #[test]
    fn test_validation_empty_templates() {
        let cmd = StartMigrationCommand {
            product_templates_file_id: String::new(),
            ..command()
        };
        assert!(matches!(
            cmd.validate(),
            Err(StartMigrationError::ProductTemplatesFileRequired)
        ));
    }

    #[test]
    fn test_file_ids_are_trimmed() {
        let cmd = StartMigrationCommand {
            programs_file_id: " p.csv ".to_string(),
            ..command()
        };
        assert_eq!(cmd.into_files().programs_file_id, "p.csv");
    }
}
