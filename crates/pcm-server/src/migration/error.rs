//! Error types for the migration pipeline
//!
//! [`MigrationError`] aborts a run and moves the job to `Error`.
//! [`RowFailure`] only marks a single input row as failed; the row ends up in
//! the dataset's error report and the run continues.

use super::csv::DecodeError;
use super::types::{DatasetKind, EntityType, JobStatus};
use thiserror::Error;
use uuid::Uuid;

/// Failure reported by a job, record or file store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("file '{0}' not found")]
    FileNotFound(String),

    #[error("{0}")]
    Other(String),
}

/// Run-level failure
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("{dataset} file could not be read: {source}")]
    Decode {
        dataset: DatasetKind,
        #[source]
        source: DecodeError,
    },

    #[error("duplicate business key '{key}' for {entity}")]
    DuplicateBusinessKey { entity: EntityType, key: String },

    #[error("migration job {0} not found")]
    JobNotFound(Uuid),

    #[error("job {job_id} is no longer in status {expected}")]
    StatusConflict { job_id: Uuid, expected: JobStatus },

    #[error("{dataset} file '{file_id}' could not be retrieved: {source}")]
    FileRead {
        dataset: DatasetKind,
        file_id: String,
        #[source]
        source: StoreError,
    },

    #[error("error report for {dataset} could not be written: {source}")]
    FileWrite {
        dataset: DatasetKind,
        #[source]
        source: StoreError,
    },

    #[error("record store failure: {0}")]
    Store(#[source] StoreError),

    #[error("job store failure: {0}")]
    JobStore(#[source] StoreError),
}

/// Why a single row was not inserted. `Display` is the error report reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowFailure {
    #[error("unresolved reference: {entity} '{key}' not found")]
    UnresolvedReference { entity: EntityType, key: String },

    #[error("{0}")]
    ConstraintViolation(String),
}

impl RowFailure {
    pub fn missing_field(field: &str) -> Self {
        RowFailure::ConstraintViolation(format!("required field '{}' is missing", field))
    }
}

/// Cut a message to at most `max_chars` characters
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    match message.char_indices().nth(max_chars) {
        Some((end, _)) => message[..end].to_string(),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_message() {
        assert_eq!(truncate_message("short", 255), "short");
        assert_eq!(truncate_message("abcdef", 3), "abc");
        let long = "x".repeat(300);
        assert_eq!(truncate_message(&long, 255).len(), 255);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let message = "ééééé";
        assert_eq!(truncate_message(message, 2), "éé");
    }

    #[test]
    fn test_row_failure_reasons() {
        let unresolved = RowFailure::UnresolvedReference {
            entity: EntityType::Chapter,
            key: "C1".to_string(),
        };
        assert_eq!(
            unresolved.to_string(),
            "unresolved reference: Chapter 'C1' not found"
        );
        assert_eq!(
            RowFailure::missing_field("name").to_string(),
            "required field 'name' is missing"
        );
    }

    #[test]
    fn test_decode_error_names_the_file() {
        let err = MigrationError::Decode {
            dataset: DatasetKind::ProgramChapters,
            source: DecodeError { offset: 4 },
        };
        let message = err.to_string();
        assert!(message.starts_with("Program-Chapters file"));
        assert!(message.contains("UTF-8"));
    }
}
