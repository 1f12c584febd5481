//! Core types shared by the migration pipeline
//!
//! The job record, its status state machine and the per-dataset progress
//! counters live here so that the loader, the orchestrator and every store
//! implementation agree on one vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Largest chunk submitted to the record store in one bulk write
pub const MAX_BATCH_SIZE: usize = 200;

/// Default chunk size
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Width of `migration_jobs.error_message`
pub const MAX_ERROR_MESSAGE_LEN: usize = 255;

/// Maximum length (in characters) of the error message stored on a job
pub const DEFAULT_ERROR_MESSAGE_MAX_LEN: usize = MAX_ERROR_MESSAGE_LEN;

// ============================================================================
// Datasets and entity types
// ============================================================================

/// One of the four uploaded files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    Programs,
    Chapters,
    ProgramChapters,
    ProductTemplates,
}

impl DatasetKind {
    /// Dependency order: parents before the rows that reference them
    pub const LOAD_ORDER: [DatasetKind; 4] = [
        DatasetKind::Programs,
        DatasetKind::Chapters,
        DatasetKind::ProgramChapters,
        DatasetKind::ProductTemplates,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Programs => "programs",
            DatasetKind::Chapters => "chapters",
            DatasetKind::ProgramChapters => "program_chapters",
            DatasetKind::ProductTemplates => "product_templates",
        }
    }

    /// Human readable name used in job error messages
    pub fn label(&self) -> &'static str {
        match self {
            DatasetKind::Programs => "Programs",
            DatasetKind::Chapters => "Chapters",
            DatasetKind::ProgramChapters => "Program-Chapters",
            DatasetKind::ProductTemplates => "Product Templates",
        }
    }

    pub fn entity_type(&self) -> EntityType {
        match self {
            DatasetKind::Programs => EntityType::Program,
            DatasetKind::Chapters => EntityType::Chapter,
            DatasetKind::ProgramChapters => EntityType::ProgramChapter,
            DatasetKind::ProductTemplates => EntityType::ProductTemplate,
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Target entity of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Program,
    Chapter,
    ProgramChapter,
    ProductTemplate,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Program => "Program",
            EntityType::Chapter => "Chapter",
            EntityType::ProgramChapter => "ProgramChapter",
            EntityType::ProductTemplate => "ProductTemplate",
        }
    }

    /// Parent types register their generated ids in the key map
    pub fn is_parent(&self) -> bool {
        !matches!(self, EntityType::ProductTemplate)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Job status
// ============================================================================

/// Migration job status
///
/// Transitions only move forward:
/// `Queued -> Parsing CSV -> Processing -> Completed`, with `Error` reachable
/// from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    #[serde(rename = "Parsing CSV")]
    ParsingCsv,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "Queued",
            JobStatus::ParsingCsv => "Parsing CSV",
            JobStatus::Processing => "Processing",
            JobStatus::Completed => "Completed",
            JobStatus::Error => "Error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    fn rank(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::ParsingCsv => 1,
            JobStatus::Processing => 2,
            JobStatus::Completed | JobStatus::Error => 3,
        }
    }

    /// Whether `next` is a legal successor of this status
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            JobStatus::Error => true,
            _ => next.rank() == self.rank() + 1,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Queued" => Ok(JobStatus::Queued),
            "Parsing CSV" => Ok(JobStatus::ParsingCsv),
            "Processing" => Ok(JobStatus::Processing),
            "Completed" => Ok(JobStatus::Completed),
            "Error" => Ok(JobStatus::Error),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

// ============================================================================
// Job record
// ============================================================================

/// File identifiers of the four source datasets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationFiles {
    pub programs_file_id: String,
    pub chapters_file_id: String,
    pub program_chapters_file_id: String,
    pub product_templates_file_id: String,
}

impl MigrationFiles {
    pub fn file_id(&self, dataset: DatasetKind) -> &str {
        match dataset {
            DatasetKind::Programs => &self.programs_file_id,
            DatasetKind::Chapters => &self.chapters_file_id,
            DatasetKind::ProgramChapters => &self.program_chapters_file_id,
            DatasetKind::ProductTemplates => &self.product_templates_file_id,
        }
    }

    /// Datasets whose file id is blank
    pub fn missing(&self) -> Vec<DatasetKind> {
        DatasetKind::LOAD_ORDER
            .into_iter()
            .filter(|kind| self.file_id(*kind).trim().is_empty())
            .collect()
    }
}

/// Counters persisted for one dataset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetProgress {
    pub inserted: i64,
    pub error_file_id: Option<String>,
}

/// Per-dataset counters of a job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub programs: DatasetProgress,
    pub chapters: DatasetProgress,
    pub program_chapters: DatasetProgress,
    pub product_templates: DatasetProgress,
}

impl JobProgress {
    pub fn get(&self, dataset: DatasetKind) -> &DatasetProgress {
        match dataset {
            DatasetKind::Programs => &self.programs,
            DatasetKind::Chapters => &self.chapters,
            DatasetKind::ProgramChapters => &self.program_chapters,
            DatasetKind::ProductTemplates => &self.product_templates,
        }
    }

    pub fn get_mut(&mut self, dataset: DatasetKind) -> &mut DatasetProgress {
        match dataset {
            DatasetKind::Programs => &mut self.programs,
            DatasetKind::Chapters => &mut self.chapters,
            DatasetKind::ProgramChapters => &mut self.program_chapters,
            DatasetKind::ProductTemplates => &mut self.product_templates,
        }
    }

    pub fn total_inserted(&self) -> i64 {
        DatasetKind::LOAD_ORDER
            .iter()
            .map(|kind| self.get(*kind).inserted)
            .sum()
    }
}

/// Persisted migration job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub files: MigrationFiles,
    pub progress: JobProgress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl MigrationJob {
    /// A freshly created job in `Queued` with zero counters
    pub fn queued(files: MigrationFiles) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Queued,
            error_message: None,
            files,
            progress: JobProgress::default(),
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }
}

/// What pollers see
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub progress: JobProgress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<MigrationJob> for JobStatusView {
    fn from(job: MigrationJob) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            error_message: job.error_message,
            progress: job.progress,
            created_at: job.created_at,
            updated_at: job.updated_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}

// ============================================================================
// Batch settings
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub error_message_max_len: usize,
}

impl BatchConfig {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
            ..Self::default()
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            error_message_max_len: DEFAULT_ERROR_MESSAGE_MAX_LEN,
        }
    }
}
