//! Collaborator traits of the migration pipeline
//!
//! The orchestrator and loader only talk to these traits. PostgreSQL and S3
//! implementations back the server; in-memory ones back tests and local runs.

use super::error::StoreError;
use super::records::EntityRecord;
use super::types::{DatasetKind, EntityType, JobStatus, MigrationFiles, MigrationJob};
use async_trait::async_trait;
use uuid::Uuid;

/// Outcome of one record in a bulk write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Uuid),
    Rejected(String),
}

impl InsertOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

/// Persistence of migration jobs
///
/// Every update is idempotent: counters are set to absolute values and
/// status changes are conditional on the expected current status.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a job in `Queued`
    async fn create(&self, files: MigrationFiles) -> Result<MigrationJob, StoreError>;

    async fn load(&self, job_id: Uuid) -> Result<Option<MigrationJob>, StoreError>;

    /// Move the job from `from` to `to`. Returns `false` when the job is not
    /// currently in `from`.
    async fn transition(
        &self,
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<bool, StoreError>;

    /// Set the inserted counter of a dataset. Counters never decrease.
    async fn record_progress(
        &self,
        job_id: Uuid,
        dataset: DatasetKind,
        inserted: i64,
    ) -> Result<(), StoreError>;

    async fn set_error_file(
        &self,
        job_id: Uuid,
        dataset: DatasetKind,
        file_id: &str,
    ) -> Result<(), StoreError>;

    /// Move a non-terminal job to `Error`. Returns `false` when the job was
    /// already terminal or does not exist.
    async fn fail(&self, job_id: Uuid, message: &str) -> Result<bool, StoreError>;
}

/// Target of bulk inserts
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert `records`, all of type `entity`. One outcome per record, in
    /// order. A rejected record must not affect its siblings.
    async fn insert_bulk(
        &self,
        entity: EntityType,
        records: &[EntityRecord],
    ) -> Result<Vec<InsertOutcome>, StoreError>;
}

/// Uploaded files and generated reports
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn read_bytes(&self, file_id: &str) -> Result<Vec<u8>, StoreError>;

    /// Store CSV content under `name`, returning its file id
    async fn write_csv(&self, name: &str, content: Vec<u8>) -> Result<String, StoreError>;

    /// A URL the file can be downloaded from
    async fn download_url(&self, file_id: &str) -> Result<String, StoreError>;
}
