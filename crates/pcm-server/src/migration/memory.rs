//! In-memory store implementations
//!
//! Used by the test suites and for running the pipeline without PostgreSQL
//! or S3. The record store can be told to reject individual business keys or
//! to fail whole bulk writes.

use super::error::StoreError;
use super::records::EntityRecord;
use super::store::{FileStore, InsertOutcome, JobStore, RecordStore};
use super::types::{DatasetKind, EntityType, JobStatus, MigrationFiles, MigrationJob};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

// ============================================================================
// Jobs
// ============================================================================

#[derive(Debug)]
struct JobEntry {
    job: MigrationJob,
    history: Vec<JobStatus>,
}

#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<Uuid, JobEntry>>,
    failing_targets: Vec<JobStatus>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every transition into `to` with a store error
    pub fn with_transition_failure(mut self, to: JobStatus) -> Self {
        self.failing_targets.push(to);
        self
    }

    /// Every status the job has been in, oldest first
    pub async fn history(&self, job_id: Uuid) -> Vec<JobStatus> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .map(|entry| entry.history.clone())
            .unwrap_or_default()
    }

    /// Insert a job as-is
    pub async fn insert(&self, job: MigrationJob) {
        let history = vec![job.status];
        self.jobs
            .write()
            .await
            .insert(job.id, JobEntry { job, history });
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, files: MigrationFiles) -> Result<MigrationJob, StoreError> {
        let job = MigrationJob::queued(files);
        self.insert(job.clone()).await;
        Ok(job)
    }

    async fn load(&self, job_id: Uuid) -> Result<Option<MigrationJob>, StoreError> {
        Ok(self
            .jobs
            .read()
            .await
            .get(&job_id)
            .map(|entry| entry.job.clone()))
    }

    async fn transition(
        &self,
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<bool, StoreError> {
        if self.failing_targets.contains(&to) {
            return Err(StoreError::Other(format!("status write to {} refused", to)));
        }

        let mut jobs = self.jobs.write().await;
        let Some(entry) = jobs.get_mut(&job_id) else {
            return Ok(false);
        };
        if entry.job.status != from {
            return Ok(false);
        }

        let now = Utc::now();
        entry.job.status = to;
        entry.job.updated_at = now;
        if to == JobStatus::ParsingCsv {
            entry.job.started_at = Some(now);
        }
        if to.is_terminal() {
            entry.job.completed_at = Some(now);
        }
        entry.history.push(to);
        Ok(true)
    }

    async fn record_progress(
        &self,
        job_id: Uuid,
        dataset: DatasetKind,
        inserted: i64,
    ) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(&job_id)
            .ok_or_else(|| StoreError::Other(format!("job {} not found", job_id)))?;
        let progress = entry.job.progress.get_mut(dataset);
        progress.inserted = progress.inserted.max(inserted);
        entry.job.updated_at = Utc::now();
        Ok(())
    }

    async fn set_error_file(
        &self,
        job_id: Uuid,
        dataset: DatasetKind,
        file_id: &str,
    ) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(&job_id)
            .ok_or_else(|| StoreError::Other(format!("job {} not found", job_id)))?;
        entry.job.progress.get_mut(dataset).error_file_id = Some(file_id.to_string());
        entry.job.updated_at = Utc::now();
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, message: &str) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.write().await;
        let Some(entry) = jobs.get_mut(&job_id) else {
            return Ok(false);
        };
        if entry.job.status.is_terminal() {
            return Ok(false);
        }

        let now = Utc::now();
        entry.job.status = JobStatus::Error;
        entry.job.error_message = Some(message.to_string());
        entry.job.updated_at = now;
        entry.job.completed_at = Some(now);
        entry.history.push(JobStatus::Error);
        Ok(true)
    }
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Default)]
struct RecordState {
    records: Vec<(Uuid, EntityRecord)>,
    keys: HashSet<(EntityType, String)>,
    rejections: HashMap<(EntityType, String), String>,
    failures: HashMap<EntityType, String>,
    bulk_sizes: Vec<(EntityType, usize)>,
}

#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    state: Mutex<RecordState>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the record with this business key
    pub fn with_rejection(
        mut self,
        entity: EntityType,
        business_key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        self.state
            .get_mut()
            .rejections
            .insert((entity, business_key.into()), reason.into());
        self
    }

    /// Fail every bulk write of this entity type
    pub fn with_failure(mut self, entity: EntityType, message: impl Into<String>) -> Self {
        self.state.get_mut().failures.insert(entity, message.into());
        self
    }

    pub async fn records(&self, entity: EntityType) -> Vec<(Uuid, EntityRecord)> {
        self.state
            .lock()
            .await
            .records
            .iter()
            .filter(|(_, record)| record.entity_type() == entity)
            .cloned()
            .collect()
    }

    /// Size of every bulk write received, in order
    pub async fn bulk_sizes(&self) -> Vec<(EntityType, usize)> {
        self.state.lock().await.bulk_sizes.clone()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert_bulk(
        &self,
        entity: EntityType,
        records: &[EntityRecord],
    ) -> Result<Vec<InsertOutcome>, StoreError> {
        let mut state = self.state.lock().await;
        if let Some(message) = state.failures.get(&entity) {
            return Err(StoreError::Other(message.clone()));
        }
        state.bulk_sizes.push((entity, records.len()));

        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            if let Some(reason) = state.rejections.get(&(entity, record.business_key())) {
                outcomes.push(InsertOutcome::Rejected(reason.clone()));
                continue;
            }
            let key = (entity, record.registry_key());
            if state.keys.contains(&key) {
                outcomes.push(InsertOutcome::Rejected(format!(
                    "duplicate key value violates unique constraint on {} '{}'",
                    entity,
                    record.business_key()
                )));
                continue;
            }

            let id = Uuid::new_v4();
            state.keys.insert(key);
            state.records.push((id, record.clone()));
            outcomes.push(InsertOutcome::Inserted(id));
        }

        Ok(outcomes)
    }
}

// ============================================================================
// Files
// ============================================================================

#[derive(Debug, Default)]
pub struct InMemoryFileStore {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, file_id: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.files.get_mut().insert(file_id.into(), content.into());
        self
    }

    pub async fn put(&self, file_id: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.files
            .write()
            .await
            .insert(file_id.into(), content.into());
    }

    /// Stored content as text, if present and valid UTF-8
    pub async fn text(&self, file_id: &str) -> Option<String> {
        self.files
            .read()
            .await
            .get(file_id)
            .and_then(|bytes| String::from_utf8(bytes.clone()).ok())
    }
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn read_bytes(&self, file_id: &str) -> Result<Vec<u8>, StoreError> {
        self.files
            .read()
            .await
            .get(file_id)
            .cloned()
            .ok_or_else(|| StoreError::FileNotFound(file_id.to_string()))
    }

    async fn write_csv(&self, name: &str, content: Vec<u8>) -> Result<String, StoreError> {
        self.files.write().await.insert(name.to_string(), content);
        Ok(name.to_string())
    }

    async fn download_url(&self, file_id: &str) -> Result<String, StoreError> {
        if self.files.read().await.contains_key(file_id) {
            Ok(format!("memory://{}", file_id))
        } else {
            Err(StoreError::FileNotFound(file_id.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::records::ProgramRecord;

    fn files() -> MigrationFiles {
        MigrationFiles {
            programs_file_id: "programs.csv".into(),
            chapters_file_id: "chapters.csv".into(),
            program_chapters_file_id: "program_chapters.csv".into(),
            product_templates_file_id: "product_templates.csv".into(),
        }
    }

    fn program(key: &str) -> EntityRecord {
        EntityRecord::Program(ProgramRecord {
            key: key.into(),
            name: format!("Program {}", key),
            description: None,
        })
    }

    #[tokio::test]
    async fn test_transition_is_conditional() {
        let store = InMemoryJobStore::new();
        let job = store.create(files()).await.unwrap();

        assert!(store
            .transition(job.id, JobStatus::Queued, JobStatus::ParsingCsv)
            .await
            .unwrap());
        assert!(!store
            .transition(job.id, JobStatus::Queued, JobStatus::ParsingCsv)
            .await
            .unwrap());

        let loaded = store.load(job.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::ParsingCsv);
        assert!(loaded.started_at.is_some());
        assert_eq!(
            store.history(job.id).await,
            vec![JobStatus::Queued, JobStatus::ParsingCsv]
        );
    }

    #[tokio::test]
    async fn test_fail_does_not_touch_terminal_jobs() {
        let store = InMemoryJobStore::new();
        let job = store.create(files()).await.unwrap();

        assert!(store.fail(job.id, "boom").await.unwrap());
        assert!(!store.fail(job.id, "again").await.unwrap());

        let loaded = store.load(job.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Error);
        assert_eq!(loaded.error_message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_progress_never_decreases() {
        let store = InMemoryJobStore::new();
        let job = store.create(files()).await.unwrap();

        store
            .record_progress(job.id, DatasetKind::Programs, 200)
            .await
            .unwrap();
        store
            .record_progress(job.id, DatasetKind::Programs, 150)
            .await
            .unwrap();

        let loaded = store.load(job.id).await.unwrap().unwrap();
        assert_eq!(loaded.progress.programs.inserted, 200);
    }

    #[tokio::test]
    async fn test_record_store_rejects_duplicates_and_injected_keys() {
        let store = InMemoryRecordStore::new().with_rejection(
            EntityType::Program,
            "P3",
            "name too long",
        );

        let outcomes = store
            .insert_bulk(
                EntityType::Program,
                &[program("P1"), program("P1"), program("P3")],
            )
            .await
            .unwrap();

        assert!(outcomes[0].is_inserted());
        assert!(matches!(&outcomes[1], InsertOutcome::Rejected(r) if r.contains("duplicate")));
        assert_eq!(outcomes[2], InsertOutcome::Rejected("name too long".into()));
        assert_eq!(store.records(EntityType::Program).await.len(), 1);
    }

    #[tokio::test]
    async fn test_file_store() {
        let store = InMemoryFileStore::new().with_file("a.csv", "key\nP1");
        assert_eq!(store.read_bytes("a.csv").await.unwrap(), b"key\nP1".to_vec());
        assert!(matches!(
            store.read_bytes("missing").await,
            Err(StoreError::FileNotFound(_))
        ));

        let id = store.write_csv("report.csv", b"x".to_vec()).await.unwrap();
        assert_eq!(store.text(&id).await.as_deref(), Some("x"));
        assert_eq!(store.download_url(&id).await.unwrap(), "memory://report.csv");
    }
}
