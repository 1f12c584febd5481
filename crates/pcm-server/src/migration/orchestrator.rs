//! Migration orchestrator
//!
//! Runs one job end to end: claim it, tokenize the four files, load them in
//! dependency order and finalize the job. The job id is the only handle that
//! crosses the asynchronous boundary; every run re-reads the job record.

use super::csv::Dataset;
use super::error::{truncate_message, MigrationError};
use super::key_resolver::KeyMap;
use super::loader::{BatchLoader, LoadResult};
use super::store::{FileStore, JobStore, RecordStore};
use super::types::{BatchConfig, DatasetKind, JobStatus, JobStatusView, MigrationFiles, MigrationJob};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Results of a completed run, one entry per dataset in load order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    pub results: Vec<LoadResult>,
}

impl MigrationSummary {
    pub fn inserted(&self) -> i64 {
        self.results.iter().map(|r| r.inserted_count).sum()
    }

    pub fn failed(&self) -> i64 {
        self.results.iter().map(|r| r.failed_count).sum()
    }

    pub fn get(&self, dataset: DatasetKind) -> Option<&LoadResult> {
        self.results.iter().find(|r| r.dataset == dataset)
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// All four datasets were loaded
    Completed(MigrationSummary),
    /// The job was moved to `Error` with this message
    Failed(String),
    /// The job was not `Queued`; nothing was touched
    Skipped(JobStatus),
}

#[derive(Clone)]
pub struct MigrationOrchestrator {
    jobs: Arc<dyn JobStore>,
    records: Arc<dyn RecordStore>,
    files: Arc<dyn FileStore>,
    config: BatchConfig,
}

impl MigrationOrchestrator {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        records: Arc<dyn RecordStore>,
        files: Arc<dyn FileStore>,
        config: BatchConfig,
    ) -> Self {
        Self {
            jobs,
            records,
            files,
            config,
        }
    }

    pub fn files(&self) -> Arc<dyn FileStore> {
        Arc::clone(&self.files)
    }

    /// Create a `Queued` job and run it in the background
    #[instrument(skip(self, files))]
    pub async fn start_migration(&self, files: MigrationFiles) -> Result<Uuid, MigrationError> {
        let job_id = self.enqueue(files).await?;
        self.dispatch(job_id);
        Ok(job_id)
    }

    /// Create a `Queued` job without scheduling it
    pub async fn enqueue(&self, files: MigrationFiles) -> Result<Uuid, MigrationError> {
        let job = self
            .jobs
            .create(files)
            .await
            .map_err(MigrationError::JobStore)?;
        info!(job_id = %job.id, "Migration job queued");
        Ok(job.id)
    }

    /// Run a job on the tokio runtime
    pub fn dispatch(&self, job_id: Uuid) -> JoinHandle<()> {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            match orchestrator.run(job_id).await {
                Ok(RunOutcome::Completed(summary)) => info!(
                    job_id = %job_id,
                    inserted = summary.inserted(),
                    failed = summary.failed(),
                    "Migration completed"
                ),
                Ok(RunOutcome::Failed(message)) => {
                    error!(job_id = %job_id, "Migration failed: {}", message)
                }
                Ok(RunOutcome::Skipped(status)) => {
                    warn!(job_id = %job_id, status = %status, "Migration not started")
                }
                Err(e) => error!(job_id = %job_id, "Migration run aborted: {}", e),
            }
        })
    }

    /// Current job state; a plain read, safe to poll
    pub async fn job_status(&self, job_id: Uuid) -> Result<Option<JobStatusView>, MigrationError> {
        let job = self
            .jobs
            .load(job_id)
            .await
            .map_err(MigrationError::JobStore)?;
        Ok(job.map(JobStatusView::from))
    }

    /// Execute a job to a terminal state.
    ///
    /// Returns `Err` only when the job could not be loaded or the failure
    /// could not be recorded.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn run(&self, job_id: Uuid) -> Result<RunOutcome, MigrationError> {
        let job = match self.jobs.load(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => return Err(MigrationError::JobNotFound(job_id)),
            Err(e) => {
                let err = MigrationError::JobStore(e);
                return self.abort(job_id, &err).await;
            }
        };

        if job.status != JobStatus::Queued {
            warn!(status = %job.status, "Job is not queued, skipping");
            return Ok(RunOutcome::Skipped(job.status));
        }

        match self
            .jobs
            .transition(job_id, JobStatus::Queued, JobStatus::ParsingCsv)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                let current = self
                    .jobs
                    .load(job_id)
                    .await
                    .map_err(MigrationError::JobStore)?
                    .map(|j| j.status)
                    .unwrap_or(JobStatus::Error);
                warn!(status = %current, "Job was claimed by another run");
                return Ok(RunOutcome::Skipped(current));
            }
            Err(e) => return self.abort(job_id, &MigrationError::JobStore(e)).await,
        }

        info!("Migration job claimed");

        match self.execute(&job).await {
            Ok(summary) => Ok(RunOutcome::Completed(summary)),
            Err(e) => self.abort(job_id, &e).await,
        }
    }

    async fn execute(&self, job: &MigrationJob) -> Result<MigrationSummary, MigrationError> {
        let datasets = self.parse_all(job).await?;

        self.advance(job.id, JobStatus::ParsingCsv, JobStatus::Processing)
            .await?;

        let loader = BatchLoader::new(
            job.id,
            self.config.batch_size,
            self.records.as_ref(),
            self.jobs.as_ref(),
            self.files.as_ref(),
        );
        let mut keys = KeyMap::new();
        let mut summary = MigrationSummary::default();

        for dataset in &datasets {
            let result = loader.load(dataset, &mut keys).await?;
            summary.results.push(result);
        }

        self.advance(job.id, JobStatus::Processing, JobStatus::Completed)
            .await?;
        Ok(summary)
    }

    /// Read and tokenize all four files before anything is written
    async fn parse_all(&self, job: &MigrationJob) -> Result<Vec<Dataset>, MigrationError> {
        let mut datasets = Vec::with_capacity(DatasetKind::LOAD_ORDER.len());

        for kind in DatasetKind::LOAD_ORDER {
            let file_id = job.files.file_id(kind);
            let bytes = self
                .files
                .read_bytes(file_id)
                .await
                .map_err(|source| MigrationError::FileRead {
                    dataset: kind,
                    file_id: file_id.to_string(),
                    source,
                })?;
            let dataset = Dataset::from_bytes(kind, &bytes)
                .map_err(|source| MigrationError::Decode { dataset: kind, source })?;

            info!(dataset = %kind, rows = dataset.len(), "Parsed CSV");
            datasets.push(dataset);
        }

        Ok(datasets)
    }

    async fn advance(
        &self,
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<(), MigrationError> {
        let moved = self
            .jobs
            .transition(job_id, from, to)
            .await
            .map_err(MigrationError::JobStore)?;
        if !moved {
            return Err(MigrationError::StatusConflict {
                job_id,
                expected: from,
            });
        }
        info!(status = %to, "Job status updated");
        Ok(())
    }

    /// Record a run-level failure on the job
    async fn abort(
        &self,
        job_id: Uuid,
        cause: &MigrationError,
    ) -> Result<RunOutcome, MigrationError> {
        let message = truncate_message(&cause.to_string(), self.config.error_message_max_len);
        error!(error = %cause, "Migration run failed");

        self.jobs
            .fail(job_id, &message)
            .await
            .map_err(MigrationError::JobStore)?;

        Ok(RunOutcome::Failed(message))
    }
}
