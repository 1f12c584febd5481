//! Chunked bulk loading of one dataset

use super::csv::{Dataset, ParsedRow};
use super::error::{MigrationError, RowFailure, StoreError};
use super::key_resolver::KeyMap;
use super::records::{business_key_of, EntityRecord, RowKey};
use super::report::{self, ErrorRow};
use super::store::{FileStore, InsertOutcome, JobStore, RecordStore};
use super::types::DatasetKind;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Outcome of loading one dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    pub dataset: DatasetKind,
    pub inserted_count: i64,
    pub failed_count: i64,
    pub error_rows: Vec<ErrorRow>,
    pub error_file_id: Option<String>,
}

impl LoadResult {
    fn new(dataset: DatasetKind) -> Self {
        Self {
            dataset,
            inserted_count: 0,
            failed_count: 0,
            error_rows: Vec::new(),
            error_file_id: None,
        }
    }

    fn record_failure(&mut self, row: &ParsedRow, failure: RowFailure) {
        debug!(
            dataset = %self.dataset,
            line = row.line(),
            reason = %failure,
            "Row failed"
        );
        self.failed_count += 1;
        self.error_rows.push(ErrorRow {
            row: row.clone(),
            reason: failure.to_string(),
        });
    }
}

/// Loads datasets for one job in chunks of at most `batch_size` rows
pub struct BatchLoader<'a> {
    job_id: Uuid,
    batch_size: usize,
    records: &'a dyn RecordStore,
    jobs: &'a dyn JobStore,
    files: &'a dyn FileStore,
}

impl<'a> BatchLoader<'a> {
    pub fn new(
        job_id: Uuid,
        batch_size: usize,
        records: &'a dyn RecordStore,
        jobs: &'a dyn JobStore,
        files: &'a dyn FileStore,
    ) -> Self {
        Self {
            job_id,
            batch_size: batch_size.max(1),
            records,
            jobs,
            files,
        }
    }

    /// Load every row of `dataset`.
    ///
    /// Rows that fail to resolve or are rejected by the store end up in the
    /// result's error rows; parent rows that insert are registered in `keys`.
    #[instrument(skip(self, dataset, keys), fields(job_id = %self.job_id, dataset = %dataset.kind, rows = dataset.len()))]
    pub async fn load(
        &self,
        dataset: &Dataset,
        keys: &mut KeyMap,
    ) -> Result<LoadResult, MigrationError> {
        let entity = dataset.kind.entity_type();
        if entity.is_parent() {
            check_unique_keys(dataset, keys)?;
        }

        let mut result = LoadResult::new(dataset.kind);

        for (chunk_index, chunk) in dataset.rows.chunks(self.batch_size).enumerate() {
            let failed_before = result.failed_count;
            let mut rows = Vec::with_capacity(chunk.len());
            let mut records = Vec::with_capacity(chunk.len());

            for row in chunk {
                match EntityRecord::from_row(dataset.kind, row, keys) {
                    Ok(record) => {
                        rows.push(row);
                        records.push(record);
                    }
                    Err(failure) => result.record_failure(row, failure),
                }
            }

            if !records.is_empty() {
                let outcomes = self
                    .records
                    .insert_bulk(entity, &records)
                    .await
                    .map_err(MigrationError::Store)?;

                if outcomes.len() != records.len() {
                    return Err(MigrationError::Store(StoreError::Other(format!(
                        "bulk insert returned {} outcomes for {} records",
                        outcomes.len(),
                        records.len()
                    ))));
                }

                for ((row, record), outcome) in rows.into_iter().zip(&records).zip(outcomes) {
                    match outcome {
                        InsertOutcome::Inserted(id) => {
                            result.inserted_count += 1;
                            if entity.is_parent() {
                                keys.register(entity, record.registry_key(), id)?;
                            }
                        }
                        InsertOutcome::Rejected(reason) => {
                            result.record_failure(row, RowFailure::ConstraintViolation(reason))
                        }
                    }
                }
            }

            self.jobs
                .record_progress(self.job_id, dataset.kind, result.inserted_count)
                .await
                .map_err(MigrationError::JobStore)?;

            info!(
                chunk = chunk_index,
                size = chunk.len(),
                inserted = result.inserted_count,
                failed = result.failed_count - failed_before,
                "Chunk loaded"
            );
        }

        if !result.error_rows.is_empty() {
            let content = report::render(&dataset.headers, &result.error_rows);
            let name = report::report_name(self.job_id, dataset.kind);
            let file_id = self
                .files
                .write_csv(&name, content.into_bytes())
                .await
                .map_err(|source| MigrationError::FileWrite {
                    dataset: dataset.kind,
                    source,
                })?;
            self.jobs
                .set_error_file(self.job_id, dataset.kind, &file_id)
                .await
                .map_err(MigrationError::JobStore)?;

            warn!(
                failed = result.failed_count,
                error_file_id = %file_id,
                "Dataset loaded with failed rows"
            );
            result.error_file_id = Some(file_id);
        }

        info!(
            inserted = result.inserted_count,
            failed = result.failed_count,
            "Dataset loaded"
        );

        Ok(result)
    }
}

/// Fail before any write when a parent dataset repeats a business key, or
/// reuses one registered earlier in the run
fn check_unique_keys(dataset: &Dataset, keys: &KeyMap) -> Result<(), MigrationError> {
    let entity = dataset.kind.entity_type();
    let mut seen = HashSet::new();

    for row in &dataset.rows {
        let Some(key) = business_key_of(dataset.kind, row) else {
            continue;
        };
        let registered = match &key {
            RowKey::Single(key) => keys.contains(entity, key),
            // junctions are registered by parent ids, only within-file repeats apply
            RowKey::Pair { .. } => false,
        };
        if registered || !seen.insert(key.clone()) {
            return Err(MigrationError::DuplicateBusinessKey {
                entity,
                key: key.to_string(),
            });
        }
    }

    Ok(())
}
