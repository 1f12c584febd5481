//! PostgreSQL backed job and record stores

use super::error::StoreError;
use super::records::EntityRecord;
use super::store::{InsertOutcome, JobStore, RecordStore};
use super::types::{
    DatasetKind, DatasetProgress, EntityType, JobProgress, JobStatus, MigrationFiles,
    MigrationJob,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, error};
use uuid::Uuid;

const JOB_COLUMNS: &str = r#"
    id, status, error_message,
    programs_file_id, chapters_file_id, program_chapters_file_id, product_templates_file_id,
    programs_inserted, chapters_inserted, program_chapters_inserted, product_templates_inserted,
    programs_error_file_id, chapters_error_file_id, program_chapters_error_file_id,
    product_templates_error_file_id,
    created_at, updated_at, started_at, completed_at
"#;

/// Column prefix of a dataset's counters on `migration_jobs`
fn column_prefix(dataset: DatasetKind) -> &'static str {
    dataset.as_str()
}

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    status: String,
    error_message: Option<String>,
    programs_file_id: String,
    chapters_file_id: String,
    program_chapters_file_id: String,
    product_templates_file_id: String,
    programs_inserted: i64,
    chapters_inserted: i64,
    program_chapters_inserted: i64,
    product_templates_inserted: i64,
    programs_error_file_id: Option<String>,
    chapters_error_file_id: Option<String>,
    program_chapters_error_file_id: Option<String>,
    product_templates_error_file_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for MigrationJob {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<JobStatus>()
            .map_err(|e| StoreError::Other(e.to_string()))?;

        Ok(MigrationJob {
            id: row.id,
            status,
            error_message: row.error_message,
            files: MigrationFiles {
                programs_file_id: row.programs_file_id,
                chapters_file_id: row.chapters_file_id,
                program_chapters_file_id: row.program_chapters_file_id,
                product_templates_file_id: row.product_templates_file_id,
            },
            progress: JobProgress {
                programs: DatasetProgress {
                    inserted: row.programs_inserted,
                    error_file_id: row.programs_error_file_id,
                },
                chapters: DatasetProgress {
                    inserted: row.chapters_inserted,
                    error_file_id: row.chapters_error_file_id,
                },
                program_chapters: DatasetProgress {
                    inserted: row.program_chapters_inserted,
                    error_file_id: row.program_chapters_error_file_id,
                },
                product_templates: DatasetProgress {
                    inserted: row.product_templates_inserted,
                    error_file_id: row.product_templates_error_file_id,
                },
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

// ============================================================================
// Jobs
// ============================================================================

/// Jobs in the `migration_jobs` table
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, files: MigrationFiles) -> Result<MigrationJob, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO migration_jobs (
                id, status, programs_file_id, chapters_file_id,
                program_chapters_file_id, product_templates_file_id
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            JOB_COLUMNS
        );

        let row: JobRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(JobStatus::Queued.as_str())
            .bind(&files.programs_file_id)
            .bind(&files.chapters_file_id)
            .bind(&files.program_chapters_file_id)
            .bind(&files.product_templates_file_id)
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    async fn load(&self, job_id: Uuid) -> Result<Option<MigrationJob>, StoreError> {
        let sql = format!("SELECT {} FROM migration_jobs WHERE id = $1", JOB_COLUMNS);

        let row: Option<JobRow> = sqlx::query_as(&sql)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(MigrationJob::try_from).transpose()
    }

    async fn transition(
        &self,
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE migration_jobs
            SET status = $1,
                updated_at = NOW(),
                started_at = CASE WHEN $2 THEN NOW() ELSE started_at END,
                completed_at = CASE WHEN $3 THEN NOW() ELSE completed_at END
            WHERE id = $4 AND status = $5
            "#,
        )
        .bind(to.as_str())
        .bind(to == JobStatus::ParsingCsv)
        .bind(to.is_terminal())
        .bind(job_id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_progress(
        &self,
        job_id: Uuid,
        dataset: DatasetKind,
        inserted: i64,
    ) -> Result<(), StoreError> {
        let column = format!("{}_inserted", column_prefix(dataset));
        let sql = format!(
            "UPDATE migration_jobs SET {col} = GREATEST({col}, $1), updated_at = NOW() WHERE id = $2",
            col = column
        );

        sqlx::query(&sql)
            .bind(inserted)
            .bind(job_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_error_file(
        &self,
        job_id: Uuid,
        dataset: DatasetKind,
        file_id: &str,
    ) -> Result<(), StoreError> {
        let sql = format!(
            "UPDATE migration_jobs SET {}_error_file_id = $1, updated_at = NOW() WHERE id = $2",
            column_prefix(dataset)
        );

        sqlx::query(&sql)
            .bind(file_id)
            .bind(job_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn fail(&self, job_id: Uuid, message: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE migration_jobs
            SET status = $1, error_message = $2, completed_at = NOW(), updated_at = NOW()
            WHERE id = $3 AND status NOT IN ($4, $5)
            "#,
        )
        .bind(JobStatus::Error.as_str())
        .bind(message)
        .bind(job_id)
        .bind(JobStatus::Completed.as_str())
        .bind(JobStatus::Error.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

// ============================================================================
// Records
// ============================================================================

/// Entity tables, one transaction per bulk write with a savepoint per record
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_one(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        record: &EntityRecord,
    ) -> Result<(), sqlx::Error> {
        match record {
            EntityRecord::Program(r) => {
                sqlx::query(
                    "INSERT INTO programs (id, business_key, name, description) VALUES ($1, $2, $3, $4)",
                )
                .bind(id)
                .bind(&r.key)
                .bind(&r.name)
                .bind(&r.description)
                .execute(&mut **tx)
                .await?;
            }
            EntityRecord::Chapter(r) => {
                sqlx::query(
                    "INSERT INTO chapters (id, business_key, name, description) VALUES ($1, $2, $3, $4)",
                )
                .bind(id)
                .bind(&r.key)
                .bind(&r.name)
                .bind(&r.description)
                .execute(&mut **tx)
                .await?;
            }
            EntityRecord::ProgramChapter(r) => {
                sqlx::query(
                    "INSERT INTO program_chapters (id, program_id, chapter_id, sequence) VALUES ($1, $2, $3, $4)",
                )
                .bind(id)
                .bind(r.program_id)
                .bind(r.chapter_id)
                .bind(r.sequence)
                .execute(&mut **tx)
                .await?;
            }
            EntityRecord::ProductTemplate(r) => {
                sqlx::query(
                    r#"
                    INSERT INTO product_templates (
                        id, business_key, name, description, program_id, program_chapter_id
                    )
                    VALUES ($1, $2, $3, $4, $5, $6)
                    "#,
                )
                .bind(id)
                .bind(&r.key)
                .bind(&r.name)
                .bind(&r.description)
                .bind(r.program_id)
                .bind(r.program_chapter_id)
                .execute(&mut **tx)
                .await?;
            }
        }
        Ok(())
    }
}

/// Report reason for a rejected insert
fn rejection_reason(err: &sqlx::Error) -> String {
    match err.as_database_error() {
        Some(db) => match db.constraint() {
            Some(constraint) => format!("{} ({})", db.message(), constraint),
            None => db.message().to_string(),
        },
        None => err.to_string(),
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn insert_bulk(
        &self,
        entity: EntityType,
        records: &[EntityRecord],
    ) -> Result<Vec<InsertOutcome>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut outcomes = Vec::with_capacity(records.len());

        for record in records {
            if record.entity_type() != entity {
                outcomes.push(InsertOutcome::Rejected(format!(
                    "record of type {} submitted as {}",
                    record.entity_type(),
                    entity
                )));
                continue;
            }

            sqlx::query("SAVEPOINT record_savepoint")
                .execute(&mut *tx)
                .await?;

            let id = Uuid::new_v4();
            match Self::insert_one(&mut tx, id, record).await {
                Ok(()) => {
                    sqlx::query("RELEASE SAVEPOINT record_savepoint")
                        .execute(&mut *tx)
                        .await?;
                    outcomes.push(InsertOutcome::Inserted(id));
                }
                Err(e) => {
                    if let Err(rollback_err) = sqlx::query("ROLLBACK TO SAVEPOINT record_savepoint")
                        .execute(&mut *tx)
                        .await
                    {
                        error!(
                            error = %rollback_err,
                            "Failed to rollback savepoint, aborting bulk insert"
                        );
                        return Err(rollback_err.into());
                    }

                    debug!(
                        entity = %entity,
                        business_key = %record.business_key(),
                        error = %e,
                        "Record rejected (isolated with savepoint)"
                    );
                    outcomes.push(InsertOutcome::Rejected(rejection_reason(&e)));
                }
            }
        }

        tx.commit().await?;

        Ok(outcomes)
    }
}
