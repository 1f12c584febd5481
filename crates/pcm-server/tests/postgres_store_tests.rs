//! PostgreSQL job and record stores
//!
//! Run with: `cargo test --test postgres_store_tests -- --ignored`

mod common;

use common::{init_test_tracing, migration_files, Catalog, TestPostgres};
use pcm_server::migration::postgres::{PgJobStore, PgRecordStore};
use pcm_server::migration::records::{EntityRecord, ProgramRecord};
use pcm_server::migration::{
    BatchConfig, DatasetKind, EntityType, InsertOutcome, JobStatus, JobStore,
    MigrationOrchestrator, RecordStore,
};
use std::sync::Arc;
use uuid::Uuid;

fn program(key: &str, name: &str) -> EntityRecord {
    EntityRecord::Program(ProgramRecord {
        key: key.to_string(),
        name: name.to_string(),
        description: None,
    })
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_job_lifecycle() {
    init_test_tracing();
    let db = TestPostgres::start().await.unwrap();
    let jobs = PgJobStore::new(db.pool_clone());

    let job = jobs.create(migration_files()).await.unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.files, migration_files());

    assert!(jobs
        .transition(job.id, JobStatus::Queued, JobStatus::ParsingCsv)
        .await
        .unwrap());
    // a second claim loses
    assert!(!jobs
        .transition(job.id, JobStatus::Queued, JobStatus::ParsingCsv)
        .await
        .unwrap());

    jobs.record_progress(job.id, DatasetKind::Chapters, 5)
        .await
        .unwrap();
    jobs.record_progress(job.id, DatasetKind::Chapters, 3)
        .await
        .unwrap();
    jobs.set_error_file(job.id, DatasetKind::Chapters, "error-reports/x/chapters-errors.csv")
        .await
        .unwrap();

    let loaded = jobs.load(job.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, JobStatus::ParsingCsv);
    assert!(loaded.started_at.is_some());
    assert_eq!(loaded.progress.chapters.inserted, 5);
    assert_eq!(
        loaded.progress.chapters.error_file_id.as_deref(),
        Some("error-reports/x/chapters-errors.csv")
    );

    assert!(jobs.fail(job.id, "boom").await.unwrap());
    assert!(!jobs.fail(job.id, "again").await.unwrap());

    let failed = jobs.load(job.id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Error);
    assert_eq!(failed.error_message.as_deref(), Some("boom"));
    assert!(failed.completed_at.is_some());

    assert!(jobs.load(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_rejected_record_does_not_abort_the_chunk() {
    init_test_tracing();
    let db = TestPostgres::start().await.unwrap();
    let records = PgRecordStore::new(db.pool_clone());

    let chunk = vec![
        program("P1", "Algebra"),
        program("P2", &"x".repeat(300)),
        program("P3", "Calculus"),
    ];
    let outcomes = records
        .insert_bulk(EntityType::Program, &chunk)
        .await
        .unwrap();

    assert!(outcomes[0].is_inserted());
    assert!(matches!(
        &outcomes[1],
        InsertOutcome::Rejected(reason) if reason.contains("too long")
    ));
    assert!(outcomes[2].is_inserted());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM programs")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_unique_violation_names_the_constraint() {
    let db = TestPostgres::start().await.unwrap();
    let records = PgRecordStore::new(db.pool_clone());

    records
        .insert_bulk(EntityType::Program, &[program("P1", "Algebra")])
        .await
        .unwrap();
    let outcomes = records
        .insert_bulk(EntityType::Program, &[program("P1", "Algebra")])
        .await
        .unwrap();

    match &outcomes[0] {
        InsertOutcome::Rejected(reason) => {
            assert!(reason.contains("programs_business_key_key"), "{}", reason)
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_full_migration_against_postgres() {
    init_test_tracing();
    let db = TestPostgres::start().await.unwrap();
    let jobs = Arc::new(PgJobStore::new(db.pool_clone()));
    let files = Arc::new(Catalog::default().file_store());
    let orchestrator = MigrationOrchestrator::new(
        jobs.clone(),
        Arc::new(PgRecordStore::new(db.pool_clone())),
        files.clone(),
        BatchConfig::new(2),
    );

    let job_id = orchestrator.enqueue(migration_files()).await.unwrap();
    orchestrator.run(job_id).await.unwrap();

    let job = jobs.load(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress.total_inserted(), 10);

    let linked: Option<Uuid> = sqlx::query_scalar(
        r#"
        SELECT pt.program_chapter_id
        FROM product_templates pt
        WHERE pt.business_key = 'T1'
        "#,
    )
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert!(linked.is_some());
}
