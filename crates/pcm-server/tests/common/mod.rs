//! Shared helpers for PCM server integration tests
//!
//! - [`Catalog`]: four CSV files plus in-memory stores wired into an
//!   orchestrator
//! - [`TestPostgres`]: PostgreSQL container with migrations applied, for the
//!   tests marked `#[ignore = "requires Docker"]`

#![allow(dead_code)]

use anyhow::{Context, Result};
use pcm_server::migration::memory::{InMemoryFileStore, InMemoryJobStore, InMemoryRecordStore};
use pcm_server::migration::{BatchConfig, MigrationFiles, MigrationOrchestrator};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::info;

pub const PROGRAMS_FILE: &str = "uploads/test/programs.csv";
pub const CHAPTERS_FILE: &str = "uploads/test/chapters.csv";
pub const PROGRAM_CHAPTERS_FILE: &str = "uploads/test/program_chapters.csv";
pub const PRODUCT_TEMPLATES_FILE: &str = "uploads/test/product_templates.csv";

pub const PROGRAMS_CSV: &str = "key,name,description\nP1,Algebra,Numbers and symbols\nP2,Geometry,\n";
pub const CHAPTERS_CSV: &str = "key,name\nC1,Introduction\nC2,Equations\nC3,Shapes\n";
pub const PROGRAM_CHAPTERS_CSV: &str =
    "programKey,chapterKey,sequence\nP1,C1,1\nP1,C2,2\nP2,C3,1\n";
pub const PRODUCT_TEMPLATES_CSV: &str =
    "key,name,programKey,chapterKey\nT1,Algebra Workbook,P1,C2\nT2,Geometry Kit,P2,\n";

pub fn migration_files() -> MigrationFiles {
    MigrationFiles {
        programs_file_id: PROGRAMS_FILE.to_string(),
        chapters_file_id: CHAPTERS_FILE.to_string(),
        program_chapters_file_id: PROGRAM_CHAPTERS_FILE.to_string(),
        product_templates_file_id: PRODUCT_TEMPLATES_FILE.to_string(),
    }
}

/// The four source files, each replaceable before building the stores
pub struct Catalog {
    pub programs: Vec<u8>,
    pub chapters: Vec<u8>,
    pub program_chapters: Vec<u8>,
    pub product_templates: Vec<u8>,
    pub batch_size: usize,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            programs: PROGRAMS_CSV.as_bytes().to_vec(),
            chapters: CHAPTERS_CSV.as_bytes().to_vec(),
            program_chapters: PROGRAM_CHAPTERS_CSV.as_bytes().to_vec(),
            product_templates: PRODUCT_TEMPLATES_CSV.as_bytes().to_vec(),
            batch_size: 200,
        }
    }
}

/// In-memory stores behind one orchestrator
pub struct Harness {
    pub jobs: Arc<InMemoryJobStore>,
    pub records: Arc<InMemoryRecordStore>,
    pub files: Arc<InMemoryFileStore>,
    pub orchestrator: MigrationOrchestrator,
}

impl Catalog {
    pub fn programs(mut self, csv: impl Into<Vec<u8>>) -> Self {
        self.programs = csv.into();
        self
    }

    pub fn chapters(mut self, csv: impl Into<Vec<u8>>) -> Self {
        self.chapters = csv.into();
        self
    }

    pub fn program_chapters(mut self, csv: impl Into<Vec<u8>>) -> Self {
        self.program_chapters = csv.into();
        self
    }

    pub fn product_templates(mut self, csv: impl Into<Vec<u8>>) -> Self {
        self.product_templates = csv.into();
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn file_store(&self) -> InMemoryFileStore {
        InMemoryFileStore::new()
            .with_file(PROGRAMS_FILE, self.programs.clone())
            .with_file(CHAPTERS_FILE, self.chapters.clone())
            .with_file(PROGRAM_CHAPTERS_FILE, self.program_chapters.clone())
            .with_file(PRODUCT_TEMPLATES_FILE, self.product_templates.clone())
    }

    pub fn harness(self) -> Harness {
        self.harness_with(InMemoryRecordStore::new())
    }

    pub fn harness_with(self, records: InMemoryRecordStore) -> Harness {
        self.harness_with_stores(InMemoryJobStore::new(), records)
    }

    pub fn harness_with_jobs(self, jobs: InMemoryJobStore) -> Harness {
        self.harness_with_stores(jobs, InMemoryRecordStore::new())
    }

    pub fn harness_with_stores(
        self,
        jobs: InMemoryJobStore,
        records: InMemoryRecordStore,
    ) -> Harness {
        let jobs = Arc::new(jobs);
        let records = Arc::new(records);
        let files = Arc::new(self.file_store());
        let orchestrator = MigrationOrchestrator::new(
            jobs.clone(),
            records.clone(),
            files.clone(),
            BatchConfig::new(self.batch_size),
        );
        Harness {
            jobs,
            records,
            files,
            orchestrator,
        }
    }
}

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

/// PostgreSQL container with the workspace migrations applied
pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let connection_string =
            format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            _container: container,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn pool_clone(&self) -> PgPool {
        self.pool.clone()
    }
}

/// Initialize tracing for tests
pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,pcm_server=debug,sqlx=warn,testcontainers=info")
        }))
        .with_test_writer()
        .try_init();
}
