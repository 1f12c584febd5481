//! PCM Server Library
//!
//! Program catalog migration service: loads Programs, Chapters,
//! Program-Chapter links and Product Templates from four uploaded CSV files
//! into PostgreSQL, and tracks each run as a pollable job.
//!
//! # Architecture
//!
//! - [`migration`]: the pipeline (tokenizer, loader, orchestrator) and its
//!   store traits with PostgreSQL, S3 and in-memory implementations
//! - [`features`]: HTTP commands, queries and routes in CQRS style
//! - [`api`]: router assembly and middleware
//! - [`config`] and [`storage`]: environment configuration and the S3 client
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pcm_server::migration::memory::{InMemoryFileStore, InMemoryJobStore, InMemoryRecordStore};
//! use pcm_server::migration::{BatchConfig, MigrationFiles, MigrationOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let orchestrator = MigrationOrchestrator::new(
//!         Arc::new(InMemoryJobStore::new()),
//!         Arc::new(InMemoryRecordStore::new()),
//!         Arc::new(InMemoryFileStore::new()),
//!         BatchConfig::default(),
//!     );
//!     let job_id = orchestrator
//!         .start_migration(MigrationFiles {
//!             programs_file_id: "programs.csv".into(),
//!             chapters_file_id: "chapters.csv".into(),
//!             program_chapters_file_id: "program_chapters.csv".into(),
//!             product_templates_file_id: "product_templates.csv".into(),
//!         })
//!         .await?;
//!     println!("started {}", job_id);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod features;
pub mod middleware;
pub mod migration;
pub mod storage;

pub use error::AppError;
