//! CSV migration pipeline
//!
//! Four related CSV files (Programs, Chapters, Program-Chapters and Product
//! Templates) are tokenized, then loaded in dependency order. Junction and
//! template rows reference their parents by business key; the keys are
//! resolved to generated ids as parents are inserted.
//!
//! # Components
//!
//! - [`csv`]: tokenizer producing [`csv::ParsedRow`]s
//! - [`records`]: typed records built from rows
//! - [`key_resolver`]: business key to id mapping
//! - [`loader`]: chunked bulk writes with per-row failure isolation
//! - [`orchestrator`]: job state machine and run sequencing
//! - [`store`]: collaborator traits, implemented in [`postgres`] and [`memory`]

pub mod csv;
pub mod error;
pub mod key_resolver;
pub mod loader;
pub mod memory;
pub mod orchestrator;
pub mod postgres;
pub mod records;
pub mod report;
pub mod store;
pub mod types;

pub use error::{MigrationError, RowFailure, StoreError};
pub use orchestrator::{MigrationOrchestrator, MigrationSummary, RunOutcome};
pub use store::{FileStore, InsertOutcome, JobStore, RecordStore};
pub use types::{
    BatchConfig, DatasetKind, EntityType, JobStatus, JobStatusView, MigrationFiles, MigrationJob,
};
