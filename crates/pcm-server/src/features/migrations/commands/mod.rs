pub mod start;

pub use start::{StartMigrationCommand, StartMigrationError, StartMigrationResponse};
