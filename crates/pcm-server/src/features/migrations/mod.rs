pub mod commands;
pub mod queries;
pub mod routes;

pub use commands::{StartMigrationCommand, StartMigrationError, StartMigrationResponse};

pub use queries::{GetMigrationStatusError, GetMigrationStatusQuery};

pub use routes::migrations_routes;
