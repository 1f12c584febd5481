//! Server settings read from the environment

use crate::migration::types::{
    BatchConfig, DEFAULT_BATCH_SIZE, DEFAULT_ERROR_MESSAGE_MAX_LEN, MAX_BATCH_SIZE,
    MAX_ERROR_MESSAGE_LEN,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";
pub const DEFAULT_SERVER_PORT: u16 = 8000;
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/pcm";
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Origin of the admin UI in local development
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub migration: MigrationConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Migration pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Rows per bulk write, at most 200
    pub batch_size: usize,
    /// Characters kept of a failed job's error message
    pub error_message_max_len: usize,
}

impl MigrationConfig {
    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            batch_size: self.batch_size,
            error_message_max_len: self.error_message_max_len,
        }
    }
}

/// Parse an environment variable, falling back to `default` when unset or
/// malformed
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Defaults overlaid with `PCM_*`, `DATABASE_*` and `CORS_*` variables
    /// (a `.env` file is read first when present)
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Config::default();

        let server = &mut config.server;
        if let Ok(host) = std::env::var("PCM_HOST") {
            server.host = host;
        }
        server.port = env_or("PCM_PORT", server.port);
        server.shutdown_timeout_secs = env_or("PCM_SHUTDOWN_TIMEOUT", server.shutdown_timeout_secs);

        let database = &mut config.database;
        if let Ok(url) = std::env::var("DATABASE_URL") {
            database.url = url;
        }
        database.max_connections = env_or("DATABASE_MAX_CONNECTIONS", database.max_connections);
        database.min_connections = env_or("DATABASE_MIN_CONNECTIONS", database.min_connections);
        database.connect_timeout_secs =
            env_or("DATABASE_CONNECT_TIMEOUT", database.connect_timeout_secs);
        database.idle_timeout_secs = env_or("DATABASE_IDLE_TIMEOUT", database.idle_timeout_secs);

        if let Ok(origins) = std::env::var("CORS_ALLOWED_ORIGINS") {
            config.cors.allowed_origins = origins
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect();
        }
        config.cors.allow_credentials =
            env_or("CORS_ALLOW_CREDENTIALS", config.cors.allow_credentials);

        let migration = &mut config.migration;
        migration.batch_size = env_or("PCM_MIGRATION_BATCH_SIZE", migration.batch_size);
        migration.error_message_max_len =
            env_or("PCM_ERROR_MESSAGE_MAX_LEN", migration.error_message_max_len);

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("PCM_PORT must be a non-zero port");
        }
        if self.database.url.trim().is_empty() {
            anyhow::bail!("DATABASE_URL is empty");
        }
        if self.database.max_connections == 0 {
            anyhow::bail!("DATABASE_MAX_CONNECTIONS must be at least 1");
        }
        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "DATABASE_MIN_CONNECTIONS ({}) exceeds DATABASE_MAX_CONNECTIONS ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.migration.batch_size == 0 || self.migration.batch_size > MAX_BATCH_SIZE {
            anyhow::bail!(
                "Migration batch size must be between 1 and {} (got {})",
                MAX_BATCH_SIZE,
                self.migration.batch_size
            );
        }

        if self.migration.error_message_max_len == 0
            || self.migration.error_message_max_len > MAX_ERROR_MESSAGE_LEN
        {
            anyhow::bail!(
                "PCM_ERROR_MESSAGE_MAX_LEN must be between 1 and {} (got {})",
                MAX_ERROR_MESSAGE_LEN,
                self.migration.error_message_max_len
            );
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; any origin will be accepted");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: true,
            },
            migration: MigrationConfig {
                batch_size: DEFAULT_BATCH_SIZE,
                error_message_max_len: DEFAULT_ERROR_MESSAGE_MAX_LEN,
            },
        }
    }
}
