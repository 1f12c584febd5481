//! Object storage settings

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;

/// Default bucket for uploads and error reports
pub const DEFAULT_BUCKET: &str = "pcm-migrations";

/// Default lifetime of presigned download URLs in seconds
pub const DEFAULT_PRESIGN_EXPIRY_SECS: u64 = 3600;

#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub path_style: bool,
    pub presign_expiry_secs: u64,
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("path_style", &self.path_style)
            .field("presign_expiry_secs", &self.presign_expiry_secs)
            .finish()
    }
}

/// First non-empty variable among `keys`
fn first_var(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| env::var(key).ok())
        .find(|value| !value.trim().is_empty())
}

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    first_var(&[key]).and_then(|value| value.trim().parse().ok())
}

impl StorageConfig {
    /// Read `S3_*` variables, falling back to the standard `AWS_*` names for
    /// region and credentials
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self {
            endpoint: first_var(&["S3_ENDPOINT"]),
            region: first_var(&["S3_REGION", "AWS_REGION"]).unwrap_or_else(|| "us-east-1".into()),
            bucket: first_var(&["S3_BUCKET"]).unwrap_or_else(|| DEFAULT_BUCKET.into()),
            access_key: first_var(&["S3_ACCESS_KEY", "AWS_ACCESS_KEY_ID"])
                .unwrap_or_else(|| "minioadmin".into()),
            secret_key: first_var(&["S3_SECRET_KEY", "AWS_SECRET_ACCESS_KEY"])
                .unwrap_or_else(|| "minioadmin".into()),
            path_style: parsed("S3_PATH_STYLE").unwrap_or(false),
            presign_expiry_secs: parsed("S3_PRESIGN_EXPIRY").unwrap_or(DEFAULT_PRESIGN_EXPIRY_SECS),
        };

        if config.presign_expiry_secs == 0 {
            anyhow::bail!("S3_PRESIGN_EXPIRY must be at least one second");
        }

        Ok(config)
    }

    pub fn for_minio(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            region: "us-east-1".to_string(),
            bucket: bucket.into(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            path_style: true,
            presign_expiry_secs: DEFAULT_PRESIGN_EXPIRY_SECS,
        }
    }
}
