//! S3 compatible object storage
//!
//! Uploaded CSVs and generated error reports are objects in one bucket; the
//! object key doubles as the file id handed to the migration pipeline.

use crate::migration::{FileStore, StoreError};
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    presigning::PresigningConfig,
    primitives::ByteStream,
    Client,
};
use pcm_common::checksum::sha256_hex;
use std::time::Duration;
use tracing::{debug, info, instrument};

pub mod config;

const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
    presign_expiry: Duration,
}

impl Storage {
    pub fn new(config: config::StorageConfig) -> Self {
        debug!(
            endpoint = config.endpoint.as_deref().unwrap_or("aws"),
            region = %config.region,
            bucket = %config.bucket,
            path_style = config.path_style,
            "Initializing storage"
        );

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "pcm-storage",
        );

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());

        info!("Storage client initialized for bucket: {}", config.bucket);

        Self {
            client,
            bucket: config.bucket,
            presign_expiry: Duration::from_secs(config.presign_expiry_secs),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    #[instrument(skip(self, data))]
    pub async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<UploadResult, StoreError> {
        let checksum = sha256_hex(&data);
        let size = data.len() as i64;

        debug!("Uploading {} bytes to s3://{}/{}", size, self.bucket, key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StoreError::Storage(format!("failed to upload {}: {}", key, e)))?;

        info!("Successfully uploaded to s3://{}/{}", self.bucket, key);

        Ok(UploadResult {
            key: key.to_string(),
            checksum,
            size,
        })
    }

    #[instrument(skip(self))]
    pub async fn download(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        debug!("Downloading from s3://{}/{}", self.bucket, key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StoreError::FileNotFound(key.to_string())
                } else {
                    StoreError::Storage(format!("failed to download {}: {}", key, e))
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Storage(format!("failed to read {}: {}", key, e)))?
            .into_bytes()
            .to_vec();

        debug!("Downloaded {} bytes from s3://{}/{}", data.len(), self.bucket, key);

        Ok(data)
    }

    #[instrument(skip(self))]
    pub async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(StoreError::Storage(format!(
                "failed to check existence of {}: {}",
                key, e
            ))),
        }
    }

    #[instrument(skip(self))]
    pub async fn generate_presigned_url(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StoreError> {
        let presigning_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StoreError::Storage(format!("invalid presign expiry: {}", e)))?;

        let presigned_request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| StoreError::Storage(format!("failed to presign {}: {}", key, e)))?;

        Ok(presigned_request.uri().to_string())
    }
}

#[async_trait]
impl FileStore for Storage {
    async fn read_bytes(&self, file_id: &str) -> Result<Vec<u8>, StoreError> {
        self.download(file_id).await
    }

    async fn write_csv(&self, name: &str, content: Vec<u8>) -> Result<String, StoreError> {
        let result = self.upload(name, content, CSV_CONTENT_TYPE).await?;
        Ok(result.key)
    }

    async fn download_url(&self, file_id: &str) -> Result<String, StoreError> {
        if !self.exists(file_id).await? {
            return Err(StoreError::FileNotFound(file_id.to_string()));
        }
        self.generate_presigned_url(file_id, self.presign_expiry)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct UploadResult {
    pub key: String,
    pub checksum: String,
    pub size: i64,
}
