use crate::migration::{FileStore, StoreError};
use mediator::Request;
use pcm_common::checksum::{sha256_hex, verify_sha256};
use pcm_common::PcmError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFileCommand {
    pub filename: String,
    #[serde(skip)]
    pub content: Vec<u8>,
    /// SHA-256 the client computed before sending, checked when present
    #[serde(default)]
    pub expected_checksum: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFileResponse {
    pub file_id: String,
    pub size: i64,
    pub checksum: String,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadFileError {
    #[error("Filename is required and cannot be empty")]
    FilenameRequired,
    #[error("Filename must not exceed 255 characters")]
    FilenameLength,
    #[error("Content is required and cannot be empty")]
    ContentRequired,
    #[error("Upload rejected: {0}")]
    Checksum(#[from] PcmError),
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl Request<Result<UploadFileResponse, UploadFileError>> for UploadFileCommand {}

impl UploadFileCommand {
    pub fn validate(&self) -> Result<(), UploadFileError> {
        if self.filename.trim().is_empty() {
            return Err(UploadFileError::FilenameRequired);
        }
        if self.filename.chars().count() > 255 {
            return Err(UploadFileError::FilenameLength);
        }
        if self.content.is_empty() {
            return Err(UploadFileError::ContentRequired);
        }
        Ok(())
    }

    /// Object name for the upload; path separators in the filename are
    /// replaced so the name stays one segment
    pub fn object_name(&self, upload_id: Uuid) -> String {
        let filename: String = self
            .filename
            .trim()
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();
        format!("uploads/{}/{}", upload_id, filename)
    }
}

#[tracing::instrument(skip(files, command), fields(filename = %command.filename, size = command.content.len()))]
pub async fn handle(
    files: Arc<dyn FileStore>,
    command: UploadFileCommand,
) -> Result<UploadFileResponse, UploadFileError> {
    command.validate()?;
    if let Some(expected) = command.expected_checksum.as_deref() {
        verify_sha256(&command.content, expected)?;
    }

    let name = command.object_name(Uuid::new_v4());
    let checksum = sha256_hex(&command.content);
    let size = command.content.len() as i64;

    let file_id = files.write_csv(&name, command.content).await?;

    Ok(UploadFileResponse {
        file_id,
        size,
        checksum,
    })
}
