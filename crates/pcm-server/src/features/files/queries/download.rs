use crate::migration::{FileStore, StoreError};
use mediator::Request;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadFileQuery {
    pub file_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadFileResponse {
    pub file_id: String,
    pub url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadFileError {
    #[error("File id is required and cannot be empty")]
    FileIdRequired,
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl Request<Result<DownloadFileResponse, DownloadFileError>> for DownloadFileQuery {}

impl DownloadFileQuery {
    pub fn validate(&self) -> Result<(), DownloadFileError> {
        if self.file_id.trim().is_empty() {
            return Err(DownloadFileError::FileIdRequired);
        }
        Ok(())
    }
}

#[tracing::instrument(skip(files))]
pub async fn handle(
    files: Arc<dyn FileStore>,
    query: DownloadFileQuery,
) -> Result<DownloadFileResponse, DownloadFileError> {
    query.validate()?;

    let url = files.download_url(&query.file_id).await?;

    Ok(DownloadFileResponse {
        file_id: query.file_id,
        url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::memory::InMemoryFileStore;

    #[test]
    fn test_validation_empty_file_id() {
        let query = DownloadFileQuery {
            file_id: "".to_string(),
        };
        assert!(matches!(query.validate(), Err(DownloadFileError::FileIdRequired)));
    }

    #[tokio::test]
    async fn test_handle_missing_file() {
        let store: Arc<dyn FileStore> = Arc::new(InMemoryFileStore::new());
        let result = handle(
            store,
            DownloadFileQuery {
                file_id: "error-reports/x/programs-errors.csv".to_string(),
            },
        )
        .await;
        assert!(matches!(
            result,
            Err(DownloadFileError::Storage(StoreError::FileNotFound(_)))
        ));
    }
}
