use crate::error::AppError;
use crate::migration::FileStore;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use super::{
    commands::{UploadFileCommand, UploadFileError},
    queries::{DownloadFileError, DownloadFileQuery},
};

/// Default name for uploads without a filename
const DEFAULT_UPLOAD_NAME: &str = "upload.csv";

pub fn files_routes() -> Router<Arc<dyn FileStore>> {
    Router::new()
        .route("/files", post(upload_file))
        .route("/files/*file_id", get(download_file))
}

#[tracing::instrument(skip(files, multipart))]
async fn upload_file(
    State(files): State<Arc<dyn FileStore>>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut command: Option<UploadFileCommand> = None;
    let mut expected_checksum: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read multipart field: {}", e)))?
    {
        match field.name() {
            Some("file") => {}
            Some("checksum") => {
                let value = field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read checksum field: {}", e))
                })?;
                expected_checksum = Some(value);
                continue;
            }
            _ => continue,
        }

        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read file bytes: {}", e)))?;

        command = Some(UploadFileCommand {
            filename,
            content: data.to_vec(),
            expected_checksum: None,
        });
    }

    let mut command = command.ok_or_else(|| {
        AppError::BadRequest("No file field found in multipart data".to_string())
    })?;
    command.expected_checksum = expected_checksum;

    let response = super::commands::upload::handle(files, command).await?;

    tracing::info!(
        file_id = %response.file_id,
        size = response.size,
        checksum = %response.checksum,
        "File uploaded via API"
    );

    Ok((StatusCode::CREATED, Json(json!(response))).into_response())
}

#[tracing::instrument(skip(files))]
async fn download_file(
    State(files): State<Arc<dyn FileStore>>,
    Path(file_id): Path<String>,
) -> Result<Response, AppError> {
    let response = super::queries::download::handle(files, DownloadFileQuery { file_id }).await?;

    Ok((StatusCode::OK, Json(json!(response))).into_response())
}

impl From<UploadFileError> for AppError {
    fn from(err: UploadFileError) -> Self {
        match err {
            UploadFileError::Storage(e) => AppError::Store(e),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl From<DownloadFileError> for AppError {
    fn from(err: DownloadFileError) -> Self {
        match err {
            DownloadFileError::Storage(e) => AppError::Store(e),
            other => AppError::Validation(other.to_string()),
        }
    }
}
