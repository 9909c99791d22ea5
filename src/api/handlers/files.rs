use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::registry_error;
use crate::api::response::ApiError;
use crate::storage::{FileId, FileRecord};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub file_id: String,
    pub filename: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileResponse {
    pub byte_size: u64,
    pub created_at: String,
    pub filename: String,
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileListResponse {
    pub files: Vec<FileResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let mut upload: Option<(String, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&state, e, "Invalid multipart data"))?
    {
        if field.name() != Some("file") {
            // Ignore unknown fields
            continue;
        }

        let file_name = field.file_name().unwrap_or("").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error(&state, e, "Failed to read file"))?;

        if data.len() > state.config.max_upload_size {
            return Err(too_large(&state));
        }

        upload = Some((file_name, data));
        break;
    }

    let (file_name, data) = upload.ok_or_else(|| ApiError::bad_request("No file part"))?;

    let file = state
        .registry
        .upload(&file_name, data)
        .await
        .map_err(registry_error)?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            file_id: file.id.to_string(),
            filename: file.filename,
            message: "File uploaded successfully".to_string(),
        }),
    ))
}

pub async fn list_files(
    State(state): State<Arc<AppState>>,
) -> Result<Json<FileListResponse>, ApiError> {
    let files = state.registry.list().await.map_err(registry_error)?;

    Ok(Json(FileListResponse {
        files: files.iter().map(file_to_response).collect(),
    }))
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    // Ids that cannot exist are reported like any other unknown id
    let id: FileId = id
        .parse()
        .map_err(|_| ApiError::not_found("File not found"))?;

    if !state.registry.delete(id).await.map_err(registry_error)? {
        return Err(ApiError::not_found("File not found"));
    }

    Ok(Json(MessageResponse {
        message: "File deleted successfully".to_string(),
    }))
}

// ============================================================================
// Helpers
// ============================================================================

fn file_to_response(file: &FileRecord) -> FileResponse {
    FileResponse {
        byte_size: file.byte_size,
        created_at: file.created_at.to_rfc3339(),
        filename: file.filename.clone(),
        id: file.id.to_string(),
    }
}

/// The body limit can trip while parsing field headers or while reading
/// content; both surface as a 413.
fn multipart_error(state: &AppState, e: MultipartError, context: &str) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        too_large(state)
    } else {
        ApiError::bad_request(format!("{context}: {e}"))
    }
}

fn too_large(state: &AppState) -> ApiError {
    ApiError::payload_too_large(format!(
        "File exceeds maximum upload size of {} bytes",
        state.config.max_upload_size
    ))
}
