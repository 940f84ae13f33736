//! File routes
//!
//! Multipart upload, download and housekeeping over the local upload directory.

use axum::{
    body::Body,
    extract::{
        multipart::{Field, MultipartError},
        Multipart, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{paginate, ApiPath, ApiResponse, Created, Pagination};
use crate::app::AppState;
use crate::error::ApiError;
use crate::services::storage::{FileStorage, StorageError, StoredFile};

#[derive(Debug, Serialize)]
pub struct FailedUpload {
    pub filename: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct BatchUploadResult {
    pub uploaded_files: Vec<StoredFile>,
    pub failed_files: Vec<FailedUpload>,
    pub total_uploaded: usize,
    pub total_failed: usize,
}

#[derive(Debug, Serialize)]
pub struct DeletedFile {
    pub file_id: Uuid,
    pub deleted: bool,
}

/// One file part read from a multipart body
struct FilePart {
    filename: String,
    content_type: Option<String>,
    data: Result<Vec<u8>, StorageError>,
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::bad_request(format!("Invalid multipart body: {}", err.body_text()))
    }
}

/// Buffer a file field, giving up on the contents (but still draining the
/// field) once it passes the size limit.
async fn read_part(mut field: Field<'_>, storage: &FileStorage) -> Result<FilePart, ApiError> {
    let filename = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().map(str::to_string);

    let mut data = Ok(Vec::new());
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if let Ok(buf) = &mut data {
            buf.extend_from_slice(&chunk);
            if let Err(e) = storage.check_size(buf.len()) {
                data = Err(e);
            }
        }
    }

    Ok(FilePart {
        filename,
        content_type,
        data,
    })
}

async fn store_part(storage: &FileStorage, part: FilePart) -> Result<StoredFile, StorageError> {
    // Name and type are checked before size so the cheaper error wins
    FileStorage::check_name(&part.filename)?;
    let data = part.data?;
    storage.save(&part.filename, part.content_type, &data).await
}

/// POST /api/v1/files/upload
///
/// Multipart field `file`.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut part = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("file") && part.is_none() {
            part = Some(read_part(field, &state.storage).await?);
        }
    }

    let part = part.ok_or_else(|| ApiError::bad_request("No file provided in field 'file'"))?;
    let stored = store_part(&state.storage, part).await?;

    Ok(Created(ApiResponse::success(
        stored,
        "File uploaded successfully",
    )))
}

/// POST /api/v1/files/upload/multiple
///
/// Multipart fields `files`. A file that fails validation is reported in
/// `failed_files` and does not abort the batch.
pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let max_files = state.settings.uploads.max_files_per_request;
    let mut parts = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("files") {
            continue;
        }
        if parts.len() == max_files {
            return Err(ApiError::bad_request(format!(
                "At most {} files can be uploaded at once",
                max_files
            )));
        }
        parts.push(read_part(field, &state.storage).await?);
    }

    if parts.is_empty() {
        return Err(ApiError::bad_request("No files provided in field 'files'"));
    }

    let mut uploaded_files = Vec::with_capacity(parts.len());
    let mut failed_files = Vec::new();

    for part in parts {
        let filename = part.filename.clone();
        match store_part(&state.storage, part).await {
            Ok(stored) => uploaded_files.push(stored),
            // I/O failures abort the whole batch
            Err(StorageError::Io(e)) => return Err(StorageError::Io(e).into()),
            Err(e) => {
                tracing::warn!(filename = %filename, error = %e, "File rejected in batch upload");
                failed_files.push(FailedUpload {
                    filename,
                    error: e.to_string(),
                });
            }
        }
    }

    let message = format!(
        "Batch upload finished: {} succeeded, {} failed",
        uploaded_files.len(),
        failed_files.len()
    );

    Ok(ApiResponse::success(
        BatchUploadResult {
            total_uploaded: uploaded_files.len(),
            total_failed: failed_files.len(),
            uploaded_files,
            failed_files,
        },
        message,
    ))
}

/// GET /api/v1/files/download/:file_id
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    ApiPath(file_id): ApiPath<Uuid>,
) -> Result<Response, ApiError> {
    let (filename, data) = state.storage.read(file_id).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .header(header::CONTENT_LENGTH, data.len())
        .body(Body::from(data))
        .map_err(|e| ApiError::internal(format!("Response build failed: {}", e)))
}

/// DELETE /api/v1/files/delete/:file_id
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    ApiPath(file_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.storage.delete(file_id).await?;

    Ok(ApiResponse::success(
        DeletedFile {
            file_id,
            deleted: true,
        },
        "File deleted successfully",
    ))
}

/// GET /api/v1/files/list
///
/// Stored files, newest first.
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Pagination(params): Pagination,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state.storage.list().await?;
    let page = paginate(&entries, params)
        .await
        .unwrap_or_else(|never| match never {});

    Ok(ApiResponse::success(page, "Files retrieved successfully"))
}

/// GET /api/v1/files/info/:file_id
pub async fn file_info(
    State(state): State<Arc<AppState>>,
    ApiPath(file_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state.storage.info(file_id).await?;
    Ok(ApiResponse::success(entry, "File info retrieved successfully"))
}

/// GET /api/v1/files/stats
pub async fn upload_stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.storage.stats().await?;
    Ok(ApiResponse::success(stats, "Upload statistics retrieved successfully"))
}
