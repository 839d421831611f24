use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::Response,
    Json,
};
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::core::error::AppError;
use crate::core::extractor::ValidatedQuery;
use crate::features::files::dtos::{
    allowed_mime_type, parse_custom_names, FileDetailResponseDto, FileListResponseDto,
    ListFilesQuery, StatsResponseDto, UploadFilesDto, UploadResponseDto, CUSTOM_NAMES_FIELD,
    FILES_FIELD,
};
use crate::features::files::services::{FileQueryService, UploadItem, UploadService};
use crate::shared::types::{ErrorResponse, MessageResponse, PageRequest};

/// State for file handlers
#[derive(Clone)]
pub struct FilesState {
    pub upload_service: Arc<UploadService>,
    pub query_service: Arc<FileQueryService>,
}

/// Unknown and malformed ids are both "not found" to the client
fn parse_file_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("File not found".to_string()))
}

/// `Content-Disposition` with an ASCII fallback and an RFC 5987 UTF-8 name
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(file_name)
    )
}

/// Upload PDF files
///
/// Accepts multipart/form-data with:
/// - `pdfFiles`: one or more PDF files (required)
/// - `customNames`: JSON array of display names, positional with the files (optional)
#[utoipa::path(
    post,
    path = "/api/upload",
    tag = "files",
    request_body(
        content = UploadFilesDto,
        content_type = "multipart/form-data",
        description = "PDF files with optional custom display names"
    ),
    responses(
        (status = 201, description = "Files uploaded successfully", body = UploadResponseDto),
        (status = 400, description = "Invalid file, too many files or malformed customNames", body = ErrorResponse),
        (status = 500, description = "Storage or database failure", body = ErrorResponse)
    )
)]
pub async fn upload_files(
    State(state): State<FilesState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponseDto>), AppError> {
    let limits = state.upload_service.limits();
    let mut files: Vec<(Bytes, Option<String>, String)> = Vec::new();
    let mut custom_names: Vec<String> = Vec::new();

    // Every part is checked before the pipeline runs, so a bad part means
    // nothing from this request is stored
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        debug!("Failed to read multipart field: {}", e);
        AppError::BadRequest(format!("Failed to read multipart data: {}", e))
    })? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            FILES_FIELD => {
                if files.len() >= limits.max_files_per_upload {
                    return Err(AppError::Validation(format!(
                        "Too many files. Maximum is {} files per upload",
                        limits.max_files_per_upload
                    )));
                }

                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let file_name = field.file_name().map(|s| s.to_string());

                let Some(mime_type) = allowed_mime_type(&content_type) else {
                    return Err(AppError::Validation(format!(
                        "File type '{}' is not allowed. Only PDF files are accepted",
                        content_type
                    )));
                };

                let data = field.bytes().await.map_err(|e| {
                    debug!("Failed to read file bytes: {}", e);
                    AppError::BadRequest(format!("Failed to read file data: {}", e))
                })?;

                if data.len() > limits.max_file_size {
                    return Err(AppError::Validation(format!(
                        "File too large. Maximum size is {} bytes ({} MB)",
                        limits.max_file_size,
                        limits.max_file_size / 1024 / 1024
                    )));
                }

                files.push((data, file_name, mime_type.to_string()));
            }
            CUSTOM_NAMES_FIELD => {
                let text = field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read customNames field: {}", e))
                })?;
                custom_names = parse_custom_names(&text)?;
            }
            _ => {
                debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    // Pair files with their names here; extra names are ignored
    let mut names = custom_names.into_iter();
    let items: Vec<UploadItem> = files
        .into_iter()
        .map(|(content, declared_name, mime_type)| UploadItem {
            content,
            declared_name,
            mime_type,
            custom_name: names.next(),
        })
        .collect();

    let uploaded = state.upload_service.upload_batch(items).await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponseDto {
            success: true,
            message: format!("{} file(s) uploaded successfully", uploaded.len()),
            files: uploaded,
        }),
    ))
}

/// List files (paginated, searchable)
#[utoipa::path(
    get,
    path = "/api/files",
    tag = "files",
    params(ListFilesQuery),
    responses(
        (status = 200, description = "Page of files, newest first", body = FileListResponseDto),
        (status = 400, description = "Invalid query parameters", body = ErrorResponse)
    )
)]
pub async fn list_files(
    State(state): State<FilesState>,
    ValidatedQuery(query): ValidatedQuery<ListFilesQuery>,
) -> Result<Json<FileListResponseDto>, AppError> {
    let page = PageRequest::new(query.page, query.limit);
    let (files, pagination) = state
        .query_service
        .list_files(query.search_term(), page)
        .await?;

    Ok(Json(FileListResponseDto {
        success: true,
        files,
        pagination,
    }))
}

/// Get a single file's metadata
#[utoipa::path(
    get,
    path = "/api/files/{id}",
    tag = "files",
    params(
        ("id" = String, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "File found", body = FileDetailResponseDto),
        (status = 404, description = "File not found", body = ErrorResponse)
    )
)]
pub async fn get_file(
    State(state): State<FilesState>,
    Path(id): Path<String>,
) -> Result<Json<FileDetailResponseDto>, AppError> {
    let file = state.query_service.get_file(parse_file_id(&id)?).await?;

    Ok(Json(FileDetailResponseDto {
        success: true,
        file,
    }))
}

/// Download a file
///
/// Streams the PDF with `<customName>.pdf` as the attachment file name.
#[utoipa::path(
    get,
    path = "/api/download/{id}",
    tag = "files",
    params(
        ("id" = String, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "PDF content stream"),
        (status = 404, description = "File or its stored content not found", body = ErrorResponse)
    )
)]
pub async fn download_file(
    State(state): State<FilesState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let download = state
        .query_service
        .get_download(parse_file_id(&id)?)
        .await?;

    let disposition = HeaderValue::from_str(&content_disposition(&download.file_name))
        .map_err(|e| AppError::Internal(format!("Invalid Content-Disposition header: {}", e)))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, download.mime_type)
        .header(header::CONTENT_LENGTH, download.size_bytes)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(download.stream))
        .map_err(|e| AppError::Internal(format!("Failed to build download response: {}", e)))
}

/// Delete a file
#[utoipa::path(
    delete,
    path = "/api/files/{id}",
    tag = "files",
    params(
        ("id" = String, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "File deleted", body = MessageResponse),
        (status = 404, description = "File not found", body = ErrorResponse),
        (status = 500, description = "Database failure", body = ErrorResponse)
    )
)]
pub async fn delete_file(
    State(state): State<FilesState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.query_service.delete(parse_file_id(&id)?).await?;

    Ok(Json(MessageResponse::ok("File deleted successfully")))
}

/// Aggregate usage statistics
#[utoipa::path(
    get,
    path = "/api/stats",
    tag = "files",
    responses(
        (status = 200, description = "Usage statistics", body = StatsResponseDto)
    )
)]
pub async fn get_stats(
    State(state): State<FilesState>,
) -> Result<Json<StatsResponseDto>, AppError> {
    let stats = state.query_service.stats().await?;

    Ok(Json(StatsResponseDto {
        success: true,
        stats,
    }))
}
