use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::features::files::models::FileRecord;
use crate::shared::constants::MAX_NAME_LENGTH;
use crate::shared::format::{format_file_size, format_upload_date};
use crate::shared::types::PaginationMeta;

/// Multipart field carrying the PDF parts
pub const FILES_FIELD: &str = "pdfFiles";

/// Multipart field carrying the JSON array of custom names
pub const CUSTOM_NAMES_FIELD: &str = "customNames";

/// Allowed MIME types for uploads
pub const ALLOWED_MIME_TYPES: &[&str] = &["application/pdf", "application/x-pdf"];

/// Match a part's Content-Type against [`ALLOWED_MIME_TYPES`], returning the
/// canonical entry. Case and parameters such as `; charset=` are ignored.
pub fn allowed_mime_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    ALLOWED_MIME_TYPES
        .iter()
        .copied()
        .find(|allowed| allowed.eq_ignore_ascii_case(essence))
}

/// Parse the `customNames` field: a JSON array of strings, positional
/// with the uploaded files
pub fn parse_custom_names(raw: &str) -> Result<Vec<String>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str::<Vec<String>>(raw).map_err(|e| {
        AppError::Validation(format!(
            "customNames must be a JSON array of strings: {}",
            e
        ))
    })
}

/// Upload form for OpenAPI documentation
/// Note: This struct is for Swagger UI documentation only.
/// The actual handler uses axum's Multipart extractor directly.
#[derive(Debug, Deserialize, ToSchema)]
#[allow(dead_code)]
#[serde(rename_all = "camelCase")]
pub struct UploadFilesDto {
    /// Up to 10 PDF files (application/pdf or application/x-pdf)
    #[schema(format = Binary, content_media_type = "application/pdf")]
    pub pdf_files: Vec<String>,
    /// JSON array of display names, positional with `pdfFiles`
    #[schema(example = r#"["Alpha","Beta"]"#)]
    pub custom_names: Option<String>,
}

/// A catalogued file as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFileDto {
    pub id: Uuid,
    /// Display name chosen at upload
    pub custom_name: String,
    /// File name as sent by the uploader
    pub original_name: String,
    /// Unique storage name of the blob
    pub file_name: String,
    /// Human-readable size, e.g. "1.5 MB"
    pub file_size: String,
    /// Human-readable upload time
    pub upload_date: String,
    pub download_url: String,
}

impl From<&FileRecord> for UploadedFileDto {
    fn from(record: &FileRecord) -> Self {
        Self {
            id: record.id,
            custom_name: record.custom_name.clone(),
            original_name: record.original_name.clone(),
            file_name: record.storage_name.clone(),
            file_size: format_file_size(record.size_bytes),
            upload_date: format_upload_date(record.uploaded_at),
            download_url: format!("/api/download/{}", record.id),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponseDto {
    pub success: bool,
    pub message: String,
    pub files: Vec<UploadedFileDto>,
}

/// Query parameters for listing files
#[derive(Debug, Clone, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListFilesQuery {
    /// Case-insensitive substring matched against custom and original names
    #[validate(length(max = 255, message = "search must be at most 255 characters"))]
    pub search: Option<String>,

    /// Page number (1-indexed, default: 1)
    #[param(minimum = 1)]
    pub page: Option<i64>,

    /// Number of items per page (default: 10, max: 100)
    #[param(minimum = 1, maximum = 100)]
    pub limit: Option<i64>,
}

impl ListFilesQuery {
    /// Search term with blank input treated as absent
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileListResponseDto {
    pub success: bool,
    pub files: Vec<UploadedFileDto>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileDetailResponseDto {
    pub success: bool,
    pub file: UploadedFileDto,
}

/// Aggregate usage statistics
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatsDto {
    pub total_files: i64,
    /// Human-readable sum of all file sizes
    pub total_size: String,
    /// Uploads in the last 7 days
    pub recent_uploads: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatsResponseDto {
    pub success: bool,
    pub stats: StatsDto,
}

/// Validate a custom name supplied by the client: bounded length and no
/// control characters (PostgreSQL text cannot hold NUL)
pub fn validate_custom_name(name: &str) -> Result<()> {
    if name.trim().chars().count() > MAX_NAME_LENGTH {
        return Err(AppError::Validation(format!(
            "Custom names must be at most {} characters",
            MAX_NAME_LENGTH
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(AppError::Validation(
            "Custom names must not contain control characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_allowed_mime_type_returns_canonical_value() {
        assert_eq!(allowed_mime_type("application/pdf"), Some("application/pdf"));
        assert_eq!(allowed_mime_type("application/x-pdf"), Some("application/x-pdf"));
        assert_eq!(
            allowed_mime_type("Application/PDF; charset=binary"),
            Some("application/pdf")
        );
        let long_params = format!("application/pdf; x={}", "a".repeat(150));
        assert_eq!(allowed_mime_type(&long_params), Some("application/pdf"));
        assert_eq!(allowed_mime_type("image/png"), None);
        assert_eq!(allowed_mime_type("application/octet-stream"), None);
        assert_eq!(allowed_mime_type(""), None);
    }

    #[test]
    fn test_parse_custom_names() {
        assert_eq!(
            parse_custom_names(r#"["Alpha","Beta"]"#).unwrap(),
            vec!["Alpha".to_string(), "Beta".to_string()]
        );
        assert!(parse_custom_names("").unwrap().is_empty());
        assert!(matches!(
            parse_custom_names("{not json"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            parse_custom_names(r#"{"a":1}"#),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_uploaded_file_dto_from_record() {
        let id = Uuid::new_v4();
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 15, 4, 5).unwrap();
        let record = FileRecord {
            id,
            custom_name: "Q1-Report".to_string(),
            original_name: "report.pdf".to_string(),
            storage_name: "1-abc-report.pdf".to_string(),
            storage_path: "uploads/1-abc-report.pdf".to_string(),
            size_bytes: 1536,
            mime_type: "application/pdf".to_string(),
            uploaded_at: at,
            updated_at: at,
        };

        let dto = UploadedFileDto::from(&record);
        assert_eq!(dto.file_size, "1.5 KB");
        assert_eq!(dto.upload_date, "1/2/2025, 3:04:05 PM");
        assert_eq!(dto.download_url, format!("/api/download/{}", id));

        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["customName"], "Q1-Report");
        assert_eq!(json["originalName"], "report.pdf");
        assert_eq!(json["fileName"], "1-abc-report.pdf");
    }

    #[test]
    fn test_list_query_search_term() {
        let query = ListFilesQuery {
            search: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(query.search_term(), None);

        let query = ListFilesQuery {
            search: Some(" q1 ".to_string()),
            ..Default::default()
        };
        assert_eq!(query.search_term(), Some("q1"));
    }

    #[test]
    fn test_validate_custom_name_length() {
        assert!(validate_custom_name("Alpha").is_ok());
        assert!(validate_custom_name(&"a".repeat(256)).is_err());
    }

    #[test]
    fn test_validate_custom_name_rejects_control_characters() {
        assert!(matches!(
            validate_custom_name("Al\u{0}pha"),
            Err(AppError::Validation(_))
        ));
        assert!(validate_custom_name("line\nbreak").is_err());
        assert!(validate_custom_name("Отчёт 2024").is_ok());
    }
}
