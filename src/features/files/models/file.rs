use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Catalog row describing one stored PDF
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct FileRecord {
    pub id: Uuid,
    pub custom_name: String,
    pub original_name: String,
    pub storage_name: String,
    pub storage_path: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    /// File name offered to clients on download
    pub fn download_file_name(&self) -> String {
        format!("{}.pdf", self.custom_name)
    }
}

/// One page of catalog records plus the total number of matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogPage {
    pub records: Vec<FileRecord>,
    pub total: i64,
}

/// Aggregate counters over the whole catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogStats {
    pub total_files: i64,
    pub total_size_bytes: i64,
    pub recent_files: i64,
}
