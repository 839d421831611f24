use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::files::catalog::FileCatalog;
use crate::features::files::models::{CatalogPage, CatalogStats, FileRecord};
use crate::shared::types::PageRequest;
use crate::shared::validation::escape_like_pattern;

const FILE_COLUMNS: &str = "id, custom_name, original_name, storage_name, storage_path, \
                            size_bytes, mime_type, uploaded_at, updated_at";

// $1 is NULL when no search term is given
const SEARCH_FILTER: &str = r"($1::text IS NULL
    OR custom_name ILIKE $1 ESCAPE '\'
    OR original_name ILIKE $1 ESCAPE '\')";

/// PostgreSQL-backed catalog over the `pdf_files` table
pub struct PgFileCatalog {
    pool: PgPool,
}

impl PgFileCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("File {} not found", id))
}

#[async_trait]
impl FileCatalog for PgFileCatalog {
    async fn insert(&self, record: FileRecord) -> Result<FileRecord> {
        let sql = format!(
            r#"
            INSERT INTO pdf_files ({FILE_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {FILE_COLUMNS}
            "#
        );

        let inserted = sqlx::query_as::<_, FileRecord>(&sql)
            .bind(record.id)
            .bind(&record.custom_name)
            .bind(&record.original_name)
            .bind(&record.storage_name)
            .bind(&record.storage_path)
            .bind(record.size_bytes)
            .bind(&record.mime_type)
            .bind(record.uploaded_at)
            .bind(record.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    AppError::Conflict(format!("File record {} already exists", record.id))
                }
                e => AppError::Database(e),
            })?;

        info!(
            "File record saved: id={}, storage_name={}, size={}",
            inserted.id, inserted.storage_name, inserted.size_bytes
        );

        Ok(inserted)
    }

    async fn list_page(&self, search: Option<&str>, page: PageRequest) -> Result<CatalogPage> {
        let pattern = search.map(|s| format!("%{}%", escape_like_pattern(s)));

        // Count and page come from one snapshot so concurrent uploads cannot
        // make `total` disagree with the returned rows
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM pdf_files WHERE {SEARCH_FILTER}"
        ))
        .bind(pattern.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        let records = sqlx::query_as::<_, FileRecord>(&format!(
            r#"
            SELECT {FILE_COLUMNS}
            FROM pdf_files
            WHERE {SEARCH_FILTER}
            ORDER BY uploaded_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(pattern.as_deref())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            "Listed {} of {} file records (page={}, limit={}, search={:?})",
            records.len(),
            total,
            page.page(),
            page.limit(),
            search
        );

        Ok(CatalogPage { records, total })
    }

    async fn get_by_id(&self, id: Uuid) -> Result<FileRecord> {
        sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM pdf_files WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(id))
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<FileRecord> {
        let deleted = sqlx::query_as::<_, FileRecord>(&format!(
            "DELETE FROM pdf_files WHERE id = $1 RETURNING {FILE_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(id))?;

        info!(
            "File record deleted: id={}, storage_name={}",
            deleted.id, deleted.storage_name
        );

        Ok(deleted)
    }

    async fn aggregate_stats(&self, recent_since: DateTime<Utc>) -> Result<CatalogStats> {
        let (total_files, total_size_bytes, recent_files): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(size_bytes), 0)::BIGINT,
                COUNT(*) FILTER (WHERE uploaded_at >= $1)
            FROM pdf_files
            "#,
        )
        .bind(recent_since)
        .fetch_one(&self.pool)
        .await?;

        Ok(CatalogStats {
            total_files,
            total_size_bytes,
            recent_files,
        })
    }
}
