use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::files::catalog::FileCatalog;
use crate::features::files::dtos::{StatsDto, UploadedFileDto};
use crate::modules::storage::{BlobStore, BlobStream, RemoveOutcome};
use crate::shared::constants::RECENT_UPLOAD_WINDOW_DAYS;
use crate::shared::format::format_file_size;
use crate::shared::types::{PageRequest, PaginationMeta};

/// A blob ready to be streamed to the client
pub struct FileDownload {
    /// Name offered in `Content-Disposition`
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub stream: BlobStream,
}

/// Read-side views over the catalog, plus download and delete
pub struct FileQueryService {
    catalog: Arc<dyn FileCatalog>,
    blob_store: Arc<dyn BlobStore>,
}

impl FileQueryService {
    pub fn new(catalog: Arc<dyn FileCatalog>, blob_store: Arc<dyn BlobStore>) -> Self {
        Self {
            catalog,
            blob_store,
        }
    }

    /// List files newest first, optionally filtered by a search term
    pub async fn list_files(
        &self,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<(Vec<UploadedFileDto>, PaginationMeta)> {
        let result = self.catalog.list_page(search, page).await?;
        let files = result.records.iter().map(UploadedFileDto::from).collect();

        Ok((files, PaginationMeta::new(page, result.total)))
    }

    pub async fn get_file(&self, id: Uuid) -> Result<UploadedFileDto> {
        let record = self.catalog.get_by_id(id).await?;
        Ok(UploadedFileDto::from(&record))
    }

    pub async fn stats(&self) -> Result<StatsDto> {
        let since = Utc::now() - Duration::days(RECENT_UPLOAD_WINDOW_DAYS);
        let stats = self.catalog.aggregate_stats(since).await?;

        Ok(StatsDto {
            total_files: stats.total_files,
            total_size: format_file_size(stats.total_size_bytes),
            recent_uploads: stats.recent_files,
        })
    }

    /// Open a file for download. A record whose blob is gone is reported as
    /// not found and logged, since the catalog and storage have diverged.
    pub async fn get_download(&self, id: Uuid) -> Result<FileDownload> {
        let record = self.catalog.get_by_id(id).await?;

        let stream = match self.blob_store.open(&record.storage_path).await {
            Ok(stream) => stream,
            Err(AppError::NotFound(_)) => {
                error!(
                    "Blob missing for catalog record {} at {}",
                    record.id, record.storage_path
                );
                return Err(AppError::NotFound("File not found on storage".to_string()));
            }
            Err(e) => return Err(e),
        };

        Ok(FileDownload {
            file_name: record.download_file_name(),
            mime_type: record.mime_type,
            size_bytes: record.size_bytes,
            stream,
        })
    }

    /// Delete a file. The catalog row is authoritative; blob removal is
    /// best-effort and only logged when it fails.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let record = self.catalog.delete_by_id(id).await?;

        match self.blob_store.remove(&record.storage_path).await {
            Ok(RemoveOutcome::Removed) => {}
            Ok(RemoveOutcome::NotFound) => {
                warn!(
                    "Blob for deleted file {} was already missing: {}",
                    record.id, record.storage_path
                );
            }
            Err(e) => {
                warn!(
                    "Failed to remove blob for deleted file {} at {}: {}",
                    record.id, record.storage_path, e
                );
            }
        }

        info!("File deleted: id={}, name={}", record.id, record.custom_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::files::models::FileRecord;
    use crate::shared::test_helpers::{pdf_bytes, upload_item, TestFixture};
    use bytes::Bytes;
    use futures::TryStreamExt;

    fn record_at(name: &str, days_ago: i64, size_bytes: i64) -> FileRecord {
        let at = Utc::now() - Duration::days(days_ago);
        FileRecord {
            id: Uuid::new_v4(),
            custom_name: name.to_string(),
            original_name: format!("{}.pdf", name.to_lowercase()),
            storage_name: format!("{}-{}", at.timestamp_millis(), Uuid::new_v4().simple()),
            storage_path: format!("uploads/{}", name),
            size_bytes,
            mime_type: "application/pdf".to_string(),
            uploaded_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn test_search_matches_either_name_case_insensitively() {
        let fx = TestFixture::new().await;
        fx.upload_service
            .upload_batch(vec![
                upload_item("report.pdf", Some("Q1-Report")),
                upload_item("invoice.pdf", Some("Invoice March")),
            ])
            .await
            .unwrap();

        for term in ["q1", "REPORT", "report.PDF"] {
            let (files, pagination) = fx
                .query_service
                .list_files(Some(term), PageRequest::default())
                .await
                .unwrap();
            assert_eq!(files.len(), 1, "search {:?}", term);
            assert_eq!(files[0].custom_name, "Q1-Report");
            assert_eq!(pagination.total, 1);
        }

        let (files, pagination) = fx
            .query_service
            .list_files(Some("xyz"), PageRequest::default())
            .await
            .unwrap();
        assert!(files.is_empty());
        assert_eq!(pagination.total, 0);
        assert_eq!(pagination.total_pages, 0);
    }

    #[tokio::test]
    async fn test_pagination_bounds_and_order() {
        let fx = TestFixture::new().await;
        for days_ago in 0..25 {
            fx.catalog
                .insert(record_at(&format!("File{:02}", days_ago), days_ago, 10))
                .await
                .unwrap();
        }

        let (first, pagination) = fx
            .query_service
            .list_files(None, PageRequest::new(Some(1), Some(10)))
            .await
            .unwrap();
        assert_eq!(first.len(), 10);
        assert_eq!(first[0].custom_name, "File00");
        assert_eq!(pagination.total, 25);
        assert_eq!(pagination.total_pages, 3);

        let (last, _) = fx
            .query_service
            .list_files(None, PageRequest::new(Some(3), Some(10)))
            .await
            .unwrap();
        assert_eq!(last.len(), 5);
        assert_eq!(last[4].custom_name, "File24");

        let (beyond, pagination) = fx
            .query_service
            .list_files(None, PageRequest::new(Some(9), Some(10)))
            .await
            .unwrap();
        assert!(beyond.is_empty());
        assert_eq!(pagination.page, 9);
    }

    #[tokio::test]
    async fn test_stats_counts_recent_uploads() {
        let fx = TestFixture::new().await;
        fx.catalog.insert(record_at("Old", 30, 1024)).await.unwrap();
        fx.catalog.insert(record_at("Week", 6, 512)).await.unwrap();
        fx.catalog.insert(record_at("Today", 0, 0)).await.unwrap();

        let stats = fx.query_service.stats().await.unwrap();

        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.total_size, "1.5 KB");
        assert_eq!(stats.recent_uploads, 2);
    }

    #[tokio::test]
    async fn test_stats_on_empty_catalog() {
        let fx = TestFixture::new().await;
        let stats = fx.query_service.stats().await.unwrap();
        assert_eq!(
            stats,
            StatsDto {
                total_files: 0,
                total_size: "0 Bytes".to_string(),
                recent_uploads: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_download_streams_blob_with_custom_name() {
        let fx = TestFixture::new().await;
        let mut item = upload_item("scan.pdf", Some("Signed Contract"));
        item.content = pdf_bytes(2048);
        let files = fx.upload_service.upload_batch(vec![item]).await.unwrap();

        let download = fx.query_service.get_download(files[0].id).await.unwrap();

        assert_eq!(download.file_name, "Signed Contract.pdf");
        assert_eq!(download.size_bytes, 2048);
        let chunks: Vec<Bytes> = download.stream.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), pdf_bytes(2048).to_vec());
    }

    #[tokio::test]
    async fn test_download_with_missing_blob_is_not_found() {
        let fx = TestFixture::new().await;
        let files = fx
            .upload_service
            .upload_batch(vec![upload_item("gone.pdf", None)])
            .await
            .unwrap();
        let record = fx.catalog.get_by_id(files[0].id).await.unwrap();
        fx.blob_store.remove(&record.storage_path).await.unwrap();

        let result = fx.query_service.get_download(files[0].id).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_record_and_blob() {
        let fx = TestFixture::new().await;
        let files = fx
            .upload_service
            .upload_batch(vec![upload_item("a.pdf", None), upload_item("b.pdf", None)])
            .await
            .unwrap();
        let record = fx.catalog.get_by_id(files[0].id).await.unwrap();

        fx.query_service.delete(files[0].id).await.unwrap();

        assert!(!fx.blob_store.exists(&record.storage_path).await.unwrap());
        let (remaining, pagination) = fx
            .query_service
            .list_files(None, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(pagination.total, 1);
        assert_eq!(remaining[0].id, files[1].id);
        assert!(matches!(
            fx.query_service.get_download(files[0].id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_unknown_id_leaves_catalog_unchanged() {
        let fx = TestFixture::new().await;
        fx.upload_service
            .upload_batch(vec![upload_item("keep.pdf", None)])
            .await
            .unwrap();

        let result = fx.query_service.delete(Uuid::new_v4()).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(fx.catalog.len(), 1);
        assert_eq!(fx.blob_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_succeeds_when_blob_already_missing() {
        let fx = TestFixture::new().await;
        let files = fx
            .upload_service
            .upload_batch(vec![upload_item("a.pdf", None)])
            .await
            .unwrap();
        let record = fx.catalog.get_by_id(files[0].id).await.unwrap();
        fx.blob_store.remove(&record.storage_path).await.unwrap();

        fx.query_service.delete(files[0].id).await.unwrap();
        assert_eq!(fx.catalog.len(), 0);
    }
}
