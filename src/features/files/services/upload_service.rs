use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::config::UploadLimits;
use crate::core::error::{AppError, Result};
use crate::features::files::catalog::FileCatalog;
use crate::features::files::dtos::{validate_custom_name, UploadedFileDto};
use crate::features::files::models::FileRecord;
use crate::modules::storage::{BlobStore, RemoveOutcome};
use crate::shared::validation::{normalize_original_name, resolve_display_name};

/// One file of an upload batch, already paired with its custom name
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub content: Bytes,
    /// File name as declared by the uploader, if any
    pub declared_name: Option<String>,
    pub mime_type: String,
    /// Display name override; blank values fall back to the file name
    pub custom_name: Option<String>,
}

/// Upload pipeline: stores each blob and records it in the catalog
pub struct UploadService {
    catalog: Arc<dyn FileCatalog>,
    blob_store: Arc<dyn BlobStore>,
    limits: UploadLimits,
}

impl UploadService {
    pub fn new(
        catalog: Arc<dyn FileCatalog>,
        blob_store: Arc<dyn BlobStore>,
        limits: UploadLimits,
    ) -> Self {
        Self {
            catalog,
            blob_store,
            limits,
        }
    }

    pub fn limits(&self) -> UploadLimits {
        self.limits
    }

    /// Request-level checks; nothing is written when these fail
    fn validate_batch(&self, items: &[UploadItem]) -> Result<()> {
        if items.is_empty() {
            return Err(AppError::Validation("No files uploaded".to_string()));
        }

        if items.len() > self.limits.max_files_per_upload {
            return Err(AppError::Validation(format!(
                "Too many files. Maximum is {} files per upload",
                self.limits.max_files_per_upload
            )));
        }

        for custom_name in items.iter().filter_map(|i| i.custom_name.as_deref()) {
            validate_custom_name(custom_name)?;
        }

        Ok(())
    }

    /// Upload a batch of files, in order.
    ///
    /// There is no transaction across items: if item `k` fails, items before
    /// it stay committed and the call returns the error. The failing item's
    /// own blob is removed when its catalog insert fails.
    pub async fn upload_batch(&self, items: Vec<UploadItem>) -> Result<Vec<UploadedFileDto>> {
        self.validate_batch(&items)?;

        let batch_size = items.len();
        let mut committed: Vec<FileRecord> = Vec::with_capacity(batch_size);

        for (position, item) in items.into_iter().enumerate() {
            match self.upload_one(item).await {
                Ok(record) => committed.push(record),
                Err(e) => {
                    if !committed.is_empty() {
                        let ids: Vec<String> =
                            committed.iter().map(|r| r.id.to_string()).collect();
                        warn!(
                            "Upload batch failed at item {} of {}; already committed: [{}]",
                            position + 1,
                            batch_size,
                            ids.join(", ")
                        );
                    }
                    return Err(e);
                }
            }
        }

        info!("Upload batch completed: {} files", committed.len());

        Ok(committed.iter().map(UploadedFileDto::from).collect())
    }

    async fn upload_one(&self, item: UploadItem) -> Result<FileRecord> {
        let original_name = normalize_original_name(item.declared_name.as_deref());
        let custom_name = resolve_display_name(item.custom_name.as_deref(), &original_name);
        // Time-ordered, so ids break uploaded_at ties in request order
        let id = Uuid::now_v7();

        let blob = self.blob_store.store(item.content, &original_name).await?;
        debug!(
            "Blob stored for {}: {} ({} bytes)",
            id, blob.storage_path, blob.size_bytes
        );

        let now = Utc::now();
        let record = FileRecord {
            id,
            custom_name,
            original_name,
            storage_name: blob.storage_name,
            storage_path: blob.storage_path.clone(),
            size_bytes: blob.size_bytes,
            mime_type: item.mime_type,
            uploaded_at: now,
            updated_at: now,
        };

        match self.catalog.insert(record).await {
            Ok(record) => Ok(record),
            Err(e) => {
                self.discard_blob(id, &blob.storage_path).await;
                Err(e)
            }
        }
    }

    /// Compensate a failed insert by removing the blob written for it
    async fn discard_blob(&self, id: Uuid, storage_path: &str) {
        match self.blob_store.remove(storage_path).await {
            Ok(RemoveOutcome::Removed) => {
                warn!(
                    "Catalog insert failed for {}; removed blob {}",
                    id, storage_path
                );
            }
            Ok(RemoveOutcome::NotFound) => {
                warn!(
                    "Catalog insert failed for {}; blob {} was already gone",
                    id, storage_path
                );
            }
            Err(e) => {
                error!(
                    "Catalog insert failed for {}; orphan blob left at {}: {}",
                    id, storage_path, e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::files::catalog::FileCatalog;
    use crate::shared::test_helpers::{pdf_bytes, upload_item, TestFixture};
    use crate::shared::types::PageRequest;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_upload_batch_stores_blob_and_record() {
        let fx = TestFixture::new().await;
        let mut item = upload_item("report.pdf", Some("Q1-Report"));
        item.content = pdf_bytes(4096);

        let files = fx.upload_service.upload_batch(vec![item]).await.unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].custom_name, "Q1-Report");
        assert_eq!(files[0].original_name, "report.pdf");
        assert_eq!(files[0].file_size, "4 KB");

        let record = fx.catalog.get_by_id(files[0].id).await.unwrap();
        assert_eq!(record.storage_name, files[0].file_name);
        assert_eq!(record.mime_type, "application/pdf");

        let chunks: Vec<Bytes> = fx
            .blob_store
            .open(&record.storage_path)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks.concat().len() as i64, record.size_bytes);
        assert_eq!(record.size_bytes, 4096);
    }

    #[tokio::test]
    async fn test_display_name_falls_back_to_file_name() {
        let fx = TestFixture::new().await;
        let items = vec![
            upload_item("Annual Report.PDF", None),
            upload_item("notes.pdf", Some("   ")),
        ];

        let files = fx.upload_service.upload_batch(items).await.unwrap();

        assert_eq!(files[0].custom_name, "Annual Report");
        assert_eq!(files[1].custom_name, "notes");
    }

    #[tokio::test]
    async fn test_missing_declared_name_is_defended() {
        let fx = TestFixture::new().await;
        let mut item = upload_item("", None);
        item.declared_name = None;

        let files = fx.upload_service.upload_batch(vec![item]).await.unwrap();

        assert_eq!(files[0].original_name, "document.pdf");
        assert_eq!(files[0].custom_name, "document");
        assert!(files[0].file_name.ends_with("-document.pdf"));
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected() {
        let fx = TestFixture::new().await;
        let result = fx.upload_service.upload_batch(Vec::new()).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_oversized_batch_is_rejected_without_side_effects() {
        let fx = TestFixture::new().await;
        let items: Vec<UploadItem> = (0..11)
            .map(|i| upload_item(&format!("f{}.pdf", i), None))
            .collect();

        let result = fx.upload_service.upload_batch(items).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(fx.catalog.len(), 0);
        assert_eq!(fx.blob_count(), 0);
    }

    #[tokio::test]
    async fn test_overlong_custom_name_is_rejected_before_writing() {
        let fx = TestFixture::new().await;
        let long_name = "x".repeat(300);
        let items = vec![
            upload_item("a.pdf", Some("ok")),
            upload_item("b.pdf", Some(&long_name)),
        ];

        let result = fx.upload_service.upload_batch(items).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(fx.catalog.len(), 0);
        assert_eq!(fx.blob_count(), 0);
    }

    #[tokio::test]
    async fn test_custom_name_with_nul_is_rejected_before_writing() {
        let fx = TestFixture::new().await;
        let items = vec![
            upload_item("a.pdf", Some("Alpha")),
            upload_item("b.pdf", Some("Be\u{0}ta")),
        ];

        let result = fx.upload_service.upload_batch(items).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(fx.catalog.len(), 0);
        assert_eq!(fx.blob_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_insert_keeps_earlier_items_and_removes_its_blob() {
        let fx = TestFixture::new().await;
        fx.catalog.fail_inserts_after(1);
        let items = vec![
            upload_item("first.pdf", None),
            upload_item("second.pdf", None),
            upload_item("third.pdf", None),
        ];

        let result = fx.upload_service.upload_batch(items).await;

        assert!(matches!(result, Err(AppError::Database(_))));
        // First item committed, second compensated, third never attempted
        assert_eq!(fx.catalog.len(), 1);
        assert_eq!(fx.blob_count(), 1);

        let page = fx
            .catalog
            .list_page(None, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.records[0].original_name, "first.pdf");
    }

    #[tokio::test]
    async fn test_ids_follow_request_order() {
        let fx = TestFixture::new().await;
        let items: Vec<UploadItem> = (0..5)
            .map(|i| upload_item(&format!("f{}.pdf", i), None))
            .collect();

        let files = fx.upload_service.upload_batch(items).await.unwrap();

        assert!(files.windows(2).all(|w| w[0].id < w[1].id));
        let page = fx
            .catalog
            .list_page(None, PageRequest::default())
            .await
            .unwrap();
        let listed: Vec<Uuid> = page.records.iter().map(|r| r.id).collect();
        let newest_first: Vec<Uuid> = files.iter().rev().map(|f| f.id).collect();
        assert_eq!(listed, newest_first);
    }

    #[tokio::test]
    async fn test_same_original_name_creates_distinct_records() {
        let fx = TestFixture::new().await;
        let items = vec![upload_item("dup.pdf", None), upload_item("dup.pdf", None)];

        let files = fx.upload_service.upload_batch(items).await.unwrap();

        assert_ne!(files[0].id, files[1].id);
        assert_ne!(files[0].file_name, files[1].file_name);
        assert_eq!(fx.blob_count(), 2);
    }
}
