use std::sync::Arc;

use bytes::Bytes;
use tempfile::TempDir;

use crate::core::config::UploadLimits;
use crate::features::files::catalog::InMemoryFileCatalog;
use crate::features::files::services::{FileQueryService, UploadItem, UploadService};
use crate::modules::storage::{BlobStore, LocalBlobStore};

/// Services wired to an in-memory catalog and a blob directory that lives
/// as long as the fixture
pub struct TestFixture {
    _dir: TempDir,
    pub catalog: Arc<InMemoryFileCatalog>,
    pub blob_store: Arc<LocalBlobStore>,
    pub upload_service: Arc<UploadService>,
    pub query_service: Arc<FileQueryService>,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_limits(UploadLimits::default()).await
    }

    pub async fn with_limits(limits: UploadLimits) -> Self {
        let dir = TempDir::new().unwrap();
        let catalog = Arc::new(InMemoryFileCatalog::new());
        let blob_store = Arc::new(LocalBlobStore::new(dir.path().join("uploads")));
        blob_store.ensure_ready().await.unwrap();

        let upload_service = Arc::new(UploadService::new(
            catalog.clone(),
            blob_store.clone(),
            limits,
        ));
        let query_service = Arc::new(FileQueryService::new(catalog.clone(), blob_store.clone()));

        Self {
            _dir: dir,
            catalog,
            blob_store,
            upload_service,
            query_service,
        }
    }

    /// Number of finished blobs in the upload directory
    pub fn blob_count(&self) -> usize {
        std::fs::read_dir(self.blob_store.base_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
            .count()
    }
}

/// Minimal bytes that look like a PDF, padded to `len`
pub fn pdf_bytes(len: usize) -> Bytes {
    let mut data = b"%PDF-1.4\n".to_vec();
    data.resize(len.max(data.len()), b'0');
    Bytes::from(data)
}

pub fn upload_item(declared_name: &str, custom_name: Option<&str>) -> UploadItem {
    UploadItem {
        content: pdf_bytes(64),
        declared_name: Some(declared_name.to_string()),
        mime_type: "application/pdf".to_string(),
        custom_name: custom_name.map(str::to_string),
    }
}
