use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::core::error::Result;
use crate::shared::validation::sanitize_storage_component;

/// Chunked blob content, suitable for streaming into a response body
pub type BlobStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Where a blob landed after a successful [`BlobStore::store`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Generated unique name of the blob
    pub storage_name: String,
    /// Backend location derived from `storage_name`
    pub storage_path: String,
    /// Number of bytes written
    pub size_bytes: i64,
}

/// Result of removing a blob; absence is reported, never an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

/// Durable storage for uploaded file content
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Prepare the backend (create directory or bucket) before serving requests
    async fn ensure_ready(&self) -> Result<()>;

    /// Write `content` under a freshly generated unique name. The blob is
    /// readable under the returned path as soon as this returns.
    async fn store(&self, content: Bytes, declared_name: &str) -> Result<StoredBlob>;

    /// Open a blob for streaming. Missing blobs yield `AppError::NotFound`.
    async fn open(&self, storage_path: &str) -> Result<BlobStream>;

    /// Remove a blob. Idempotent.
    async fn remove(&self, storage_path: &str) -> Result<RemoveOutcome>;

    /// Check whether a blob exists
    async fn exists(&self, storage_path: &str) -> Result<bool>;

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// Generate a storage name: `<unix-millis>-<uuid>-<sanitized declared name>`.
///
/// The UUID v4 component makes names unique across concurrent calls without
/// any coordination; the timestamp keeps directory listings roughly ordered.
pub fn generate_storage_name(declared_name: &str) -> String {
    format!(
        "{}-{}-{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple(),
        sanitize_storage_component(declared_name)
    )
}
