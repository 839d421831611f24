//! Metadata catalog of stored files
//!
//! [`FileCatalog`] is the table contract the services depend on. PostgreSQL
//! backs it in production; tests use an in-memory table with the same
//! ordering and search semantics.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::files::models::{CatalogPage, CatalogStats, FileRecord};
use crate::shared::types::PageRequest;

mod pg_catalog;
#[cfg(test)]
mod memory_catalog;

pub use pg_catalog::PgFileCatalog;
#[cfg(test)]
pub use memory_catalog::InMemoryFileCatalog;

#[async_trait]
pub trait FileCatalog: Send + Sync {
    /// Insert a new record. Duplicate ids or storage names are a `Conflict`.
    async fn insert(&self, record: FileRecord) -> Result<FileRecord>;

    /// One page of records, newest first. `search` matches case-insensitively
    /// as a substring of the custom name or the original name.
    async fn list_page(&self, search: Option<&str>, page: PageRequest) -> Result<CatalogPage>;

    async fn get_by_id(&self, id: Uuid) -> Result<FileRecord>;

    /// Delete a record, returning it so the caller can clean up its blob
    async fn delete_by_id(&self, id: Uuid) -> Result<FileRecord>;

    /// Totals over all records; `recent_files` counts uploads at or after `recent_since`
    async fn aggregate_stats(&self, recent_since: DateTime<Utc>) -> Result<CatalogStats>;
}
