use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::files::catalog::FileCatalog;
use crate::features::files::models::{CatalogPage, CatalogStats, FileRecord};
use crate::shared::types::PageRequest;

/// In-memory catalog for tests
pub struct InMemoryFileCatalog {
    records: RwLock<Vec<FileRecord>>,
    /// Inserts remaining before every further insert fails; `usize::MAX` = never
    inserts_before_failure: AtomicUsize,
}

impl Default for InMemoryFileCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryFileCatalog {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            inserts_before_failure: AtomicUsize::new(usize::MAX),
        }
    }

    /// Make every insert after the first `n` fail with a database error
    pub fn fail_inserts_after(&self, n: usize) {
        self.inserts_before_failure.store(n, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    fn matches(record: &FileRecord, needle: &str) -> bool {
        record.custom_name.to_lowercase().contains(needle)
            || record.original_name.to_lowercase().contains(needle)
    }
}

#[async_trait]
impl FileCatalog for InMemoryFileCatalog {
    async fn insert(&self, record: FileRecord) -> Result<FileRecord> {
        let remaining = self.inserts_before_failure.load(Ordering::SeqCst);
        if remaining == 0 {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        if remaining != usize::MAX {
            self.inserts_before_failure
                .store(remaining - 1, Ordering::SeqCst);
        }

        let mut records = self.records.write().unwrap();
        if records
            .iter()
            .any(|r| r.id == record.id || r.storage_name == record.storage_name)
        {
            return Err(AppError::Conflict(format!(
                "File record {} already exists",
                record.id
            )));
        }
        records.push(record.clone());
        Ok(record)
    }

    async fn list_page(&self, search: Option<&str>, page: PageRequest) -> Result<CatalogPage> {
        let needle = search.map(str::to_lowercase);
        let records = self.records.read().unwrap();

        let mut matching: Vec<&FileRecord> = records
            .iter()
            .filter(|r| needle.as_deref().map_or(true, |n| Self::matches(r, n)))
            .collect();
        matching.sort_by(|a, b| {
            b.uploaded_at
                .cmp(&a.uploaded_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(CatalogPage {
            total: matching.len() as i64,
            records: matching
                .into_iter()
                .skip(page.offset() as usize)
                .take(page.limit() as usize)
                .cloned()
                .collect(),
        })
    }

    async fn get_by_id(&self, id: Uuid) -> Result<FileRecord> {
        self.records
            .read()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", id)))
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<FileRecord> {
        let mut records = self.records.write().unwrap();
        let index = records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", id)))?;
        Ok(records.remove(index))
    }

    async fn aggregate_stats(&self, recent_since: DateTime<Utc>) -> Result<CatalogStats> {
        let records = self.records.read().unwrap();
        Ok(CatalogStats {
            total_files: records.len() as i64,
            total_size_bytes: records.iter().map(|r| r.size_bytes).sum(),
            recent_files: records
                .iter()
                .filter(|r| r.uploaded_at >= recent_since)
                .count() as i64,
        })
    }
}
