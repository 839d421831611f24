//! Filesystem blob store
//!
//! Blobs live flat in a single upload directory. Writes go to a hidden
//! `.<name>.part` file which is fsynced and then renamed onto the final name,
//! so a blob is never visible under its final name until it is complete.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::core::error::{AppError, Result};
use crate::modules::storage::blob_store::{
    generate_storage_name, BlobStore, BlobStream, RemoveOutcome, StoredBlob,
};

/// Local file system blob store
pub struct LocalBlobStore {
    base_dir: PathBuf,
}

impl LocalBlobStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    #[cfg(test)]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Map a stored path back to a file inside the upload directory.
    ///
    /// Only the final component is trusted, so records keep resolving if the
    /// directory is moved, and nothing outside the directory is reachable.
    fn resolve(&self, storage_path: &str) -> Option<PathBuf> {
        match Path::new(storage_path).components().next_back() {
            Some(Component::Normal(name)) if !name.to_string_lossy().starts_with('.') => {
                Some(self.base_dir.join(name))
            }
            _ => None,
        }
    }

    async fn write_atomically(&self, final_path: &Path, temp_path: &Path, data: &[u8]) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(temp_path)
            .await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(temp_path, final_path).await?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn ensure_ready(&self) -> Result<()> {
        fs::create_dir_all(&self.base_dir).await.map_err(|e| {
            AppError::Storage(format!(
                "Failed to create upload directory {:?}: {}",
                self.base_dir, e
            ))
        })?;

        info!("Local blob store ready at {:?}", self.base_dir);
        Ok(())
    }

    async fn store(&self, content: Bytes, declared_name: &str) -> Result<StoredBlob> {
        let storage_name = generate_storage_name(declared_name);
        let final_path = self.base_dir.join(&storage_name);
        let temp_path = self.base_dir.join(format!(".{}.part", storage_name));

        if let Err(e) = self.write_atomically(&final_path, &temp_path, &content).await {
            if let Err(cleanup) = fs::remove_file(&temp_path).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!("Failed to clean up partial blob {:?}: {}", temp_path, cleanup);
                }
            }
            return Err(AppError::Storage(format!(
                "Failed to write blob '{}': {}",
                storage_name, e
            )));
        }

        debug!("Stored blob {:?} ({} bytes)", final_path, content.len());

        Ok(StoredBlob {
            storage_name,
            storage_path: final_path.to_string_lossy().into_owned(),
            size_bytes: content.len() as i64,
        })
    }

    async fn open(&self, storage_path: &str) -> Result<BlobStream> {
        let path = self
            .resolve(storage_path)
            .ok_or_else(|| AppError::NotFound(format!("Blob not found: {}", storage_path)))?;

        let file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                AppError::NotFound(format!("Blob not found: {}", storage_path))
            } else {
                AppError::Storage(format!("Failed to open blob {:?}: {}", path, e))
            }
        })?;

        Ok(ReaderStream::new(file).boxed())
    }

    async fn remove(&self, storage_path: &str) -> Result<RemoveOutcome> {
        let Some(path) = self.resolve(storage_path) else {
            return Ok(RemoveOutcome::NotFound);
        };

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed blob {:?}", path);
                Ok(RemoveOutcome::Removed)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(RemoveOutcome::NotFound),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to remove blob {:?}: {}",
                path, e
            ))),
        }
    }

    async fn exists(&self, storage_path: &str) -> Result<bool> {
        match self.resolve(storage_path) {
            Some(path) => Ok(fs::try_exists(&path).await?),
            None => Ok(false),
        }
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
