//! MinIO/S3-compatible blob store
//!
//! Stores blobs as objects under `<prefix>/<storage_name>` in a single
//! bucket. Uses rust-s3 without `fail-on-err`, so non-2xx responses come
//! back as status codes and are checked here.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use s3::creds::Credentials;
use s3::{Bucket, BucketConfiguration, Region};
use tracing::{debug, info, warn};

use crate::core::config::MinIOConfig;
use crate::core::error::{AppError, Result};
use crate::modules::storage::blob_store::{
    generate_storage_name, BlobStore, BlobStream, RemoveOutcome, StoredBlob,
};

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// MinIO/S3-compatible blob store
pub struct MinioBlobStore {
    bucket: Box<Bucket>,
    region: Region,
    credentials: Credentials,
    endpoint: String,
    prefix: String,
}

impl MinioBlobStore {
    /// Create a new MinIO blob store from configuration
    pub fn new(config: MinIOConfig) -> Result<Self> {
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| AppError::Internal(format!("Failed to create MinIO credentials: {}", e)))?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };

        let mut bucket = Bucket::new(&config.bucket, region.clone(), credentials.clone())
            .map_err(|e| AppError::Internal(format!("Failed to create MinIO bucket: {}", e)))?;

        // Use path-style URLs for MinIO (http://endpoint/bucket instead of http://bucket.endpoint)
        bucket.set_path_style();

        Ok(Self {
            bucket,
            region,
            credentials,
            endpoint: config.endpoint,
            prefix: config.prefix.trim_matches('/').to_string(),
        })
    }

    fn object_key(&self, storage_name: &str) -> String {
        if self.prefix.is_empty() {
            storage_name.to_string()
        } else {
            format!("{}/{}", self.prefix, storage_name)
        }
    }

    fn is_success(status: u16) -> bool {
        (200..300).contains(&status)
    }
}

fn blob_not_found(storage_path: &str) -> AppError {
    AppError::NotFound(format!("Blob not found: {}", storage_path))
}

fn check_download_status(storage_path: &str, status: u16) -> Result<()> {
    match status {
        404 => Err(blob_not_found(storage_path)),
        status if MinioBlobStore::is_success(status) => Ok(()),
        status => Err(AppError::Storage(format!(
            "Failed to download blob '{}': status {}",
            storage_path, status
        ))),
    }
}

#[async_trait]
impl BlobStore for MinioBlobStore {
    async fn ensure_ready(&self) -> Result<()> {
        // Creating an existing bucket fails with a "already owned" error,
        // which is the expected steady state
        match Bucket::create_with_path_style(
            &self.bucket.name(),
            self.region.clone(),
            self.credentials.clone(),
            BucketConfiguration::default(),
        )
        .await
        {
            Ok(_) => info!("Bucket '{}' created successfully", self.bucket.name()),
            Err(e) => {
                let error_str = e.to_string();
                if error_str.contains("BucketAlreadyOwnedByYou")
                    || error_str.contains("BucketAlreadyExists")
                    || error_str.contains("already own it")
                {
                    debug!("Bucket '{}' already exists", self.bucket.name());
                } else {
                    warn!(
                        "Could not create bucket '{}': {}. Assuming it exists.",
                        self.bucket.name(),
                        e
                    );
                }
            }
        }

        info!(
            "MinIO blob store ready: endpoint={}, bucket={}, prefix={}",
            self.endpoint,
            self.bucket.name(),
            self.prefix
        );
        Ok(())
    }

    async fn store(&self, content: Bytes, declared_name: &str) -> Result<StoredBlob> {
        let storage_name = generate_storage_name(declared_name);
        let key = self.object_key(&storage_name);

        // S3 PUT is atomic: the object only becomes visible once fully received
        let response = self
            .bucket
            .put_object_with_content_type(&key, &content, PDF_CONTENT_TYPE)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to upload blob '{}': {}", key, e)))?;

        if !Self::is_success(response.status_code()) {
            return Err(AppError::Storage(format!(
                "Failed to upload blob '{}': status {}",
                key,
                response.status_code()
            )));
        }

        debug!("Uploaded blob '{}' to bucket '{}'", key, self.bucket.name());

        Ok(StoredBlob {
            storage_name,
            storage_path: key,
            size_bytes: content.len() as i64,
        })
    }

    async fn open(&self, storage_path: &str) -> Result<BlobStream> {
        let response = match self.bucket.get_object_stream(storage_path).await {
            Ok(response) => response,
            Err(e) => {
                let error_str = e.to_string();
                if error_str.contains("404") || error_str.contains("NoSuchKey") {
                    return Err(blob_not_found(storage_path));
                }
                return Err(AppError::Storage(format!(
                    "Failed to download blob '{}': {}",
                    storage_path, e
                )));
            }
        };

        check_download_status(storage_path, response.status_code)?;

        // Chunks are forwarded as the object body arrives
        Ok(response
            .bytes
            .map(|chunk| chunk.map_err(|e| std::io::Error::other(e.to_string())))
            .boxed())
    }

    async fn remove(&self, storage_path: &str) -> Result<RemoveOutcome> {
        // DELETE on a missing key succeeds in S3, so check first to report absence
        if !self.exists(storage_path).await? {
            return Ok(RemoveOutcome::NotFound);
        }

        let response = self.bucket.delete_object(storage_path).await.map_err(|e| {
            AppError::Storage(format!("Failed to delete blob '{}': {}", storage_path, e))
        })?;

        if !Self::is_success(response.status_code()) {
            return Err(AppError::Storage(format!(
                "Failed to delete blob '{}': status {}",
                storage_path,
                response.status_code()
            )));
        }

        debug!(
            "Deleted blob '{}' from bucket '{}'",
            storage_path,
            self.bucket.name()
        );
        Ok(RemoveOutcome::Removed)
    }

    async fn exists(&self, storage_path: &str) -> Result<bool> {
        match self.bucket.head_object(storage_path).await {
            Ok((_, status)) if Self::is_success(status) => Ok(true),
            Ok((_, 404)) => Ok(false),
            Ok((_, status)) => Err(AppError::Storage(format!(
                "Failed to check blob '{}': status {}",
                storage_path, status
            ))),
            Err(e) => {
                let error_str = e.to_string();
                if error_str.contains("404") || error_str.contains("NoSuchKey") {
                    Ok(false)
                } else {
                    Err(AppError::Storage(format!(
                        "Failed to check blob '{}': {}",
                        storage_path, e
                    )))
                }
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "minio"
    }
}
