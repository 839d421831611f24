//! Blob storage for uploaded file content
//!
//! [`BlobStore`] is the seam the upload pipeline and query service depend on;
//! the local filesystem backend is the default, MinIO/S3 is optional.

mod blob_store;
mod local_blob_store;
mod minio_blob_store;

pub use blob_store::{BlobStore, BlobStream, RemoveOutcome};
pub use local_blob_store::LocalBlobStore;
pub use minio_blob_store::MinioBlobStore;
