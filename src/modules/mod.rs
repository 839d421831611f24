//! Modules layer - Infrastructure components for external integrations
//!
//! Currently holds the blob storage backends used by the files feature.

pub mod storage;
