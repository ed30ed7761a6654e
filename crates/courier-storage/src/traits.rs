//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use courier_core::ObjectMetadata;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A persisted payload together with the metadata attached when it was written.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub payload: Bytes,
    pub metadata: ObjectMetadata,
}

/// Storage abstraction trait
///
/// All storage backends (S3, local filesystem) implement this trait. The
/// ingestion path depends only on `put` and `signed_read_url`; the rest serves
/// retrieval and cleanup.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist `data` under `key` with its content type and metadata.
    ///
    /// Either the whole object becomes visible or nothing does.
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> StorageResult<()>;

    /// Generate a time-limited URL granting read access to `key` to any bearer.
    async fn signed_read_url(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    /// Fetch an object with its metadata.
    async fn get(&self, key: &str) -> StorageResult<StoredObject>;

    /// Check if an object exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Delete an object. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
