//! Storage doubles for failure-path tests.

use async_trait::async_trait;
use bytes::Bytes;
use courier_core::{ObjectMetadata, StorageBackend};
use courier_storage::{Storage, StorageError, StorageResult, StoredObject};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Every write fails as an I/O error would.
#[derive(Default)]
pub struct FailingStorage {
    pub put_attempts: AtomicUsize,
    pub sign_attempts: AtomicUsize,
}

#[async_trait]
impl Storage for FailingStorage {
    async fn put(
        &self,
        _key: &str,
        _data: Bytes,
        _content_type: &str,
        _metadata: &ObjectMetadata,
    ) -> StorageResult<()> {
        self.put_attempts.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::IoError(std::io::Error::other(
            "simulated disk failure",
        )))
    }

    async fn signed_read_url(&self, _key: &str, _expires_in: Duration) -> StorageResult<String> {
        self.sign_attempts.fetch_add(1, Ordering::SeqCst);
        Ok("http://localhost:3000/never".to_string())
    }

    async fn get(&self, key: &str) -> StorageResult<StoredObject> {
        Err(StorageError::NotFound(key.to_string()))
    }

    async fn exists(&self, _key: &str) -> StorageResult<bool> {
        Ok(false)
    }

    async fn delete(&self, _key: &str) -> StorageResult<()> {
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
