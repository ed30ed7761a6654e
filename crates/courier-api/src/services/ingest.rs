//! Ingestion pipeline: validate → key → store → issue handle
//!
//! Exactly one object is written per successful call and none per rejected or
//! failed call. If the handle cannot be issued after a successful write, the
//! object is removed again.

use std::sync::Arc;

use bytes::Bytes;
use courier_core::{generate_key, AppError, ObjectMetadata, UploadPolicy};
use courier_storage::{Storage, StorageError};

use super::handle::{RetrievalHandle, RetrievalHandleIssuer};

/// One file as received from the caller.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub bytes: Bytes,
    pub filename: String,
    pub content_type: String,
}

/// Outcome of a successful ingestion.
#[derive(Debug, Clone)]
pub struct IngestedFile {
    pub key: String,
    pub handle: RetrievalHandle,
}

#[derive(Clone)]
pub struct IngestionService {
    policy: UploadPolicy,
    storage: Arc<dyn Storage>,
    issuer: RetrievalHandleIssuer,
}

impl IngestionService {
    pub fn new(policy: UploadPolicy, storage: Arc<dyn Storage>, issuer: RetrievalHandleIssuer) -> Self {
        Self {
            policy,
            storage,
            issuer,
        }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    pub async fn ingest(&self, file: IncomingFile) -> Result<IngestedFile, AppError> {
        let size = file.bytes.len() as u64;
        self.policy.validate(&file.content_type, size)?;

        let key = generate_key(&file.filename);
        let metadata = ObjectMetadata::new(file.filename.clone(), file.content_type.clone());

        tracing::info!(
            key = %key,
            original_filename = %file.filename,
            content_type = %file.content_type,
            size_bytes = size,
            "Processing upload"
        );

        self.storage
            .put(&key, file.bytes, &file.content_type, &metadata)
            .await
            .map_err(|e| match e {
                StorageError::InvalidKey(reason) => {
                    tracing::warn!(key = %key, reason = %reason, "Storage refused generated key");
                    AppError::InvalidInput(format!("File name cannot be stored: {}", reason))
                }
                e => {
                    tracing::error!(error = %e, key = %key, "Failed to upload to storage");
                    AppError::Storage(format!("Failed to store file: {}", e))
                }
            })?;

        let handle = match self.issuer.issue(&key).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, key = %key, "Failed to issue retrieval handle");
                if let Err(cleanup) = self.storage.delete(&key).await {
                    tracing::error!(
                        error = %cleanup,
                        key = %key,
                        "Failed to remove object after handle issuance failure"
                    );
                }
                return Err(AppError::Storage(format!(
                    "Failed to issue retrieval handle: {}",
                    e
                )));
            }
        };

        tracing::info!(key = %key, expires_at = %handle.expires_at, "Upload successful");

        Ok(IngestedFile { key, handle })
    }
}
