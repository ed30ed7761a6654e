//! Retrieval handle issuance
//!
//! A handle is never stored; it is derived from the key on demand, and each
//! issuance starts a fresh validity window.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use courier_storage::{Storage, StorageResult};

/// Time-bounded capability URL for one stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalHandle {
    pub url: String,
    pub key: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct RetrievalHandleIssuer {
    storage: Arc<dyn Storage>,
    ttl: Duration,
}

impl RetrievalHandleIssuer {
    pub fn new(storage: Arc<dyn Storage>, ttl: Duration) -> Self {
        Self { storage, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a handle for `key` valid for the configured window.
    pub async fn issue(&self, key: &str) -> StorageResult<RetrievalHandle> {
        let issued_at = Utc::now();
        let url = self.storage.signed_read_url(key, self.ttl).await?;
        let window = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);

        tracing::debug!(key = %key, ttl_secs = self.ttl.as_secs(), "Issued retrieval handle");

        Ok(RetrievalHandle {
            url,
            key: key.to_string(),
            expires_at: issued_at
                .checked_add_signed(window)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        })
    }
}
