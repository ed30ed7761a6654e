//! Wire and storage models shared by server, storage backends and client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata attached to a stored object at write time. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub original_name: String,
    pub uploaded_at: DateTime<Utc>,
    pub content_type: String,
}

impl ObjectMetadata {
    pub fn new(original_name: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            original_name: original_name.into(),
            uploaded_at: Utc::now(),
            content_type: content_type.into(),
        }
    }
}

/// Body of a successful `POST /upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    pub file_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Error body returned by every non-2xx response. Only `error` is guaranteed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub recoverable: bool,
}
