//! Courier Core Library
//!
//! Domain types shared by the ingestion service, the storage backends, and the
//! upload client: the upload policy, storage key generation, wire models,
//! error types, and server configuration.

pub mod config;
pub mod error;
pub mod keys;
pub mod models;
pub mod policy;
pub mod storage_types;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use keys::{extension_of, generate_key};
pub use models::{ErrorBody, ObjectMetadata, UploadResponse};
pub use policy::{PolicyViolation, UploadPolicy, ALLOWED_CONTENT_TYPES, MAX_FILE_SIZE_BYTES};
pub use storage_types::StorageBackend;
