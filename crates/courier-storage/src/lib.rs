//! Courier Storage Library
//!
//! The object store collaborator behind the ingestion service: the [`Storage`]
//! trait and its S3 and local filesystem implementations.
//!
//! # Storage key format
//!
//! Keys are flat, `{uuid}.{extension}`, generated by `courier_core::keys`.
//! Backends never derive keys themselves; they reject keys containing `..`,
//! a leading `/`, or path separators.

pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod signing;
pub mod traits;

// Re-export commonly used types
pub use courier_core::StorageBackend;
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use signing::{TokenError, UrlSigner};
pub use traits::{Storage, StorageError, StorageResult, StoredObject};
