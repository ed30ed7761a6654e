use crate::signing::UrlSigner;
use crate::traits::{Storage, StorageError, StorageResult, StoredObject};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use courier_core::ObjectMetadata;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Suffix of the sidecar file holding an object's metadata.
const META_SUFFIX: &str = ".meta.json";

/// Characters left unescaped in the key segment of a signed URL.
const KEY_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.').remove(b'-').remove(b'_');

/// Local filesystem storage implementation
///
/// Payload lives at `{base_path}/{key}`, metadata at `{base_path}/{key}.meta.json`.
/// Read URLs point back at this service: `{base_url}/files/{key}?token=...`.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
    signer: UrlSigner,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for object storage (e.g., "/var/lib/courier/uploads")
    /// * `base_url` - Public base URL of the service (e.g., "http://localhost:3000")
    /// * `signer` - Signs read tokens; the `/files` route must verify with the same secret
    pub async fn new(
        base_path: impl Into<PathBuf>,
        base_url: String,
        signer: UrlSigner,
    ) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
            signer,
        })
    }

    /// Convert storage key to filesystem path with security validation
    ///
    /// Keys are flat; anything that could address a path outside the base
    /// directory, or a metadata sidecar, is rejected.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty()
            || key.contains("..")
            || key.starts_with('/')
            || key.contains('/')
            || key.contains('\\')
            || key.ends_with(META_SUFFIX)
        {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        Ok(self.base_path.join(key))
    }

    fn meta_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(META_SUFFIX);
        PathBuf::from(name)
    }

    /// Write `data` to a temp file next to `path` and sync it. Returns the temp path.
    async fn write_temp(path: &Path, data: &[u8]) -> StorageResult<PathBuf> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(format!(".{}.tmp", Uuid::new_v4()));
        let tmp = PathBuf::from(tmp);

        let mut file = fs::File::create(&tmp).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", tmp.display(), e))
        })?;

        let written = async {
            file.write_all(data).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp).await;
            return Err(StorageError::UploadFailed(format!(
                "Failed to write file {}: {}",
                tmp.display(),
                e
            )));
        }

        Ok(tmp)
    }

    /// Build the public URL for a key with a token appended.
    fn generate_url(&self, key: &str, token: &str) -> String {
        format!(
            "{}/files/{}?token={}",
            self.base_url.trim_end_matches('/'),
            utf8_percent_encode(key, KEY_SEGMENT),
            token
        )
    }

    /// Signer used for this backend's read URLs.
    pub fn signer(&self) -> &UrlSigner {
        &self.signer
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        let meta_path = Self::meta_path(&path);
        let size = data.len();
        let start = std::time::Instant::now();

        let mut meta = metadata.clone();
        meta.content_type = content_type.to_string();
        let meta_json = serde_json::to_vec(&meta)
            .map_err(|e| StorageError::UploadFailed(format!("Failed to encode metadata: {}", e)))?;

        let meta_tmp = Self::write_temp(&meta_path, &meta_json).await?;
        let payload_tmp = match Self::write_temp(&path, &data).await {
            Ok(tmp) => tmp,
            Err(e) => {
                let _ = fs::remove_file(&meta_tmp).await;
                return Err(e);
            }
        };

        // Metadata lands first; an object is only visible once its payload exists.
        if let Err(e) = fs::rename(&meta_tmp, &meta_path).await {
            let _ = fs::remove_file(&meta_tmp).await;
            let _ = fs::remove_file(&payload_tmp).await;
            return Err(StorageError::UploadFailed(format!(
                "Failed to persist metadata {}: {}",
                meta_path.display(),
                e
            )));
        }
        if let Err(e) = fs::rename(&payload_tmp, &path).await {
            let _ = fs::remove_file(&payload_tmp).await;
            let _ = fs::remove_file(&meta_path).await;
            return Err(StorageError::UploadFailed(format!(
                "Failed to persist file {}: {}",
                path.display(),
                e
            )));
        }

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage put successful"
        );

        Ok(())
    }

    async fn signed_read_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        self.key_to_path(key)?;
        let token = self.signer.sign(key, expires_in);
        Ok(self.generate_url(key, &token))
    }

    async fn get(&self, key: &str) -> StorageResult<StoredObject> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(key.to_string()));
        }

        let payload = fs::read(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })?;
        let meta_path = Self::meta_path(&path);
        let meta_json = fs::read(&meta_path).await.map_err(|e| {
            StorageError::DownloadFailed(format!(
                "Failed to read metadata {}: {}",
                meta_path.display(),
                e
            ))
        })?;
        let metadata: ObjectMetadata = serde_json::from_slice(&meta_json)
            .map_err(|e| StorageError::DownloadFailed(format!("Corrupt metadata: {}", e)))?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = payload.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage get successful"
        );

        Ok(StoredObject {
            payload: Bytes::from(payload),
            metadata,
        })
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        let meta_path = Self::meta_path(&path);

        for target in [&path, &meta_path] {
            if !fs::try_exists(target).await.unwrap_or(false) {
                continue;
            }
            fs::remove_file(target).await.map_err(|e| {
                StorageError::DeleteFailed(format!(
                    "Failed to delete file {}: {}",
                    target.display(),
                    e
                ))
            })?;
        }

        tracing::info!(key = %key, "Local storage delete successful");

        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
