//! Upload policy: declared media type allow-list and size ceiling.
//!
//! The same policy runs on the client as a pre-flight check and on the server
//! as the authoritative check; both link this module.

use std::fmt;

/// Declared media types accepted for upload.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["text/plain", "image/jpeg", "image/jpg", "image/png"];

/// Largest accepted payload, in bytes (5 MiB). A file of exactly this size is accepted.
pub const MAX_FILE_SIZE_BYTES: u64 = 5 * 1024 * 1024;

/// Why a candidate file was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    #[error("Unsupported file type '{declared_type}'. Only TXT, JPEG, JPG, PNG are accepted.")]
    UnsupportedType { declared_type: String },

    /// `size_bytes` is a lower bound when the upload was cut off while streaming.
    #[error("File is too large. Max size is {} MB.", .max_bytes / 1024 / 1024)]
    TooLarge { size_bytes: u64, max_bytes: u64 },
}

impl PolicyViolation {
    /// Short machine-readable reason.
    pub fn reason_code(&self) -> &'static str {
        match self {
            PolicyViolation::UnsupportedType { .. } => "UNSUPPORTED_TYPE",
            PolicyViolation::TooLarge { .. } => "TOO_LARGE",
        }
    }
}

/// Type/size acceptance rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    allowed_types: Vec<String>,
    max_size_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed_types: ALLOWED_CONTENT_TYPES.iter().map(|s| s.to_string()).collect(),
            max_size_bytes: MAX_FILE_SIZE_BYTES,
        }
    }
}

impl UploadPolicy {
    /// A policy with a custom allow-list and ceiling. Types are stored lowercased.
    pub fn new<I, S>(allowed_types: I, max_size_bytes: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_types: allowed_types
                .into_iter()
                .map(|t| t.into().to_ascii_lowercase())
                .collect(),
            max_size_bytes,
        }
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    pub fn allowed_types(&self) -> &[String] {
        &self.allowed_types
    }

    /// Check declared type and size. Type is checked first.
    pub fn validate(&self, declared_type: &str, size_bytes: u64) -> Result<(), PolicyViolation> {
        self.check_type(declared_type)?;
        self.check_size(size_bytes)
    }

    /// Check only the declared type. Compares the normalized MIME type, so
    /// parameters such as `; charset=utf-8` cannot bypass the allow-list.
    pub fn check_type(&self, declared_type: &str) -> Result<(), PolicyViolation> {
        let normalized = normalize_mime_type(declared_type).to_ascii_lowercase();
        if self.allowed_types.iter().any(|t| *t == normalized) {
            Ok(())
        } else {
            Err(PolicyViolation::UnsupportedType {
                declared_type: declared_type.to_string(),
            })
        }
    }

    pub fn check_size(&self, size_bytes: u64) -> Result<(), PolicyViolation> {
        if size_bytes > self.max_size_bytes {
            return Err(PolicyViolation::TooLarge {
                size_bytes,
                max_bytes: self.max_size_bytes,
            });
        }
        Ok(())
    }
}

impl fmt::Display for UploadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "types=[{}] max={} bytes",
            self.allowed_types.join(", "),
            self.max_size_bytes
        )
    }
}

/// Validate against the default policy.
pub fn validate(declared_type: &str, size_bytes: u64) -> Result<(), PolicyViolation> {
    UploadPolicy::default().validate(declared_type, size_bytes)
}

/// Strip MIME parameters ("image/jpeg; charset=utf-8" -> "image/jpeg").
fn normalize_mime_type(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .map(|s| s.trim())
        .unwrap_or(content_type)
}
