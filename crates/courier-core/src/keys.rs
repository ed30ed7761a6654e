//! Storage key generation.
//!
//! Key format: `{uuid-v4}.{extension}`. The extension is whatever follows the last
//! `.` of the original file name and is empty when the name has no `.`, which
//! yields a key ending in a bare `.`. File content is never inspected.
//!
//! Only alphanumeric characters of the extension are kept, and at most
//! [`MAX_EXTENSION_CHARS`] of them, so every generated key is storable.

use std::path::Path;
use uuid::Uuid;

/// Longest extension carried into a key.
pub const MAX_EXTENSION_CHARS: usize = 16;

/// Generate a fresh storage key for a file with the given original name.
pub fn generate_key(original_name: &str) -> String {
    format!(
        "{}.{}",
        Uuid::new_v4(),
        key_extension(extension_of(original_name))
    )
}

fn key_extension(extension: &str) -> String {
    extension
        .chars()
        .filter(|c| c.is_alphanumeric())
        .take(MAX_EXTENSION_CHARS)
        .collect()
}

/// Substring after the last `.` of the file name component, or `""`.
///
/// Directory components of `original_name` are ignored so a declared name like
/// `../x.png` or `dir.d/readme` cannot leak separators into the key.
pub fn extension_of(original_name: &str) -> &str {
    let name = Path::new(original_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(original_name);
    match name.rfind('.') {
        Some(idx) => &name[idx + 1..],
        None => "",
    }
}
