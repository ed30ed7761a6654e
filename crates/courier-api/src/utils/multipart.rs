//! Bounded multipart extraction for `POST /upload`

use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;
use bytes::BytesMut;
use courier_core::{AppError, PolicyViolation, UploadPolicy};

use crate::services::IncomingFile;

/// Name of the single accepted file field.
pub const FILE_FIELD: &str = "file";

/// Multipart framing allowance on top of the file ceiling.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Extract the one `file` field from the form.
///
/// The declared type is checked as soon as the field headers arrive, and the
/// payload is read chunk by chunk and abandoned once it passes the ceiling,
/// so an oversized upload is never fully buffered. Other fields are skipped;
/// a second `file` field is rejected.
pub async fn read_single_file(
    mut multipart: Multipart,
    policy: &UploadPolicy,
) -> Result<IncomingFile, AppError> {
    let max_bytes = policy.max_size_bytes();
    let mut received: u64 = 0;
    let mut file: Option<IncomingFile> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, received, max_bytes))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        if file.is_some() {
            return Err(AppError::InvalidInput(
                "Multiple file fields are not allowed; send exactly one field named 'file'"
                    .to_string(),
            ));
        }

        let filename = field.file_name().unwrap_or("unknown").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        policy.check_type(&content_type)?;

        let mut data = BytesMut::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_error(e, received, max_bytes))?
        {
            received += chunk.len() as u64;
            policy.check_size(received)?;
            data.extend_from_slice(&chunk);
        }

        file = Some(IncomingFile {
            bytes: data.freeze(),
            filename,
            content_type,
        });
    }

    file.ok_or_else(|| AppError::InvalidInput("No file uploaded".to_string()))
}

/// A body cut off by the request limit is an oversize upload, not a framing error.
fn multipart_error(err: MultipartError, received: u64, max_bytes: u64) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::Validation(PolicyViolation::TooLarge {
            size_bytes: received.max(max_bytes + 1),
            max_bytes,
        });
    }
    AppError::InvalidInput(format!("Failed to read multipart: {}", err.body_text()))
}
