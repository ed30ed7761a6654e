//! `POST /upload`: ingest one file and return a retrieval link.

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use courier_core::UploadResponse;

use crate::error::HttpAppError;
use crate::state::AppState;
use crate::utils::multipart::read_single_file;

#[tracing::instrument(skip(state, multipart), fields(operation = "upload_file"))]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, HttpAppError> {
    let multipart = multipart?;
    let file = read_single_file(multipart, state.ingestion.policy()).await?;
    let ingested = state.ingestion.ingest(file).await?;

    Ok(Json(UploadResponse {
        message: "File uploaded successfully".to_string(),
        file_url: ingested.handle.url,
        key: Some(ingested.key),
        expires_at: Some(ingested.handle.expires_at),
    }))
}
