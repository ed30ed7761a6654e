//! Signed file route: serves a stored object to any bearer of a valid token.
//! This is where links issued by the local backend point.

use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
};
use courier_core::AppError;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub token: Option<String>,
}

#[tracing::instrument(skip(state, query), fields(operation = "get_file"))]
pub async fn get_file(
    Path(key): Path<String>,
    Query(query): Query<FileQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, HttpAppError> {
    let token = query.token.as_deref().map(str::trim).unwrap_or_default();
    if token.is_empty() {
        return Err(HttpAppError::from(AppError::Forbidden(
            "Missing token parameter".to_string(),
        )));
    }
    state.signer.verify(&key, token)?;

    let object = state.storage.get(&key).await?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, object.metadata.content_type.as_str())
        .header(header::CONTENT_LENGTH, object.payload.len())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&object.metadata.original_name),
        )
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(Body::from(object.payload))
        .map_err(|e| {
            tracing::error!(error = %e, key = %key, "Failed to build response");
            HttpAppError::from(AppError::Internal(e.to_string()))
        })?;

    Ok(response)
}

/// `inline` disposition with an ASCII fallback name and the exact name in `filename*`.
fn content_disposition(original_name: &str) -> String {
    let fallback: String = original_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        utf8_percent_encode(original_name, NON_ALPHANUMERIC)
    )
}
