//! Wire transport for a single file.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use courier_core::{ErrorBody, UploadResponse};
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};

use crate::config::ClientConfig;
use crate::entry::FileSource;
use crate::error::TransferError;
use crate::progress::ProgressSink;

/// Bytes handed to the connection between progress reports.
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

/// What a transport needs to send one file.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub declared_type: String,
    pub size_bytes: u64,
    pub source: FileSource,
}

/// Sends one file in one request and resolves with the server's answer.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(
        &self,
        file: &UploadFile,
        progress: ProgressSink,
    ) -> Result<UploadResponse, TransferError>;
}

/// `POST {api_url}/upload` as `multipart/form-data` with a single `file` field.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    upload_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            upload_url: format!("{}/upload", base_url.trim_end_matches('/')),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(&config.api_url, config.request_timeout)
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }
}

/// Body that reports progress as each chunk is pulled by the connection.
fn counting_body(payload: Bytes, progress: ProgressSink) -> Body {
    Body::wrap_stream(counting_stream(payload, progress))
}

fn counting_stream(
    payload: Bytes,
    mut progress: ProgressSink,
) -> impl futures::Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    let total = payload.len() as u64;
    let chunks: Vec<Bytes> = (0..payload.len())
        .step_by(UPLOAD_CHUNK_BYTES)
        .map(|start| payload.slice(start..(start + UPLOAD_CHUNK_BYTES).min(payload.len())))
        .collect();

    let mut sent = 0u64;
    futures::stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        progress.report(sent, total);
        Ok::<Bytes, std::io::Error>(chunk)
    })
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        file: &UploadFile,
        progress: ProgressSink,
    ) -> Result<UploadResponse, TransferError> {
        let payload = file
            .source
            .load()
            .await
            .map_err(|e| TransferError::Source(format!("{}: {}", file.name, e)))?;
        let length = payload.len() as u64;

        let part = Part::stream_with_length(counting_body(payload, progress), length)
            .file_name(file.name.clone())
            .mime_str(&file.declared_type)
            .map_err(|e| TransferError::Source(format!("invalid type '{}': {}", file.declared_type, e)))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransferError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransferError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ErrorBody>(&text) {
                Ok(body) => body.error,
                Err(_) if !text.trim().is_empty() => text,
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string(),
            };
            return Err(TransferError::Status {
                code: status.as_u16(),
                message,
            });
        }

        let body: UploadResponse = serde_json::from_str(&text)
            .map_err(|e| TransferError::InvalidResponse(e.to_string()))?;
        if body.file_url.is_empty() {
            return Err(TransferError::InvalidResponse(
                "response carried an empty fileUrl".to_string(),
            ));
        }

        Ok(body)
    }
}
