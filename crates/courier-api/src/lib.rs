//! Courier API Library
//!
//! The ingestion service and its HTTP surface: `POST /upload`, the signed
//! `GET /files/{key}` route, and `GET /health`.

mod handlers;
mod utils;

pub mod error;
pub mod services;
pub mod setup;
pub mod state;
pub mod telemetry;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use services::{
    IncomingFile, IngestedFile, IngestionService, RetrievalHandle, RetrievalHandleIssuer,
};
pub use state::AppState;
