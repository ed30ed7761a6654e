//! Application state shared by all handlers.

use std::sync::Arc;

use courier_core::{Config, UploadPolicy};
use courier_storage::{Storage, UrlSigner};

use crate::services::{IngestionService, RetrievalHandleIssuer};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn Storage>,
    pub ingestion: IngestionService,
    /// Verifies tokens on `/files` links issued by the local backend.
    pub signer: UrlSigner,
}

impl AppState {
    pub fn new(config: Config, storage: Arc<dyn Storage>) -> Self {
        let issuer = RetrievalHandleIssuer::new(storage.clone(), config.signed_url_ttl());
        let ingestion = IngestionService::new(UploadPolicy::default(), storage.clone(), issuer);
        let signer = UrlSigner::new(config.url_signing_secret.as_bytes());

        Self {
            config,
            storage,
            ingestion,
            signer,
        }
    }
}
