//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p courier-api`.

#![allow(dead_code)]

pub mod storage;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use courier_api::setup::routes;
use courier_api::state::AppState;
use courier_core::Config;
use courier_storage::{LocalStorage, Storage, UrlSigner};
use std::sync::Arc;
use tempfile::TempDir;

pub const BASE_URL: &str = "http://localhost:3000";

/// Test application: server, storage, and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub storage: Arc<dyn Storage>,
    pub config: Config,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Number of stored payloads (metadata sidecars excluded).
    pub fn object_count(&self) -> usize {
        std::fs::read_dir(self._temp_dir.path())
            .expect("read storage dir")
            .filter_map(Result::ok)
            .filter(|e| !e.file_name().to_string_lossy().ends_with(".meta.json"))
            .count()
    }
}

pub fn test_config(temp_dir: &TempDir) -> Config {
    Config::local(temp_dir.path().to_string_lossy().to_string(), BASE_URL)
}

pub async fn local_storage(config: &Config) -> Arc<LocalStorage> {
    Arc::new(
        LocalStorage::new(
            &config.local_storage_path,
            config.public_base_url.clone(),
            UrlSigner::new(config.url_signing_secret.as_bytes()),
        )
        .await
        .expect("Failed to create local storage"),
    )
}

/// Setup test app backed by local storage in a temp directory.
pub async fn setup_test_app() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let config = test_config(&temp_dir);
    let storage = local_storage(&config).await;
    build_app(config, storage, temp_dir)
}

/// Setup test app with a caller-supplied storage backend.
pub fn build_app(config: Config, storage: Arc<dyn Storage>, temp_dir: TempDir) -> TestApp {
    let state = Arc::new(AppState::new(config.clone(), storage.clone()));
    let app = routes::setup_routes(state).expect("Failed to build routes");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        storage,
        config,
        _temp_dir: temp_dir,
    }
}

/// Multipart form with a single `file` field.
pub fn file_form(name: &str, mime: &str, data: Vec<u8>) -> MultipartForm {
    let part = Part::bytes(bytes::Bytes::from(data))
        .file_name(name.to_string())
        .mime_type(mime.to_string());
    MultipartForm::new().add_part("file", part)
}

/// Strip the public base URL so the link can be requested against the test server.
pub fn local_path(file_url: &str) -> String {
    file_url
        .strip_prefix(BASE_URL)
        .expect("file URL should start with the public base URL")
        .to_string()
}
