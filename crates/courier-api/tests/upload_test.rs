//! Upload and retrieval API integration tests.
//!
//! Run with: `cargo test -p courier-api --test upload_test`

mod helpers;

use axum_test::multipart::{MultipartForm, Part};
use helpers::storage::FailingStorage;
use helpers::{file_form, local_path, setup_test_app};
use std::sync::atomic::Ordering;
use std::sync::Arc;

const MIB: usize = 1024 * 1024;

#[tokio::test]
async fn test_health() {
    let app = setup_test_app().await;

    let response = app.client().get("/health").await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_upload_png_and_fetch_via_link() {
    let app = setup_test_app().await;
    let data: Vec<u8> = (0..2 * MIB).map(|i| (i % 251) as u8).collect();

    let response = app
        .client()
        .post("/upload")
        .multipart(file_form("photo.png", "image/png", data.clone()))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["message"], "File uploaded successfully");
    let file_url = body["fileUrl"].as_str().expect("fileUrl");
    let key = body["key"].as_str().expect("key");
    assert!(key.ends_with(".png"));
    assert!(file_url.contains(key));
    assert!(body["expiresAt"].is_string());

    let fetched = app.client().get(&local_path(file_url)).await;
    assert_eq!(fetched.status_code(), 200);
    assert_eq!(fetched.header("content-type"), "image/png");
    assert!(fetched
        .header("content-disposition")
        .to_str()
        .unwrap()
        .contains("filename=\"photo.png\""));
    assert_eq!(fetched.as_bytes().as_ref(), data.as_slice());
}

#[tokio::test]
async fn test_upload_exactly_max_size_is_accepted() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/upload")
        .multipart(file_form("limit.txt", "text/plain", vec![b'a'; 5 * MIB]))
        .await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(app.object_count(), 1);
}

#[tokio::test]
async fn test_upload_too_large_is_rejected() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/upload")
        .multipart(file_form("big.jpg", "image/jpeg", vec![0u8; 6 * 1000 * 1000]))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "TOO_LARGE");
    assert_eq!(body["error"], "File is too large. Max size is 5 MB.");
    assert_eq!(app.object_count(), 0);
}

#[tokio::test]
async fn test_upload_far_over_body_limit_is_rejected() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/upload")
        .multipart(file_form("huge.png", "image/png", vec![0u8; 12 * MIB]))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "TOO_LARGE");
    assert_eq!(body["error"], "File is too large. Max size is 5 MB.");
    assert_eq!(app.object_count(), 0);
}

#[tokio::test]
async fn test_upload_unsupported_type_is_rejected() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/upload")
        .multipart(file_form("doc.pdf", "application/pdf", b"%PDF-1.4".to_vec()))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "UNSUPPORTED_TYPE");
    assert!(body["error"].as_str().unwrap().contains("application/pdf"));
    assert!(body.get("details").is_some());
    assert_eq!(app.object_count(), 0);
}

#[tokio::test]
async fn test_mime_parameters_do_not_bypass_allow_list() {
    let app = setup_test_app().await;

    let accepted = app
        .client()
        .post("/upload")
        .multipart(file_form("a.txt", "text/plain; charset=utf-8", b"hi".to_vec()))
        .await;
    assert_eq!(accepted.status_code(), 200);

    for declared in ["text/html; x=\"text/plain\"", "text/html; charset=utf-8"] {
        let rejected = app
            .client()
            .post("/upload")
            .multipart(file_form("a.html", declared, b"<p>".to_vec()))
            .await;
        assert_eq!(rejected.status_code(), 400, "{} was accepted", declared);
        let body: serde_json::Value = rejected.json();
        assert_eq!(body["code"], "UNSUPPORTED_TYPE");
    }
    assert_eq!(app.object_count(), 1);
}

#[tokio::test]
async fn test_unusual_extensions_are_stored() {
    let app = setup_test_app().await;

    let long_name = format!("a.{}", "x".repeat(300));
    for name in ["notes.t\\xt", long_name.as_str()] {
        let response = app
            .client()
            .post("/upload")
            .multipart(file_form(name, "text/plain", b"hello".to_vec()))
            .await;
        assert_eq!(response.status_code(), 200, "{} was refused", name);

        let body: serde_json::Value = response.json();
        let key = body["key"].as_str().unwrap();
        assert!(!key.contains('\\'));
        assert!(key.len() <= 36 + 1 + courier_core::keys::MAX_EXTENSION_CHARS);

        let fetched = app.client().get(&local_path(body["fileUrl"].as_str().unwrap())).await;
        assert_eq!(fetched.status_code(), 200);
        assert_eq!(fetched.as_bytes().as_ref(), b"hello");
    }
}

#[tokio::test]
async fn test_upload_without_file_field() {
    let app = setup_test_app().await;

    let form = MultipartForm::new().add_text("note", "no file here");
    let response = app.client().post("/upload").multipart(form).await;

    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "No file uploaded");
}

#[tokio::test]
async fn test_upload_with_two_file_fields_is_rejected() {
    let app = setup_test_app().await;

    let form = MultipartForm::new()
        .add_part(
            "file",
            Part::bytes(bytes::Bytes::from_static(b"one"))
                .file_name("one.txt")
                .mime_type("text/plain"),
        )
        .add_part(
            "file",
            Part::bytes(bytes::Bytes::from_static(b"two"))
                .file_name("two.txt")
                .mime_type("text/plain"),
        );
    let response = app.client().post("/upload").multipart(form).await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(app.object_count(), 0);
}

#[tokio::test]
async fn test_upload_ignores_extra_fields() {
    let app = setup_test_app().await;

    let form = file_form("notes.txt", "text/plain", b"hello".to_vec()).add_text("comment", "x");
    let response = app.client().post("/upload").multipart(form).await;

    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn test_upload_requires_multipart_body() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/upload")
        .json(&serde_json::json!({ "file": "nope" }))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_filename_without_extension_keeps_empty_segment() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/upload")
        .multipart(file_form("README", "text/plain", b"readme".to_vec()))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    let key = body["key"].as_str().unwrap();
    assert!(key.ends_with('.'));

    let fetched = app
        .client()
        .get(&local_path(body["fileUrl"].as_str().unwrap()))
        .await;
    assert_eq!(fetched.status_code(), 200);
    assert_eq!(fetched.text(), "readme");
}

#[tokio::test]
async fn test_store_failure_is_server_fault() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = helpers::test_config(&temp_dir);
    let storage = Arc::new(FailingStorage::default());
    let app = helpers::build_app(config, storage.clone(), temp_dir);

    let response = app
        .client()
        .post("/upload")
        .multipart(file_form("photo.png", "image/png", vec![1u8; 1024]))
        .await;

    assert_eq!(response.status_code(), 500);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Failed to store file, try again later");
    assert_eq!(body["code"], "STORAGE_ERROR");
    assert!(body.get("details").is_none());
    assert_eq!(storage.put_attempts.load(Ordering::SeqCst), 1);
    assert_eq!(storage.sign_attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rejected_upload_never_touches_storage() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = helpers::test_config(&temp_dir);
    let storage = Arc::new(FailingStorage::default());
    let app = helpers::build_app(config, storage.clone(), temp_dir);

    let response = app
        .client()
        .post("/upload")
        .multipart(file_form("a.gif", "image/gif", vec![1u8; 10]))
        .await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(storage.put_attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_file_link_requires_valid_token() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/upload")
        .multipart(file_form("a.txt", "text/plain", b"secret".to_vec()))
        .await;
    let body: serde_json::Value = response.json();
    let key = body["key"].as_str().unwrap().to_string();

    let missing = app.client().get(&format!("/files/{}", key)).await;
    assert_eq!(missing.status_code(), 403);

    let forged = app
        .client()
        .get(&format!("/files/{}?token=AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA", key))
        .await;
    assert_eq!(forged.status_code(), 403);

    let signer = courier_storage::UrlSigner::new(app.config.url_signing_secret.as_bytes());
    let expired = signer.sign_until(&key, 1);
    let response = app
        .client()
        .get(&format!("/files/{}?token={}", key, expired))
        .await;
    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn test_token_for_other_key_is_rejected() {
    let app = setup_test_app().await;

    let first: serde_json::Value = app
        .client()
        .post("/upload")
        .multipart(file_form("a.txt", "text/plain", b"a".to_vec()))
        .await
        .json();
    let second: serde_json::Value = app
        .client()
        .post("/upload")
        .multipart(file_form("b.txt", "text/plain", b"b".to_vec()))
        .await
        .json();

    let token = first["fileUrl"].as_str().unwrap().split("token=").nth(1).unwrap();
    let response = app
        .client()
        .get(&format!("/files/{}?token={}", second["key"].as_str().unwrap(), token))
        .await;
    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn test_valid_token_for_missing_object_is_not_found() {
    let app = setup_test_app().await;

    let signer = courier_storage::UrlSigner::new(app.config.url_signing_secret.as_bytes());
    let token = signer.sign("gone.png", std::time::Duration::from_secs(60));

    let response = app
        .client()
        .get(&format!("/files/gone.png?token={}", token))
        .await;
    assert_eq!(response.status_code(), 404);
}
