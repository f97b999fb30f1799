//! HTTP contract tests for the pipeline routes, run against the in-memory
//! storage and registry with a programmable extraction backend.

use std::sync::Arc;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use kvitto_api::setup::routes::setup_routes;
use kvitto_api::state::AppState;
use kvitto_core::config::ExtractorBackend;
use kvitto_core::{Config, StorageBackend};
use kvitto_db::MemoryStore;
use kvitto_processing::test_support::{pdf, FakeExtractor};
use kvitto_processing::{ReceiptPipeline, UploadPolicy};
use kvitto_storage::MemoryStorage;
use serde_json::Value;

struct TestApp {
    server: TestServer,
    extractor: Arc<FakeExtractor>,
}

fn test_config() -> Config {
    Config {
        server_port: 0,
        cors_origins: vec!["*".to_string()],
        environment: "test".to_string(),
        database_url: None,
        db_max_connections: 5,
        storage_backend: StorageBackend::Memory,
        local_storage_path: String::new(),
        local_storage_base_url: String::new(),
        max_receipt_size_bytes: 20 * 1024 * 1024,
        allowed_extensions: vec!["pdf".to_string()],
        allowed_content_types: vec!["application/pdf".to_string()],
        extractor_backend: ExtractorBackend::Text,
        anthropic_api_key: None,
        anthropic_vision_model: "claude-sonnet-4-20250514".to_string(),
    }
}

fn test_app() -> TestApp {
    let config = test_config();
    let store = MemoryStore::new();
    let extractor = Arc::new(FakeExtractor::new());

    let pipeline = Arc::new(ReceiptPipeline::new(
        Arc::new(MemoryStorage::new()),
        Arc::new(store.clone()),
        Arc::new(store),
        extractor.clone(),
        UploadPolicy {
            max_file_size: config.max_receipt_size_bytes,
            allowed_extensions: config.allowed_extensions.clone(),
            allowed_content_types: config.allowed_content_types.clone(),
        },
    ));

    let state = Arc::new(AppState {
        pipeline,
        config: config.clone(),
    });
    let router = setup_routes(&config, state).expect("router builds");

    TestApp {
        server: TestServer::new(router).expect("test server starts"),
        extractor,
    }
}

fn receipt_form(file_name: &str, bytes: Vec<u8>) -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(bytes)
            .file_name(file_name)
            .mime_type("application/pdf"),
    )
}

fn receipt_pdf() -> Vec<u8> {
    pdf::with_text(&["GREEN GROCER", "Date: 12/05/2024", "TOTAL 42.50"])
}

async fn upload(app: &TestApp, bytes: Vec<u8>) -> String {
    let response = app
        .server
        .post("/api/v0/upload")
        .multipart(receipt_form("receipt.pdf", bytes))
        .await;
    response.assert_status_ok();
    response.json::<Value>()["file_id"]
        .as_str()
        .expect("file_id in response")
        .to_string()
}

#[tokio::test]
async fn health_endpoint_responds() {
    let app = test_app();
    let response = app.server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "ok");
}

#[tokio::test]
async fn upload_returns_a_file_id() {
    let app = test_app();
    let file_id = upload(&app, receipt_pdf()).await;
    assert!(uuid::Uuid::parse_str(&file_id).is_ok());

    let files = app.server.get("/api/v0/receipt-files").await.json::<Value>();
    let files = files.as_array().expect("array of files");
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["id"], file_id.as_str());
    assert_eq!(files[0]["file_name"], "receipt.pdf");
    assert!(files[0]["is_valid"].is_null());
    assert_eq!(files[0]["is_processed"], false);
}

#[tokio::test]
async fn upload_without_file_field_is_a_bad_request() {
    let app = test_app();
    let response = app
        .server
        .post("/api/v0/upload")
        .multipart(MultipartForm::new().add_text("note", "no file here"))
        .await;
    response.assert_status_bad_request();
    assert_eq!(response.json::<Value>()["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn upload_with_wrong_content_type_is_a_bad_request() {
    let app = test_app();
    let response = app
        .server
        .post("/api/v0/upload")
        .multipart(MultipartForm::new().add_part(
            "file",
            Part::bytes(receipt_pdf())
                .file_name("receipt.pdf")
                .mime_type("image/png"),
        ))
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn validate_unknown_id_is_not_found() {
    let app = test_app();
    let response = app
        .server
        .get("/api/v0/validate")
        .add_query_param("id", uuid::Uuid::new_v4().to_string())
        .await;
    response.assert_status_not_found();
    assert_eq!(response.json::<Value>()["code"], "NOT_FOUND");
}

#[tokio::test]
async fn scenario_a_full_lifecycle_over_http() {
    let app = test_app();
    let file_id = upload(&app, receipt_pdf()).await;

    let response = app
        .server
        .get("/api/v0/validate")
        .add_query_param("id", &file_id)
        .await;
    response.assert_status_ok();
    let verdict = response.json::<Value>();
    assert_eq!(verdict["is_valid"], true);
    assert!(verdict["reason"].is_null());

    let response = app
        .server
        .post("/api/v0/process")
        .add_query_param("id", &file_id)
        .await;
    response.assert_status_ok();
    let receipt = response.json::<Value>();
    assert_eq!(receipt["file_id"], file_id.as_str());
    assert_eq!(receipt["merchant_name"], "GREEN GROCER");

    let receipts = app.server.get("/api/v0/receipts").await.json::<Value>();
    let receipts = receipts.as_array().expect("array of receipts");
    assert_eq!(receipts.len(), 1);

    let receipt_id = receipts[0]["id"].as_str().expect("receipt id");
    let response = app
        .server
        .get(&format!("/api/v0/receipts/{}", receipt_id))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["file_id"], file_id.as_str());

    // the registry now shows the file as processed and still valid
    let files = app.server.get("/api/v0/receipt-files").await.json::<Value>();
    let files = files.as_array().expect("array of files");
    assert_eq!(files[0]["is_processed"], true);
    assert_eq!(files[0]["is_valid"], true);
}

#[tokio::test]
async fn scenario_b_encrypted_upload_cannot_be_processed() {
    let app = test_app();
    let file_id = upload(&app, pdf::encrypted()).await;

    let response = app
        .server
        .get("/api/v0/validate")
        .add_query_param("id", &file_id)
        .await;
    response.assert_status_ok();
    let verdict = response.json::<Value>();
    assert_eq!(verdict["is_valid"], false);
    assert_eq!(verdict["reason"], "encrypted document");

    let response = app
        .server
        .post("/api/v0/process")
        .add_query_param("id", &file_id)
        .await;
    response.assert_status(axum::http::StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["code"], "CONFLICT");
}

#[tokio::test]
async fn scenario_c_double_process_conflicts_over_http() {
    let app = test_app();
    let file_id = upload(&app, receipt_pdf()).await;

    app.server
        .get("/api/v0/validate")
        .add_query_param("id", &file_id)
        .await
        .assert_status_ok();

    app.server
        .post("/api/v0/process")
        .add_query_param("id", &file_id)
        .await
        .assert_status_ok();

    let response = app
        .server
        .post("/api/v0/process")
        .add_query_param("id", &file_id)
        .await;
    response.assert_status(axum::http::StatusCode::CONFLICT);
    let body = response.json::<Value>();
    assert_eq!(body["code"], "CONFLICT");
    assert_eq!(body["recoverable"], false);

    let receipts = app.server.get("/api/v0/receipts").await.json::<Value>();
    assert_eq!(receipts.as_array().expect("array").len(), 1);
}

#[tokio::test]
async fn scenario_d_extraction_failure_returns_502_and_is_retryable() {
    let app = test_app();
    let file_id = upload(&app, receipt_pdf()).await;

    app.server
        .get("/api/v0/validate")
        .add_query_param("id", &file_id)
        .await
        .assert_status_ok();

    app.extractor.push_failure("model not confident");
    let response = app
        .server
        .post("/api/v0/process")
        .add_query_param("id", &file_id)
        .await;
    response.assert_status(axum::http::StatusCode::BAD_GATEWAY);
    let body = response.json::<Value>();
    assert_eq!(body["code"], "EXTRACTION_FAILED");
    assert_eq!(body["recoverable"], true);

    // the file is still unprocessed
    let files = app.server.get("/api/v0/receipt-files").await.json::<Value>();
    assert_eq!(files.as_array().expect("array")[0]["is_processed"], false);

    // a retry succeeds
    app.server
        .post("/api/v0/process")
        .add_query_param("id", &file_id)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn get_unknown_receipt_is_not_found() {
    let app = test_app();
    let response = app
        .server
        .get(&format!("/api/v0/receipts/{}", uuid::Uuid::new_v4()))
        .await;
    response.assert_status_not_found();
}
