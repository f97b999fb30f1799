//! Pipeline lifecycle tests: upload, validate, process, query, and the
//! state-machine invariants, run against the in-memory blob store and
//! registry with a programmable extraction backend.

use std::sync::Arc;

use kvitto_core::AppError;
use kvitto_db::MemoryStore;
use kvitto_processing::test_support::{pdf, FakeExtractor};
use kvitto_processing::{ReceiptPipeline, TextExtractor, UploadPolicy};
use kvitto_storage::{MemoryStorage, Storage};

struct TestPipeline {
    pipeline: Arc<ReceiptPipeline>,
    storage: MemoryStorage,
    extractor: Arc<FakeExtractor>,
}

fn test_pipeline() -> TestPipeline {
    let storage = MemoryStorage::new();
    let store = MemoryStore::new();
    let extractor = Arc::new(FakeExtractor::new());
    let pipeline = Arc::new(ReceiptPipeline::new(
        Arc::new(storage.clone()),
        Arc::new(store.clone()),
        Arc::new(store),
        extractor.clone(),
        UploadPolicy::pdf_default(),
    ));
    TestPipeline {
        pipeline,
        storage,
        extractor,
    }
}

fn receipt_pdf() -> Vec<u8> {
    pdf::with_text(&["GREEN GROCER", "Date: 12/05/2024", "TOTAL 42.50"])
}

#[tokio::test]
async fn upload_registers_an_unvalidated_file() {
    let t = test_pipeline();

    let file = t
        .pipeline
        .upload(receipt_pdf(), "groceries.pdf", "application/pdf")
        .await
        .unwrap();

    assert_eq!(file.file_name, "groceries.pdf");
    assert!(!file.processed);
    assert!(!file.is_valid());
    assert!(t.storage.exists(&file.storage_key).await.unwrap());

    let files = t.pipeline.list_files().await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].id, file.id);
}

#[tokio::test]
async fn upload_rejects_bad_requests() {
    let t = test_pipeline();

    let err = t
        .pipeline
        .upload(Vec::new(), "groceries.pdf", "application/pdf")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let err = t
        .pipeline
        .upload(receipt_pdf(), "  ", "application/pdf")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let err = t
        .pipeline
        .upload(receipt_pdf(), "groceries.png", "application/pdf")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let err = t
        .pipeline
        .upload(receipt_pdf(), "groceries.pdf", "image/png")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    // nothing registered by rejected uploads
    assert!(t.pipeline.list_files().await.unwrap().is_empty());
}

#[tokio::test]
async fn upload_enforces_the_size_limit() {
    let storage = MemoryStorage::new();
    let store = MemoryStore::new();
    let pipeline = ReceiptPipeline::new(
        Arc::new(storage),
        Arc::new(store.clone()),
        Arc::new(store),
        Arc::new(FakeExtractor::new()),
        UploadPolicy {
            max_file_size: 64,
            ..UploadPolicy::pdf_default()
        },
    );

    let err = pipeline
        .upload(receipt_pdf(), "groceries.pdf", "application/pdf")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PayloadTooLarge(_)));
}

#[tokio::test]
async fn scenario_a_upload_validate_process() {
    let t = test_pipeline();

    let file = t
        .pipeline
        .upload(receipt_pdf(), "groceries.pdf", "application/pdf")
        .await
        .unwrap();

    let verdict = t.pipeline.validate(file.id).await.unwrap();
    assert!(verdict.is_valid);

    let receipt = t.pipeline.process(file.id).await.unwrap();
    assert_eq!(receipt.file_id, file.id);
    assert_eq!(receipt.merchant_name, "GREEN GROCER");
    assert_eq!(receipt.file_path, file.storage_key);

    let receipts = t.pipeline.list_receipts().await.unwrap();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].id, receipt.id);

    // round-trip: the registry shows the file as processed
    let files = t.pipeline.list_files().await.unwrap();
    assert!(files[0].processed);
    assert!(files[0].is_valid());

    let fetched = t.pipeline.get_receipt(receipt.id).await.unwrap();
    assert_eq!(fetched.file_id, file.id);
}

#[tokio::test]
async fn scenario_b_encrypted_file_cannot_be_processed() {
    let t = test_pipeline();

    let file = t
        .pipeline
        .upload(pdf::encrypted(), "secret.pdf", "application/pdf")
        .await
        .unwrap();

    let verdict = t.pipeline.validate(file.id).await.unwrap();
    assert!(!verdict.is_valid);
    assert_eq!(verdict.reason.as_deref(), Some("encrypted document"));

    let err = t.pipeline.process(file.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(t.extractor.calls(), 0);
}

#[tokio::test]
async fn unvalidated_file_cannot_be_processed() {
    let t = test_pipeline();

    let file = t
        .pipeline
        .upload(receipt_pdf(), "groceries.pdf", "application/pdf")
        .await
        .unwrap();

    let err = t.pipeline.process(file.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn scenario_c_second_process_conflicts() {
    let t = test_pipeline();

    let file = t
        .pipeline
        .upload(receipt_pdf(), "groceries.pdf", "application/pdf")
        .await
        .unwrap();
    t.pipeline.validate(file.id).await.unwrap();

    t.pipeline.process(file.id).await.unwrap();
    let err = t.pipeline.process(file.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // still exactly one receipt, and extraction ran exactly once
    assert_eq!(t.pipeline.list_receipts().await.unwrap().len(), 1);
    assert_eq!(t.extractor.calls(), 1);
}

#[tokio::test]
async fn scenario_d_extraction_failure_is_retryable() {
    let t = test_pipeline();

    let file = t
        .pipeline
        .upload(receipt_pdf(), "groceries.pdf", "application/pdf")
        .await
        .unwrap();
    t.pipeline.validate(file.id).await.unwrap();

    t.extractor.push_failure("model not confident");
    let err = t.pipeline.process(file.id).await.unwrap_err();
    assert!(matches!(err, AppError::ExtractionFailed(_)));

    // the file stays unprocessed and nothing was committed
    let files = t.pipeline.list_files().await.unwrap();
    assert!(!files[0].processed);
    assert!(t.pipeline.list_receipts().await.unwrap().is_empty());

    // a later call retries the full extraction and succeeds
    let receipt = t.pipeline.process(file.id).await.unwrap();
    assert_eq!(receipt.file_id, file.id);
    assert_eq!(t.extractor.calls(), 2);
}

#[tokio::test]
async fn malformed_extraction_is_not_committed() {
    let t = test_pipeline();

    let file = t
        .pipeline
        .upload(receipt_pdf(), "groceries.pdf", "application/pdf")
        .await
        .unwrap();
    t.pipeline.validate(file.id).await.unwrap();

    let mut bad = FakeExtractor::sample();
    bad.merchant_name = String::new();
    t.extractor.push_success(bad);

    let err = t.pipeline.process(file.id).await.unwrap_err();
    assert!(matches!(err, AppError::ExtractionFailed(_)));
    assert!(t.pipeline.list_receipts().await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_process_calls_commit_exactly_once() {
    let t = test_pipeline();

    let file = t
        .pipeline
        .upload(receipt_pdf(), "groceries.pdf", "application/pdf")
        .await
        .unwrap();
    t.pipeline.validate(file.id).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pipeline = t.pipeline.clone();
        let id = file.id;
        handles.push(tokio::spawn(async move { pipeline.process(id).await }));
    }

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(AppError::Conflict(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(conflicts, 7);
    assert_eq!(t.pipeline.list_receipts().await.unwrap().len(), 1);

    // processed implies valid, even after the race
    let files = t.pipeline.list_files().await.unwrap();
    assert!(files.iter().all(|f| !f.processed || f.is_valid()));
}

#[tokio::test]
async fn validate_is_repeatable_with_a_stable_verdict() {
    let t = test_pipeline();

    let file = t
        .pipeline
        .upload(receipt_pdf(), "groceries.pdf", "application/pdf")
        .await
        .unwrap();

    let first = t.pipeline.validate(file.id).await.unwrap();
    let second = t.pipeline.validate(file.id).await.unwrap();
    assert_eq!(first, second);
    assert!(second.is_valid);

    let files = t.pipeline.list_files().await.unwrap();
    assert!(files[0].is_valid());
}

#[tokio::test]
async fn validate_unknown_id_is_not_found() {
    let t = test_pipeline();
    let err = t.pipeline.validate(uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn validate_reports_missing_bytes_as_storage_error() {
    let t = test_pipeline();

    let file = t
        .pipeline
        .upload(receipt_pdf(), "groceries.pdf", "application/pdf")
        .await
        .unwrap();

    // simulate a blob lost after registration
    t.storage.remove(&file.storage_key);

    let err = t.pipeline.validate(file.id).await.unwrap_err();
    assert!(matches!(err, AppError::Storage(_)));
}

#[tokio::test]
async fn get_receipt_unknown_id_is_not_found() {
    let t = test_pipeline();
    let err = t
        .pipeline
        .get_receipt(uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn text_extractor_end_to_end() {
    let storage = MemoryStorage::new();
    let store = MemoryStore::new();
    let pipeline = ReceiptPipeline::new(
        Arc::new(storage),
        Arc::new(store.clone()),
        Arc::new(store),
        Arc::new(TextExtractor::new()),
        UploadPolicy::pdf_default(),
    );

    let file = pipeline
        .upload(receipt_pdf(), "groceries.pdf", "application/pdf")
        .await
        .unwrap();
    let verdict = pipeline.validate(file.id).await.unwrap();
    assert!(verdict.is_valid);

    let receipt = pipeline.process(file.id).await.unwrap();
    assert!(!receipt.merchant_name.trim().is_empty());
    assert!(!receipt.total_amount.is_sign_negative());
}
