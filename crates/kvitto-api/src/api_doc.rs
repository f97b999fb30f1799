//! OpenAPI document for the receipt service.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "kvitto",
        description = "Receipt ingestion and extraction pipeline"
    ),
    paths(
        crate::handlers::upload::upload_receipt_file,
        crate::handlers::validate::validate_receipt_file,
        crate::handlers::process::process_receipt_file,
        crate::handlers::receipt_files::list_receipt_files,
        crate::handlers::receipts::list_receipts,
        crate::handlers::receipts::get_receipt,
    ),
    components(schemas(
        crate::handlers::upload::UploadResponse,
        crate::handlers::validate::ValidateResponse,
        crate::error::ErrorResponse,
        kvitto_core::models::ReceiptFileResponse,
        kvitto_core::models::ReceiptResponse,
    )),
    tags(
        (name = "receipt-files", description = "Upload and lifecycle of receipt files"),
        (name = "receipts", description = "Extracted receipts")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_builds() {
        let doc = ApiDoc::openapi();
        let json = doc.to_json().expect("openapi serializes");
        assert!(json.contains("/api/v0/upload"));
        assert!(json.contains("/api/v0/receipts/{id}"));
    }
}
