use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use kvitto_core::models::ReceiptResponse;

use crate::error::{ErrorResponse, HttpAppError};
use crate::handlers::validate::IdQuery;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/api/v0/process",
    tag = "receipts",
    params(
        ("id" = Uuid, Query, description = "Receipt file id")
    ),
    responses(
        (status = 200, description = "Receipt extracted and stored", body = ReceiptResponse),
        (status = 404, description = "Unknown file id", body = ErrorResponse),
        (status = 409, description = "File not valid or already processed", body = ErrorResponse),
        (status = 502, description = "Extraction failed; retry later", body = ErrorResponse)
    )
)]
pub async fn process_receipt_file(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<Json<ReceiptResponse>, HttpAppError> {
    let receipt = state.pipeline.process(query.id).await?;
    Ok(Json(ReceiptResponse::from(receipt)))
}
