use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use kvitto_core::models::ReceiptResponse;
use uuid::Uuid;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/v0/receipts",
    tag = "receipts",
    responses(
        (status = 200, description = "All receipts in extraction order", body = [ReceiptResponse]),
        (status = 500, description = "Receipt store unavailable", body = ErrorResponse)
    )
)]
pub async fn list_receipts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ReceiptResponse>>, HttpAppError> {
    let receipts = state.pipeline.list_receipts().await?;
    Ok(Json(
        receipts.into_iter().map(ReceiptResponse::from).collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v0/receipts/{id}",
    tag = "receipts",
    params(
        ("id" = Uuid, Path, description = "Receipt id")
    ),
    responses(
        (status = 200, description = "Receipt record", body = ReceiptResponse),
        (status = 404, description = "Unknown receipt id", body = ErrorResponse)
    )
)]
pub async fn get_receipt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReceiptResponse>, HttpAppError> {
    let receipt = state.pipeline.get_receipt(id).await?;
    Ok(Json(ReceiptResponse::from(receipt)))
}
