use std::sync::Arc;

use axum::{extract::State, Json};
use kvitto_core::models::ReceiptFileResponse;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/v0/receipt-files",
    tag = "receipt-files",
    responses(
        (status = 200, description = "All receipt files in upload order", body = [ReceiptFileResponse]),
        (status = 500, description = "Registry unavailable", body = ErrorResponse)
    )
)]
pub async fn list_receipt_files(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ReceiptFileResponse>>, HttpAppError> {
    let files = state.pipeline.list_files().await?;
    Ok(Json(
        files.into_iter().map(ReceiptFileResponse::from).collect(),
    ))
}
