use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ValidateResponse {
    pub is_valid: bool,
    /// Diagnostic reason; present when the verdict is invalid.
    pub reason: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v0/validate",
    tag = "receipt-files",
    params(
        ("id" = Uuid, Query, description = "Receipt file id")
    ),
    responses(
        (status = 200, description = "Verdict evaluated and stored", body = ValidateResponse),
        (status = 404, description = "Unknown file id", body = ErrorResponse),
        (status = 500, description = "Stored bytes missing or unreadable", body = ErrorResponse)
    )
)]
pub async fn validate_receipt_file(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<Json<ValidateResponse>, HttpAppError> {
    let verdict = state.pipeline.validate(query.id).await?;
    Ok(Json(ValidateResponse {
        is_valid: verdict.is_valid,
        reason: verdict.reason,
    }))
}
