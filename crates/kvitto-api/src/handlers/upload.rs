use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};
use kvitto_core::AppError;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub file_id: Uuid,
}

#[utoipa::path(
    post,
    path = "/api/v0/upload",
    tag = "receipt-files",
    responses(
        (status = 200, description = "Receipt file uploaded", body = UploadResponse),
        (status = 400, description = "Invalid or missing file", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
pub async fn upload_receipt_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, HttpAppError> {
    let mut upload: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(HttpAppError::from)? {
        // Accept the `file` field, or any field carrying a filename.
        if field.name() != Some("file") && field.file_name().is_none() {
            continue;
        }

        let file_name = field.file_name().map(str::to_string).unwrap_or_default();
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let data = field.bytes().await.map_err(HttpAppError::from)?.to_vec();

        upload = Some((file_name, content_type, data));
        break;
    }

    let (file_name, content_type, data) = upload.ok_or_else(|| {
        HttpAppError(AppError::InvalidInput(
            "multipart body must contain a 'file' field".to_string(),
        ))
    })?;

    let file = state.pipeline.upload(data, &file_name, &content_type).await?;

    Ok(Json(UploadResponse { file_id: file.id }))
}
