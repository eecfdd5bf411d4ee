//! Upload routes
//!
//! `POST /uploads` accepts a multipart file, runs it through the ingestion
//! gateway, and spawns the orchestrator task for the accepted job. Gateway
//! rejections come back synchronously; nothing is persisted for them.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde_json::json;

use crate::api::AppState;
use crate::error::AppError;

/// Create upload routes
pub fn routes(body_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/uploads", post(upload))
        .layer(DefaultBodyLimit::max(body_limit))
}

/// Upload a building-model file
///
/// POST /uploads (multipart/form-data with a `file` field)
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("malformed multipart body: {}", e)))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        let payload = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("failed to read upload: {}", e)))?;

        let job = state.gateway.submit(&file_name, payload.to_vec()).await?;
        state.orchestrator.spawn(job.clone());

        return Ok((
            StatusCode::ACCEPTED,
            Json(json!({
                "job_id": job.id,
                "accepted_file_name": job.source_file_name,
            })),
        ));
    }

    Err(AppError::BadRequest(
        "multipart upload must include a file field".to_string(),
    ))
}
