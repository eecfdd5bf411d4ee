//! HTTP feature routes
//!
//! Route handlers are thin wrappers over the ingestion pipeline; all
//! behavior lives in `crate::ingest`.

pub mod jobs;
pub mod uploads;

use crate::api::AppState;
use axum::Router;

/// Assemble the `/api/v1` router.
pub fn router(state: AppState) -> Router {
    let upload_body_limit = state.upload_body_limit();

    Router::new()
        .merge(uploads::routes(upload_body_limit))
        .merge(jobs::routes())
        .with_state(state)
}
