//! Job routes
//!
//! Read-only job queries (the status operation), cancellation, report and
//! export generation for completed jobs, and the SSE event stream.

use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use qto_common::types::{
    CostReport, Element, ExportRecord, JobStatus, ParametricSelection, UploadJob,
};
use qto_common::QtoError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use crate::api::AppState;
use crate::error::AppError;

/// Create job routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/:job_id", get(get_job))
        .route("/jobs/:job_id/cancel", post(cancel_job))
        .route("/jobs/:job_id/report", post(job_report))
        .route("/jobs/:job_id/export", post(job_export))
        .route("/events", get(event_stream))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

/// Status operation response. Elements appear once the job is Complete and
/// its result payload extracts cleanly.
#[derive(Debug, Serialize)]
struct JobStatusResponse {
    job_id: Uuid,
    status: JobStatus,
    progress_percent: i64,
    attempts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    elements: Option<Vec<Element>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    accuracy_band: Option<String>,
}

/// Selections to price alongside the extracted elements.
#[derive(Debug, Default, Deserialize)]
struct ReportRequest {
    #[serde(default)]
    selections: Vec<ParametricSelection>,
}

/// List jobs, newest first
///
/// GET /jobs?limit=50&offset=0
async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<UploadJob>>, AppError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = query.offset.unwrap_or(0).max(0);

    let jobs = state.store.list(limit, offset).await?;
    Ok(Json(jobs))
}

/// The status operation
///
/// GET /jobs/:job_id
async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, AppError> {
    let job = fetch_job(&state, job_id).await?;

    let mut response = JobStatusResponse {
        job_id: job.id,
        status: job.status,
        progress_percent: job.progress_percent,
        attempts: job.attempts,
        error: job.error.clone(),
        elements: None,
        accuracy_band: None,
    };

    // Element records ride along once the translation completed. Extraction
    // trouble never breaks the status operation; the report operation is
    // where it surfaces as a distinct error.
    if job.status == JobStatus::Complete {
        match extract_elements(&state, &job).await {
            Ok((elements, accuracy_band)) => {
                response.elements = Some(elements);
                response.accuracy_band = accuracy_band;
            },
            Err(e) => {
                warn!(%job_id, error = %e, "result extraction unavailable for status response");
            },
        }
    }

    Ok(Json(response))
}

/// Cancel a job
///
/// POST /jobs/:job_id/cancel
async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    fetch_job(&state, job_id).await?;

    if state.orchestrator.cancel(job_id).await? {
        Ok(Json(json!({
            "job_id": job_id,
            "status": JobStatus::Failed,
            "error": "cancelled",
        })))
    } else {
        Err(AppError::Conflict(
            "job is already in a terminal state".to_string(),
        ))
    }
}

/// Generate the cost report for a completed job
///
/// POST /jobs/:job_id/report (optional JSON body with assembly selections)
async fn job_report(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    body: Option<Json<ReportRequest>>,
) -> Result<Json<CostReport>, AppError> {
    let job = fetch_complete_job(&state, job_id).await?;
    let selections = body.map(|Json(b)| b.selections).unwrap_or_default();

    let report = build_report(&state, &job, &selections).await?;
    Ok(Json(report))
}

/// Flat export rows for a completed job
///
/// POST /jobs/:job_id/export (optional JSON body with assembly selections)
async fn job_export(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    body: Option<Json<ReportRequest>>,
) -> Result<Json<Vec<ExportRecord>>, AppError> {
    let job = fetch_complete_job(&state, job_id).await?;
    let selections = body.map(|Json(b)| b.selections).unwrap_or_default();

    let report = build_report(&state, &job, &selections).await?;
    Ok(Json(report.flatten()))
}

/// SSE stream of job progress and terminal-state events
///
/// GET /events
async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let sse = Event::default()
                        .json_data(&event)
                        .unwrap_or_else(|_| Event::default());
                    return Some((Ok(sse), rx));
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event stream lagged, dropping missed events");
                    continue;
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn fetch_job(state: &AppState, job_id: Uuid) -> Result<UploadJob, AppError> {
    state
        .store
        .get(job_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("job {} not found", job_id)))
}

async fn fetch_complete_job(state: &AppState, job_id: Uuid) -> Result<UploadJob, AppError> {
    let job = fetch_job(state, job_id).await?;
    if job.status != JobStatus::Complete {
        return Err(AppError::Conflict(format!(
            "report requires a complete job, current status is {}",
            job.status
        )));
    }
    Ok(job)
}

async fn extract_elements(
    state: &AppState,
    job: &UploadJob,
) -> Result<(Vec<Element>, Option<String>), AppError> {
    let payload = state
        .service
        .result(&job.translation_id)
        .await
        .map_err(|e| AppError::Qto(QtoError::TranslationError(e.to_string())))?;

    let extraction = state.extractor.extract(&payload)?;
    Ok((extraction.elements, extraction.accuracy_band))
}

async fn build_report(
    state: &AppState,
    job: &UploadJob,
    selections: &[ParametricSelection],
) -> Result<CostReport, AppError> {
    let payload = state
        .service
        .result(&job.translation_id)
        .await
        .map_err(|e| AppError::Qto(QtoError::TranslationError(e.to_string())))?;

    let extraction = state.extractor.extract(&payload)?;

    Ok(state.aggregator.aggregate(
        &extraction.elements,
        selections,
        extraction.accuracy_band,
        job.processing_duration_secs(),
    ))
}
