//! Build API Handlers
//!
//! HTTP endpoints for running builds and reading their results.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use kiln_core::domain::build::BuildRecord;
use kiln_core::domain::log::LogEntry;
use kiln_core::dto::build::HistoryQuery;
use kiln_core::dto::job::RunBuildRequest;

use super::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::service::build_service;

/// POST /api/jobs/{name}/run
/// Run a build of a job
///
/// Responds with the build report once the build finishes, or with the
/// Running job right away when `detach` is set. The build itself always runs
/// on its own task, so a dropped connection does not abort it.
pub async fn run_build(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> ApiResult<Response> {
    let req = parse_run_request(&body)?;
    tracing::info!("Running build for job: {}", name);

    let handle = state.runner.start(&name, state.context_for(req.notify))?;
    let job = handle.job().clone();
    let build = tokio::spawn(handle.finish());

    if req.detach {
        return Ok((StatusCode::ACCEPTED, Json(job)).into_response());
    }

    let report = build
        .await
        .map_err(|e| ApiError::InternalError(format!("Build task failed: {}", e)))?;

    Ok(Json(report).into_response())
}

/// An empty body means default options
fn parse_run_request(body: &[u8]) -> ApiResult<RunBuildRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RunBuildRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid run request: {}", e)))
}

/// POST /api/jobs/{name}/cancel
/// Cancel the job's in-flight build
pub async fn cancel_build(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    tracing::info!("Cancelling build for job: {}", name);

    state.runner.cancel(&name)?;
    Ok(StatusCode::ACCEPTED)
}

/// GET /api/jobs/{name}/console
/// Console lines of the job's latest build
pub async fn get_console(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Vec<LogEntry>>> {
    tracing::debug!("Getting console for job: {}", name);

    match state.consoles.get(&name) {
        Some(lines) => Ok(Json(lines)),
        None if state.jobs.contains(&name) => Ok(Json(Vec::new())),
        None => Err(ApiError::NotFound(format!("job '{}' not found", name))),
    }
}

/// GET /api/builds
/// List build history in completion order
///
/// Query parameters:
/// - `job`: only records of this job
pub async fn list_builds(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<BuildRecord>>> {
    tracing::debug!("Listing build history: {:?}", query);

    let records = build_service::list_history(&state.history, &query)?;
    Ok(Json(records))
}
