//! Job API Handlers
//!
//! HTTP endpoints for job management.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use kiln_core::domain::job::Job;
use kiln_core::dto::job::CreateJob;

use super::AppState;
use crate::api::error::ApiResult;
use crate::service::job_service;

/// POST /api/jobs
/// Create a new job
pub async fn create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJob>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    tracing::info!("Creating job: {}", req.name);

    let job = job_service::create_job(&state.jobs, req)?;

    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /api/jobs
/// List all jobs in creation order
pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<Job>> {
    tracing::debug!("Listing jobs");

    Json(job_service::list_jobs(&state.jobs))
}

/// GET /api/jobs/{name}
/// Get a job by name
pub async fn get_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Job>> {
    tracing::debug!("Getting job: {}", name);

    let job = job_service::get_job(&state.jobs, &name)?;
    Ok(Json(job))
}

/// DELETE /api/jobs/{name}
/// Delete a job that is not building
pub async fn delete_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting job: {}", name);

    job_service::delete_job(&state.runner, &name)?;
    Ok(StatusCode::NO_CONTENT)
}
