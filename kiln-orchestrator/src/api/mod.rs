//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod build;
pub mod error;
pub mod health;
pub mod job;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::context::BuildContext;
use crate::repository::{BuildLog, JobStore};
use crate::service::console::ConsoleStore;
use crate::service::runner::BuildRunner;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobStore>,
    pub history: Arc<BuildLog>,
    pub consoles: Arc<ConsoleStore>,
    pub runner: BuildRunner,
    /// Context used when a run request does not override it
    pub defaults: BuildContext,
}

impl AppState {
    pub fn new(runner: BuildRunner, defaults: BuildContext) -> Self {
        Self {
            jobs: Arc::clone(runner.jobs()),
            history: Arc::clone(runner.history()),
            consoles: Arc::clone(runner.consoles()),
            runner,
            defaults,
        }
    }

    pub fn context_for(&self, notify: Option<bool>) -> BuildContext {
        BuildContext {
            notify: notify.unwrap_or(self.defaults.notify),
        }
    }
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Job endpoints
        .route("/api/jobs", get(job::list_jobs).post(job::create_job))
        .route("/api/jobs/{name}", get(job::get_job).delete(job::delete_job))
        .route("/api/jobs/{name}/run", post(build::run_build))
        .route("/api/jobs/{name}/cancel", post(build::cancel_build))
        .route("/api/jobs/{name}/console", get(build::get_console))
        // Build history
        .route("/api/builds", get(build::list_builds))
        // Add state and middleware
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
