//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services sit between the HTTP handlers and the repositories.

pub mod build;
pub mod console;
pub mod executor;
pub mod job;
pub mod runner;

// Re-export for convenience
pub use build as build_service;
pub use job as job_service;
pub use runner::{BuildError, BuildHandle, BuildRunner, RunnerSettings};
