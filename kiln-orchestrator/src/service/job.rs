//! Job Service
//!
//! Business logic for job management.

use kiln_core::domain::job::Job;
use kiln_core::dto::job::CreateJob;
use thiserror::Error;

use super::runner::BuildRunner;
use crate::repository::{JobStore, StoreError};

/// Service error type
#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid job name: {0}")]
    InvalidName(&'static str),

    #[error("job '{0}' has a build in progress")]
    Busy(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, JobError>;

/// Create a new Idle job
pub fn create_job(jobs: &JobStore, mut req: CreateJob) -> Result<Job> {
    validate_create_request(&mut req)?;

    let job = jobs.create(req)?;
    Ok(job)
}

/// Get a job by name
pub fn get_job(jobs: &JobStore, name: &str) -> Result<Job> {
    jobs.get(name)
        .ok_or_else(|| JobError::Store(StoreError::NotFound(name.to_string())))
}

/// List all jobs in creation order
pub fn list_jobs(jobs: &JobStore) -> Vec<Job> {
    jobs.list()
}

/// Delete a job that is not currently building
///
/// The job's build history stays in the build log.
pub fn delete_job(runner: &BuildRunner, name: &str) -> Result<Job> {
    let _claim = runner
        .claim_idle(name)
        .map_err(|_| JobError::Busy(name.to_string()))?;

    let job = runner.jobs().delete(name)?;
    runner.consoles().remove(name);
    Ok(job)
}

fn validate_create_request(req: &mut CreateJob) -> Result<()> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(JobError::InvalidName("must not be empty"));
    }
    if name.chars().any(char::is_control) {
        return Err(JobError::InvalidName("must not contain control characters"));
    }
    req.name = name.to_string();

    if let Some(group) = req.group.as_mut() {
        *group = group.trim().to_string();
    }
    req.group = req.group.take().filter(|g| !g.is_empty());

    Ok(())
}
