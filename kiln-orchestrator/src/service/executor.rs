//! Build executors
//!
//! The runner suspends on a [`BuildExecutor`] while a build is in progress.
//! The orchestrator ships a [`SimulatedExecutor`] that waits a configured
//! duration; tests substitute their own.

use async_trait::async_trait;
use kiln_core::domain::job::Job;
use std::time::Duration;

use super::console::ConsoleLog;

/// Result of the build work itself, before post-build handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    Success,
    Failure { reason: String },
}

impl ExecutionResult {
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success)
    }
}

/// Performs the work of one build
#[async_trait]
pub trait BuildExecutor: Send + Sync {
    /// Runs the build for `job`, writing progress to `console`
    async fn execute(&self, job: &Job, console: &ConsoleLog) -> ExecutionResult;
}

/// Waits for a fixed duration, then succeeds unless the job name contains
/// the failure marker.
#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    duration: Duration,
    failure_marker: Option<String>,
}

impl SimulatedExecutor {
    pub fn new(duration: Duration, failure_marker: Option<String>) -> Self {
        Self {
            duration,
            failure_marker: failure_marker.filter(|m| !m.is_empty()),
        }
    }

    fn fails(&self, job: &Job) -> bool {
        self.failure_marker
            .as_deref()
            .is_some_and(|marker| job.name.contains(marker))
    }
}

#[async_trait]
impl BuildExecutor for SimulatedExecutor {
    async fn execute(&self, job: &Job, console: &ConsoleLog) -> ExecutionResult {
        console.debug(format!("Simulating build for {:?}", self.duration));
        tokio::time::sleep(self.duration).await;

        if self.fails(job) {
            ExecutionResult::failure(format!("job name matches failure marker in {}", job.name))
        } else {
            ExecutionResult::Success
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failure_marker_decides_outcome() {
        let executor = SimulatedExecutor::new(Duration::ZERO, Some("Test".into()));
        let console = ConsoleLog::new();

        assert!(executor.execute(&Job::new("Deploy-1"), &console).await.is_success());
        assert!(!executor.execute(&Job::new("Test-Suite"), &console).await.is_success());
    }

    #[tokio::test]
    async fn test_empty_marker_never_fails() {
        for marker in [None, Some(String::new())] {
            let executor = SimulatedExecutor::new(Duration::ZERO, marker);
            let result = executor.execute(&Job::new("Test-Suite"), &ConsoleLog::new()).await;
            assert_eq!(result, ExecutionResult::Success);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_configured_duration() {
        let executor = SimulatedExecutor::new(Duration::from_secs(3), None);
        let started = tokio::time::Instant::now();
        executor.execute(&Job::new("Deploy-1"), &ConsoleLog::new()).await;
        assert!(started.elapsed() >= Duration::from_secs(3));
    }
}
