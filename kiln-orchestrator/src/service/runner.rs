//! Build Runner
//!
//! Drives a job through `Idle -> Running -> {Success, Failed, Cancelled}`.
//!
//! A run claims a slot keyed by the job name before touching the job, so at
//! most one build per job is in flight. Builds of different jobs proceed in
//! parallel, capped by a semaphore. Each claimed slot carries a cancellation
//! token that [`BuildRunner::cancel`] fires.

use kiln_core::domain::build::{BuildOutcome, BuildRecord};
use kiln_core::domain::job::{Job, JobStatus};
use kiln_core::domain::timestamp;
use kiln_core::dto::build::{BuildIssue, BuildReport, IssueKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::console::{ConsoleLog, ConsoleStore};
use super::executor::{BuildExecutor, ExecutionResult};
use crate::context::BuildContext;
use crate::plugin::{PluginRegistry, PluginTarget};
use crate::repository::{BuildLog, JobStore};

/// Errors that keep a build from starting or a cancel from landing
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("job '{0}' not found")]
    NotFound(String),

    #[error("job '{0}' is already running")]
    AlreadyRunning(String),

    #[error("job '{0}' has no build in progress")]
    NotRunning(String),
}

pub type Result<T> = std::result::Result<T, BuildError>;

/// Runner limits
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Longest a single build may run before it counts as failed
    pub timeout: Duration,
    /// Builds allowed to execute at the same time across all jobs
    pub max_parallel_builds: usize,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            max_parallel_builds: 4,
        }
    }
}

/// In-flight builds keyed by job name
#[derive(Debug, Default)]
struct RunSlots {
    active: Mutex<HashMap<String, CancellationToken>>,
}

impl RunSlots {
    fn claim(self: &Arc<Self>, name: &str) -> Option<RunClaim> {
        let mut active = self.active.lock();
        if active.contains_key(name) {
            return None;
        }
        let token = CancellationToken::new();
        active.insert(name.to_string(), token.clone());
        Some(RunClaim {
            slots: Arc::clone(self),
            name: name.to_string(),
            token,
        })
    }

    fn cancel(&self, name: &str) -> bool {
        match self.active.lock().get(name) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn cancel_all(&self) -> usize {
        let active = self.active.lock();
        for token in active.values() {
            token.cancel();
        }
        active.len()
    }

    fn is_claimed(&self, name: &str) -> bool {
        self.active.lock().contains_key(name)
    }

    fn len(&self) -> usize {
        self.active.lock().len()
    }
}

/// Exclusive hold on a job name; released on drop
#[derive(Debug)]
pub struct RunClaim {
    slots: Arc<RunSlots>,
    name: String,
    token: CancellationToken,
}

impl RunClaim {
    pub fn job_name(&self) -> &str {
        &self.name
    }
}

impl Drop for RunClaim {
    fn drop(&mut self) {
        self.slots.active.lock().remove(&self.name);
    }
}

struct Inner {
    jobs: Arc<JobStore>,
    history: Arc<BuildLog>,
    plugins: Arc<PluginRegistry>,
    executor: Arc<dyn BuildExecutor>,
    consoles: Arc<ConsoleStore>,
    slots: Arc<RunSlots>,
    permits: Semaphore,
    timeout: Duration,
}

/// Runs builds against a job store and build log
#[derive(Clone)]
pub struct BuildRunner {
    inner: Arc<Inner>,
}

impl BuildRunner {
    pub fn new(
        jobs: Arc<JobStore>,
        history: Arc<BuildLog>,
        plugins: Arc<PluginRegistry>,
        executor: Arc<dyn BuildExecutor>,
        consoles: Arc<ConsoleStore>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs,
                history,
                plugins,
                executor,
                consoles,
                slots: Arc::new(RunSlots::default()),
                permits: Semaphore::new(settings.max_parallel_builds.max(1)),
                timeout: settings.timeout,
            }),
        }
    }

    /// Runs a build to completion
    pub async fn run(&self, job_name: &str, context: BuildContext) -> Result<BuildReport> {
        let handle = self.start(job_name, context)?;
        Ok(handle.finish().await)
    }

    /// Claims the job and moves it to `Running`.
    ///
    /// The `Running` state is saved before this returns. The returned handle
    /// owns the claim; call [`BuildHandle::finish`] to do the work and reach a
    /// terminal state.
    pub fn start(&self, job_name: &str, context: BuildContext) -> Result<BuildHandle> {
        let inner = &self.inner;

        if !inner.jobs.contains(job_name) {
            return Err(BuildError::NotFound(job_name.to_string()));
        }
        let claim = inner
            .slots
            .claim(job_name)
            .ok_or_else(|| BuildError::AlreadyRunning(job_name.to_string()))?;

        let mut was_running = false;
        let job = inner
            .jobs
            .update(job_name, |job| {
                if job.is_running() {
                    was_running = true;
                } else {
                    job.status = JobStatus::Running;
                }
            })
            .ok_or_else(|| BuildError::NotFound(job_name.to_string()))?;
        if was_running {
            return Err(BuildError::AlreadyRunning(job_name.to_string()));
        }

        let console = ConsoleLog::new();
        inner.consoles.attach(job_name, console.clone());
        console.info(format!("Starting build: {job_name}"));
        info!(job = %job_name, "build started");

        let mut issues = Vec::new();
        if let Err(e) = inner.jobs.persist() {
            issues.push(persistence_issue(job_name, &console, &e));
        }

        Ok(BuildHandle {
            runner: self.clone(),
            job,
            context,
            console,
            claim: Some(claim),
            issues,
        })
    }

    /// Fires the cancellation token of the job's in-flight build
    pub fn cancel(&self, job_name: &str) -> Result<()> {
        if self.inner.slots.cancel(job_name) {
            info!(job = %job_name, "build cancellation requested");
            Ok(())
        } else {
            Err(BuildError::NotRunning(job_name.to_string()))
        }
    }

    /// Cancels every in-flight build, returning how many there were
    pub fn cancel_all(&self) -> usize {
        self.inner.slots.cancel_all()
    }

    pub fn is_running(&self, job_name: &str) -> bool {
        self.inner.slots.is_claimed(job_name)
    }

    pub fn active_count(&self) -> usize {
        self.inner.slots.len()
    }

    /// Holds a job's slot without building, so nothing can start it meanwhile
    pub fn claim_idle(&self, job_name: &str) -> Result<RunClaim> {
        self.inner
            .slots
            .claim(job_name)
            .ok_or_else(|| BuildError::AlreadyRunning(job_name.to_string()))
    }

    pub fn jobs(&self) -> &Arc<JobStore> {
        &self.inner.jobs
    }

    pub fn history(&self) -> &Arc<BuildLog> {
        &self.inner.history
    }

    pub fn consoles(&self) -> &Arc<ConsoleStore> {
        &self.inner.consoles
    }

    async fn execute(&self, job: &Job, console: &ConsoleLog, token: &CancellationToken) -> BuildOutcome {
        let inner = &self.inner;

        let _permit = tokio::select! {
            biased;
            _ = token.cancelled() => return cancelled(console),
            permit = inner.permits.acquire() => match permit {
                Ok(permit) => permit,
                Err(e) => {
                    console.error(format!("Build could not start: {e}"));
                    return BuildOutcome::Failed;
                }
            },
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => cancelled(console),
            result = tokio::time::timeout(inner.timeout, inner.executor.execute(job, console)) => {
                match result {
                    Ok(ExecutionResult::Success) => BuildOutcome::Success,
                    Ok(ExecutionResult::Failure { reason }) => {
                        console.error(format!("Build failed: {reason}"));
                        BuildOutcome::Failed
                    }
                    Err(_) => {
                        warn!(job = %job.name, timeout = ?inner.timeout, "build timed out");
                        console.error(format!("Build timed out after {:?}", inner.timeout));
                        BuildOutcome::Failed
                    }
                }
            }
        }
    }
}

fn cancelled(console: &ConsoleLog) -> BuildOutcome {
    console.warning("Build cancelled");
    BuildOutcome::Cancelled
}

fn persistence_issue(job_name: &str, console: &ConsoleLog, e: &dyn std::error::Error) -> BuildIssue {
    error!(job = %job_name, error = %e, "failed to persist job state");
    console.error(format!("Failed to save job state: {e}"));
    BuildIssue {
        kind: IssueKind::Persistence,
        source: None,
        message: e.to_string(),
    }
}

/// A build that has started and holds its job's slot
///
/// Dropping a handle without finishing it records the build as cancelled.
pub struct BuildHandle {
    runner: BuildRunner,
    job: Job,
    context: BuildContext,
    console: ConsoleLog,
    claim: Option<RunClaim>,
    issues: Vec<BuildIssue>,
}

impl BuildHandle {
    /// The job as it was when the build started
    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn console(&self) -> &ConsoleLog {
        &self.console
    }

    /// Runs the build work, records the outcome and dispatches plugins.
    ///
    /// Saving, logging and plugin effects touch the filesystem, so they run
    /// on the blocking pool.
    pub async fn finish(mut self) -> BuildReport {
        let token = match &self.claim {
            Some(claim) => claim.token.clone(),
            None => CancellationToken::new(),
        };
        let outcome = self.runner.execute(&self.job, &self.console, &token).await;

        let job_name = self.job.name.clone();
        match tokio::task::spawn_blocking(move || self.complete(outcome)).await {
            Ok(report) => report,
            Err(e) => {
                error!(job = %job_name, error = %e, "build bookkeeping did not complete");
                BuildReport {
                    job_name,
                    outcome,
                    finished_at: timestamp::now(),
                    issues: vec![BuildIssue {
                        kind: IssueKind::Persistence,
                        source: None,
                        message: e.to_string(),
                    }],
                }
            }
        }
    }

    fn complete(&mut self, outcome: BuildOutcome) -> BuildReport {
        let inner = Arc::clone(&self.runner.inner);
        let name = self.job.name.clone();
        let finished_at = timestamp::now();
        let mut issues = std::mem::take(&mut self.issues);

        let apply = |job: &mut Job| {
            job.status = outcome.into();
            job.last_build = Some(finished_at);
        };
        let job = match inner.jobs.update(&name, apply) {
            Some(job) => job,
            None => {
                let mut job = self.job.clone();
                apply(&mut job);
                job
            }
        };
        if let Err(e) = inner.jobs.persist() {
            issues.push(persistence_issue(&name, &self.console, &e));
        }

        if let Err(e) = inner
            .history
            .append(&BuildRecord::new(name.clone(), outcome, finished_at))
        {
            error!(job = %name, error = %e, "failed to append build record");
            self.console.error(format!("Failed to record build: {e}"));
            issues.push(BuildIssue {
                kind: IssueKind::BuildLog,
                source: None,
                message: e.to_string(),
            });
        }

        if outcome.is_success() {
            let target = PluginTarget::new(&job, &self.context);
            for failure in inner.plugins.dispatch(&target, &self.console) {
                issues.push(BuildIssue {
                    kind: IssueKind::Plugin,
                    source: Some(failure.plugin),
                    message: failure.message,
                });
            }
        }

        self.console.info(format!("Build finished: {outcome}"));
        info!(job = %name, %outcome, issues = issues.len(), "build finished");
        self.claim = None;

        BuildReport {
            job_name: name,
            outcome,
            finished_at,
            issues,
        }
    }
}

impl Drop for BuildHandle {
    fn drop(&mut self) {
        if self.claim.is_some() {
            warn!(job = %self.job.name, "build abandoned before finishing");
            self.console.warning("Build cancelled");
            self.complete(BuildOutcome::Cancelled);
        }
    }
}
