//! Build-related API endpoints

use crate::KilnClient;
use crate::error::Result;
use kiln_core::domain::build::BuildRecord;
use kiln_core::domain::job::Job;
use kiln_core::domain::log::LogEntry;
use kiln_core::dto::build::BuildReport;
use kiln_core::dto::job::RunBuildRequest;

impl KilnClient {
    // =============================================================================
    // Builds
    // =============================================================================

    /// Run a build and wait for its report
    ///
    /// # Arguments
    /// * `name` - The job to build
    /// * `notify` - Overrides the orchestrator's email notification default
    pub async fn run_build(&self, name: &str, notify: Option<bool>) -> Result<BuildReport> {
        let url = self.url(&["api", "jobs", name, "run"])?;
        let req = RunBuildRequest {
            notify,
            detach: false,
        };
        let response = self.client.post(url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// Start a build without waiting for it
    ///
    /// # Returns
    /// The job in its `Running` state
    pub async fn start_build(&self, name: &str, notify: Option<bool>) -> Result<Job> {
        let url = self.url(&["api", "jobs", name, "run"])?;
        let req = RunBuildRequest {
            notify,
            detach: true,
        };
        let response = self.client.post(url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// Cancel the job's in-flight build
    pub async fn cancel_build(&self, name: &str) -> Result<()> {
        let url = self.url(&["api", "jobs", name, "cancel"])?;
        let response = self.client.post(url).send().await?;

        self.handle_empty_response(response).await
    }

    /// Console lines of the job's latest build
    pub async fn get_console(&self, name: &str) -> Result<Vec<LogEntry>> {
        let url = self.url(&["api", "jobs", name, "console"])?;
        let response = self.client.get(url).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Build History
    // =============================================================================

    /// List build records in completion order, optionally for one job
    pub async fn list_build_history(&self, job: Option<&str>) -> Result<Vec<BuildRecord>> {
        let url = self.url(&["api", "builds"])?;
        let mut request = self.client.get(url);
        if let Some(job) = job {
            request = request.query(&[("job", job)]);
        }
        let response = request.send().await?;

        self.handle_response(response).await
    }
}
