//! Job-related API endpoints

use crate::KilnClient;
use crate::error::Result;
use kiln_core::domain::job::Job;
use kiln_core::dto::job::CreateJob;

impl KilnClient {
    // =============================================================================
    // Job Management
    // =============================================================================

    /// Create a new job
    ///
    /// Fails with status 409 if a job with that name already exists.
    pub async fn create_job(&self, req: CreateJob) -> Result<Job> {
        let url = self.url(&["api", "jobs"])?;
        let response = self.client.post(url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// List all jobs in creation order
    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        let url = self.url(&["api", "jobs"])?;
        let response = self.client.get(url).send().await?;

        self.handle_response(response).await
    }

    /// Get a job by name
    pub async fn get_job(&self, name: &str) -> Result<Job> {
        let url = self.url(&["api", "jobs", name])?;
        let response = self.client.get(url).send().await?;

        self.handle_response(response).await
    }

    /// Delete a job
    ///
    /// Its build history is kept. Fails with status 409 while it is building.
    pub async fn delete_job(&self, name: &str) -> Result<()> {
        let url = self.url(&["api", "jobs", name])?;
        let response = self.client.delete(url).send().await?;

        self.handle_empty_response(response).await
    }
}
