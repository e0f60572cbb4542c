//! Kiln HTTP Client
//!
//! A simple, type-safe HTTP client for the Kiln orchestrator API.
//!
//! # Example
//!
//! ```no_run
//! use kiln_client::KilnClient;
//! use kiln_core::dto::job::CreateJob;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = KilnClient::new("http://localhost:8080");
//!
//!     client.create_job(CreateJob::named("Deploy-1")).await?;
//!     let report = client.run_build("Deploy-1", None).await?;
//!
//!     println!("Deploy-1 finished: {}", report.outcome);
//!     Ok(())
//! }
//! ```

pub mod error;
mod builds;
mod jobs;

// Re-export commonly used types
pub use error::{ClientError, Result};

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

/// HTTP client for the Kiln orchestrator API
///
/// Methods are grouped into:
/// - Job management (create, list, get, delete)
/// - Builds (run, start detached, cancel, console)
/// - Build history
#[derive(Debug, Clone)]
pub struct KilnClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl KilnClient {
    /// Create a new client
    ///
    /// # Example
    /// ```
    /// use kiln_client::KilnClient;
    ///
    /// let client = KilnClient::new("http://localhost:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build an endpoint URL from path segments
    ///
    /// Segments are percent-encoded, so job names may contain spaces,
    /// slashes or other reserved characters.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::InvalidRequest(format!("invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::InvalidRequest(format!("base URL cannot have a path: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        tracing::debug!("{} -> {}", response.url(), status);

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content (e.g., DELETE operations)
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();
        tracing::debug!("{} -> {}", response.url(), status);

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = KilnClient::new("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_url_encodes_job_names() {
        let client = KilnClient::new("http://localhost:8080");
        let url = client.url(&["api", "jobs", "Convert batch/1", "run"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/jobs/Convert%20batch%2F1/run"
        );
    }

    #[test]
    fn test_url_keeps_base_path() {
        let client = KilnClient::new("http://ci.internal/kiln/");
        let url = client.url(&["api", "jobs"]).unwrap();
        assert_eq!(url.as_str(), "http://ci.internal/kiln/api/jobs");
    }

    #[test]
    fn test_invalid_base_url() {
        let client = KilnClient::new("localhost:8080");
        assert!(matches!(
            client.url(&["health"]),
            Err(ClientError::InvalidRequest(_))
        ));
    }
}
