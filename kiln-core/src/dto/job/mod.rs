//! Job DTOs

use serde::{Deserialize, Serialize};

use crate::domain::job::{Job, PluginSettings};

/// Request to create a new job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    pub name: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub plugins: Vec<PluginSettings>,
}

impl CreateJob {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: None,
            plugins: Vec::new(),
        }
    }

    /// Builds the Idle job this request describes
    pub fn into_job(self) -> Job {
        Job {
            group: self.group,
            plugins: self.plugins,
            ..Job::new(self.name)
        }
    }
}

/// Request to run a build of an existing job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunBuildRequest {
    /// Overrides the orchestrator's default for the email-notify action
    #[serde(default)]
    pub notify: Option<bool>,
    /// Return as soon as the job is Running instead of waiting for the outcome
    #[serde(default)]
    pub detach: bool,
}
