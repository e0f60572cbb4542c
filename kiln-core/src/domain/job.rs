//! Job domain types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::build::BuildOutcome;
use super::timestamp::{self, Timestamp};

/// Group shown for jobs created without one
pub const DEFAULT_GROUP: &str = "default";

/// A named, repeatable unit of build work
///
/// The name is the primary key and never changes after creation. `status`
/// only moves along `Idle -> Running -> {Success, Failed, Cancelled}`, and a
/// terminal job may go back to `Running` when it is built again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub status: JobStatus,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "timestamp::optional"
    )]
    pub last_build: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<PluginSettings>,
}

impl Job {
    /// A fresh, never-built job
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: JobStatus::Idle,
            last_build: None,
            group: None,
            plugins: Vec::new(),
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_plugin(mut self, plugin: PluginSettings) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn group_or_default(&self) -> &str {
        self.group.as_deref().unwrap_or(DEFAULT_GROUP)
    }

    /// Settings of a plugin explicitly enabled for this job
    pub fn plugin(&self, name: &str) -> Option<&PluginSettings> {
        self.plugins.iter().find(|p| p.name == name)
    }

    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }
}

/// Job build status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    #[default]
    Idle,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Idle => "Idle",
            JobStatus::Running => "Running",
            JobStatus::Success => "Success",
            JobStatus::Failed => "Failed",
            JobStatus::Cancelled => "Cancelled",
        }
    }

    /// Whether a run ended in this state
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<BuildOutcome> for JobStatus {
    fn from(outcome: BuildOutcome) -> Self {
        match outcome {
            BuildOutcome::Success => JobStatus::Success,
            BuildOutcome::Failed => JobStatus::Failed,
            BuildOutcome::Cancelled => JobStatus::Cancelled,
        }
    }
}

/// A post-build plugin enabled on a job, with its string settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSettings {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,
}

impl PluginSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.config.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_idle_and_never_built() {
        let job = Job::new("Deploy-1");
        assert_eq!(job.status, JobStatus::Idle);
        assert!(job.last_build.is_none());
        assert_eq!(job.group_or_default(), DEFAULT_GROUP);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Idle.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Success.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_serializes_as_plain_string() {
        let json = serde_json::to_string(&JobStatus::Running).unwrap();
        assert_eq!(json, "\"Running\"");
    }

    #[test]
    fn test_legacy_never_reads_as_absent() {
        let job: Job =
            serde_json::from_str(r#"{"name":"a","status":"Idle","last_build":"Never"}"#).unwrap();
        assert!(job.last_build.is_none());

        let json = serde_json::to_value(&job).unwrap();
        assert!(json.get("last_build").is_none());
    }

    #[test]
    fn test_plugin_lookup() {
        let job = Job::new("Nightly").with_plugin(PluginSettings::new("tts").with("voice", "en"));
        assert_eq!(job.plugin("tts").and_then(|p| p.get("voice")), Some("en"));
        assert!(job.plugin("file-move").is_none());
    }
}
