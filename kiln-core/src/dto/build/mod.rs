//! Build DTOs

use serde::{Deserialize, Serialize};

use crate::domain::build::BuildOutcome;
use crate::domain::timestamp::{self, Timestamp};

/// Result of a completed build, returned to whoever requested it
///
/// `issues` lists failures that were reported but did not change the outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub job_name: String,
    pub outcome: BuildOutcome,
    #[serde(with = "timestamp::required")]
    pub finished_at: Timestamp,
    #[serde(default)]
    pub issues: Vec<BuildIssue>,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// A non-fatal failure observed while finishing a build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildIssue {
    pub kind: IssueKind,
    /// Plugin id for plugin failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    /// Saving the job mapping failed
    Persistence,
    /// Appending to the build history failed
    BuildLog,
    /// A post-build action failed
    Plugin,
}

/// Query parameters for the build history listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub job: Option<String>,
}
