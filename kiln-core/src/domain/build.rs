//! Build domain types

use serde::{Deserialize, Serialize};
use std::fmt;

use super::timestamp::{self, Timestamp};

/// Terminal outcome of one build attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildOutcome {
    Success,
    Failed,
    Cancelled,
}

impl BuildOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildOutcome::Success => "Success",
            BuildOutcome::Failed => "Failed",
            BuildOutcome::Cancelled => "Cancelled",
        }
    }

    pub fn is_success(self) -> bool {
        self == BuildOutcome::Success
    }
}

impl fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable build-history entry
///
/// `job_name` is a weak reference: records outlive deleted jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub job_name: String,
    pub status: BuildOutcome,
    #[serde(with = "timestamp::required")]
    pub timestamp: Timestamp,
}

impl BuildRecord {
    pub fn new(job_name: impl Into<String>, status: BuildOutcome, timestamp: Timestamp) -> Self {
        Self {
            job_name: job_name.into(),
            status,
            timestamp,
        }
    }
}
