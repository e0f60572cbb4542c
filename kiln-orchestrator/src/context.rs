//! Per-run build context

use serde::{Deserialize, Serialize};

/// Explicit session state handed to a build and its post-build actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildContext {
    /// Whether the email-notify action should fire on success
    pub notify: bool,
}

impl BuildContext {
    pub fn new(notify: bool) -> Self {
        Self { notify }
    }
}

impl Default for BuildContext {
    fn default() -> Self {
        Self { notify: true }
    }
}
