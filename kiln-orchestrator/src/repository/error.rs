//! Storage errors

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by the job store and the build log
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job '{0}' already exists")]
    DuplicateName(String),

    #[error("job '{0}' not found")]
    NotFound(String),

    #[error("I/O failure on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize job mapping: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("build log failure on {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}
