//! Error types for job store operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or persisting the job list.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("IO error on job list {path}: {source}")]
    Io {
        /// The job list file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The backing file is not a valid JSON job list.
    #[error(
        "invalid job list {path}: {source}\n  Suggestion: Expected a JSON array of {{\"url\", \"dest\", \"state\"?}} objects"
    )]
    Parse {
        /// The job list file.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a parse error.
    pub fn parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }
}
