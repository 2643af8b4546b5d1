//! Error types for the campaign engine.
//!
//! Only campaign-level problems are errors. Anything scoped to a single
//! instance is folded into that instance's snapshot as degraded data and a
//! [`WarningRecord`](crate::data::WarningRecord) instead.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort a whole poll cycle.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The campaign root does not exist or is not a directory.
    #[error("campaign root not found: {}", .0.display())]
    RootNotFound(PathBuf),

    /// The campaign root exists but could not be listed.
    #[error("campaign root unreadable: {}: {source}", path.display())]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Discovery found neither a status file nor any instance directory.
    #[error("no fuzzer instances found in {}", .0.display())]
    NoInstancesDiscovered(PathBuf),

    /// The cycle was asked to stop before all instances were built.
    #[error("poll cycle cancelled")]
    Cancelled,
}

/// Failures reading a single status file.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("status file missing: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("status file unreadable: {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StatusError {
    pub(crate) fn from_io(path: PathBuf, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            StatusError::MissingFile(path)
        } else {
            StatusError::Unreadable { path, source }
        }
    }
}

/// Failures loading or saving the persisted delta state.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("could not lock state file {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file exists but does not decode; callers treat this as no state.
    #[error("persisted state is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),

    #[error("could not encode state: {0}")]
    Encode(#[source] serde_json::Error),
}
