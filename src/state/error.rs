//! Error types for the state module.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing the statefile.
#[derive(Error, Debug)]
pub enum StateError {
    /// The statefile exists but does not parse. Never silently replaced:
    /// the operator has to fix or delete it.
    #[error("State file {path} is corrupt: {source}. Fix or delete it to continue")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The statefile exists but could not be read.
    #[error("Failed to read state file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The snapshot could not be written or moved into place.
    #[error("Failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The snapshot could not be serialized.
    #[error("Failed to serialize sync state: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StateError {
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}
