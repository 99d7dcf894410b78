use std::path::PathBuf;

use thiserror::Error;

use crate::state::StateError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid destination {path}: {reason}")]
    InvalidDestination { path: PathBuf, reason: String },

    #[error(transparent)]
    State(#[from] StateError),
}
