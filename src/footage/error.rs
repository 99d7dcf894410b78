use thiserror::Error;

use crate::protect::ProtectError;

/// Typed fetch errors enabling retry classification.
///
/// `is_retryable()` separates transient failures (server errors, rate
/// limits, dropped connections) from permanent ones (disk, auth, full
/// filesystem) so the retry loop can give up early.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error {status} exporting {segment}")]
    HttpStatus { status: u16, segment: String },

    #[error("Session rejected by server exporting {0}")]
    Unauthorized(String),

    #[error("HTTP error exporting {segment} (bytes_so_far={bytes_written}): {source}")]
    Http {
        source: reqwest::Error,
        segment: String,
        bytes_written: u64,
    },

    #[error("Disk error: {0}")]
    Disk(#[from] std::io::Error),

    #[error("Destination is {used_percent}% full, limit is {max_usage}%")]
    DiskUsage { used_percent: u8, max_usage: u8 },

    #[error("Giving up on {segment} after {retries} retries: {last_error}")]
    RetriesExhausted {
        retries: u32,
        segment: String,
        last_error: String,
    },

    #[error(transparent)]
    Protect(#[from] ProtectError),
}

impl FetchError {
    /// Whether this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            FetchError::Http { .. } => true,
            FetchError::Unauthorized(_) => false,
            FetchError::Disk(_) => false,
            FetchError::DiskUsage { .. } => false,
            FetchError::RetriesExhausted { .. } => false,
            FetchError::Protect(_) => false,
        }
    }
}
