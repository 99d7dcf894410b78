use thiserror::Error;

/// Errors talking to a UniFi Protect server.
#[derive(Debug, Error)]
pub enum ProtectError {
    #[error("Login to {address} failed (HTTP {status}): check username and password")]
    Login { address: String, status: u16 },

    #[error("Protect API returned HTTP {status} for {endpoint}")]
    Status { status: u16, endpoint: String },

    #[error("Login response from {0} carried no session token")]
    MissingToken(String),

    #[error("Invalid header value received from server: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

