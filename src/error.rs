//! Error types for the CGM relay

use thiserror::Error;

/// Failures of the source adapter contract.
///
/// Every variant maps to a distinct, fixed output payload so the watch
/// always receives something; see [`crate::payload::OutputPayload`].
#[derive(Error, Debug)]
pub enum FetchError {
    /// Credentials rejected by the upstream service.
    #[error("credentials rejected")]
    AuthFailure,

    /// Network request timed out.
    #[error("request timed out")]
    Timeout,

    /// Non-2xx response or malformed body.
    #[error("server error: {0}")]
    ServerError(String),

    /// Malformed URL; fails before any network call is made.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// 2xx response with zero readings. Soft error: the cycle still
    /// completes with a "data err" payload.
    #[error("no readings returned")]
    EmptyData,

    /// Catch-all for anything outside the taxonomy.
    #[error("{0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_builder() {
            FetchError::InvalidEndpoint(err.to_string())
        } else {
            FetchError::ServerError(err.to_string())
        }
    }
}

/// Application-level errors
#[derive(Error, Debug)]
pub enum CgmError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
