//! Error types for the data exchange

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use thiserror::Error;
use tracing::error;

/// Result type for data exchange operations
pub type Result<T> = std::result::Result<T, Error>;

/// Data exchange errors
#[derive(Error, Debug)]
pub enum Error {
    /// Authentication rejected the request fields
    #[error("{0}")]
    Authentication(String),

    /// Upload without a payload part
    #[error("No payload provided!")]
    MissingPayload,

    /// Download/remove without a token field
    #[error("No token provided!")]
    MissingToken,

    /// Backend refused to store the payload
    #[error("Failed to generate token for payload!")]
    TokenAllocation,

    /// Token unknown or already purged
    #[error("No data for token available: {0}")]
    UnknownToken(String),

    /// Malformed multipart body
    #[error("Failed to parse multipart form: {0}")]
    Multipart(String),

    /// Non-200 response received by the client helper
    #[error("Data exchange request '{operation}' failed with status {status}: {message}")]
    Status {
        /// Operation (upload/download/remove)
        operation: &'static str,
        /// HTTP status code
        status: u16,
        /// Message returned by the server
        message: String,
    },

    /// Response body did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// HTTP client error
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let message = self.to_string();
        error!("Data exchange request failed: {}", message);

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "error": message,
                "timestamp": Utc::now(),
            })),
        )
            .into_response()
    }
}
