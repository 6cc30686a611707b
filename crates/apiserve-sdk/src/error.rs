//! Error types for the apiserve SDK.

use apiserve_domain::ApiError;
use thiserror::Error;

/// Client call errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection error (network, DNS, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Transport-level failure, or an error response without an `ApiError` body
    #[error("HTTP error: {0}")]
    Http(String),

    /// Structured error returned by the server
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Response body did not match the expected type
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            ClientError::Connection(e.to_string())
        } else {
            ClientError::Http(e.to_string())
        }
    }
}

impl ClientError {
    /// The server's error, if the call reached the method
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            ClientError::Api(err) => Some(err),
            _ => None,
        }
    }
}
