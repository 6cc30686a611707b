//! Structured error codes carried to callers
//!
//! An [`ApiError`] is what an implementation returns when a call fails. It is
//! serialized verbatim as the response body; its code also selects the HTTP
//! status.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shape::{Field, Shape, Shaped};

/// Structured error with a numeric code and a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("code: {code}, message: {message}")]
pub struct ApiError {
    /// Error code; HTTP-range codes double as the response status
    pub code: i32,
    /// Human-readable message
    pub message: String,
}

impl ApiError {
    /// Schema name of the error envelope in the API document
    pub const SCHEMA_NAME: &'static str = "ApiError";

    /// Create an error with an explicit code
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// 400
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    /// 401
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(401, message)
    }

    /// 403
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(403, message)
    }

    /// 404
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    /// 500
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }

    /// Wrap any other error as a 500
    pub fn from_error<E: std::fmt::Display>(err: E) -> Self {
        Self::internal(err.to_string())
    }

    /// HTTP status selected by the code: any valid HTTP code maps to
    /// itself, everything else to 500
    pub fn http_status(&self) -> u16 {
        match self.code {
            100..=599 => self.code as u16,
            _ => 500,
        }
    }
}

impl Default for ApiError {
    fn default() -> Self {
        Self::internal("")
    }
}

impl Shaped for ApiError {
    fn shape() -> Shape {
        Shape::object::<Self>(Self::SCHEMA_NAME, || {
            vec![
                Field::new::<i32>("code").description("Error code, also used as the HTTP status"),
                Field::new::<String>("message").description("Error message"),
            ]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_table() {
        assert_eq!(ApiError::new(400, "x").http_status(), 400);
        assert_eq!(ApiError::new(404, "x").http_status(), 404);
        assert_eq!(ApiError::new(503, "x").http_status(), 503);
        assert_eq!(ApiError::new(302, "x").http_status(), 302);
        assert_eq!(ApiError::new(0, "x").http_status(), 500);
        assert_eq!(ApiError::new(10001, "x").http_status(), 500);
        assert_eq!(ApiError::new(-1, "x").http_status(), 500);
    }

    #[test]
    fn test_serialized_envelope() {
        let json = serde_json::to_value(ApiError::not_found("missing")).unwrap();
        assert_eq!(json, serde_json::json!({ "code": 404, "message": "missing" }));
    }

    #[test]
    fn test_from_error_is_internal() {
        let err = ApiError::from_error(std::io::Error::other("disk gone"));
        assert_eq!(err.code, 500);
        assert_eq!(err.message, "disk gone");
    }
}
