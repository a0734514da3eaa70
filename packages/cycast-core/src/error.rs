//! Centralized error types for the Cycast core library.
//!
//! Mirrors the taxonomy in the specification: configuration errors abort
//! startup, auth/protocol errors surface to the source connection as an HTTP
//! status, and I/O errors close the owning resource without crashing the
//! process.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

/// Application-wide error type for the Cycast server.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum CycastError {
    /// Invalid configuration (bad ports, missing password, out-of-range buffer size).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source connection failed Basic auth.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Source connection sent a malformed or unsupported handshake.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Socket or file I/O failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// Unrecoverable internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ErrorCode for CycastError {
    fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Auth(_) => "auth_error",
            Self::Protocol(_) => "protocol_error",
            Self::Io(_) => "io_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl CycastError {
    /// Maps the error to an appropriate HTTP status code.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Protocol(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type CycastResult<T> = Result<T, CycastError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for CycastError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for CycastError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_maps_to_401() {
        let err = CycastError::Auth("bad password".into());
        assert_eq!(err.code(), "auth_error");
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn protocol_error_maps_to_405() {
        let err = CycastError::Protocol("unsupported method".into());
        assert_eq!(err.code(), "protocol_error");
        assert_eq!(err.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn config_error_maps_to_503() {
        let err = CycastError::Config("missing password".into());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
