// Error handling module for Page Gate
//
// This module defines error types and conversions used across the crate

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::io;
use std::result;
use thiserror::Error;

/// Result type for Page Gate operations
pub type Result<T> = result::Result<T, PageGateError>;

/// Error type for Page Gate operations
#[derive(Debug, Error, Clone)]
pub enum PageGateError {
    /// Store operation did not finish within the configured timeout
    #[error("Operation timed out")]
    Timeout,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Malformed or inconsistent stored records
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite errors
    #[error("SQLite error: {0}")]
    Sqlite(String),

    /// Serialization-related errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    IO(String),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(String),
}

impl IntoResponse for PageGateError {
    fn into_response(self) -> Response {
        let status = match &self {
            PageGateError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            PageGateError::NotFound(_) => StatusCode::NOT_FOUND,
            PageGateError::Json(_) => StatusCode::BAD_REQUEST,
            PageGateError::Config(_)
            | PageGateError::Internal(_)
            | PageGateError::Storage(_)
            | PageGateError::Database(_)
            | PageGateError::Sqlite(_)
            | PageGateError::Serialization(_)
            | PageGateError::IO(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(serde_json::json!({
            "error": {
                "code": status.as_u16(),
                "message": self.to_string()
            }
        }));

        (status, body).into_response()
    }
}

impl From<rusqlite::Error> for PageGateError {
    fn from(err: rusqlite::Error) -> Self {
        PageGateError::Sqlite(err.to_string())
    }
}

impl From<io::Error> for PageGateError {
    fn from(err: io::Error) -> Self {
        PageGateError::IO(err.to_string())
    }
}

impl From<toml::ser::Error> for PageGateError {
    fn from(err: toml::ser::Error) -> Self {
        PageGateError::Serialization(format!("Failed to serialize config: {}", err))
    }
}

impl From<toml::de::Error> for PageGateError {
    fn from(err: toml::de::Error) -> Self {
        PageGateError::Config(format!("Failed to parse config: {}", err))
    }
}

impl From<serde_json::Error> for PageGateError {
    fn from(err: serde_json::Error) -> Self {
        PageGateError::Json(err.to_string())
    }
}

impl From<tokio::task::JoinError> for PageGateError {
    fn from(err: tokio::task::JoinError) -> Self {
        PageGateError::Internal(format!("Blocking task failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_error_conversion() {
        let err: PageGateError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, PageGateError::Sqlite(_)));
    }

    #[test]
    fn test_toml_parse_error_is_config_error() {
        let err: PageGateError = toml::from_str::<toml::Table>("kind = ").unwrap_err().into();
        match err {
            PageGateError::Config(msg) => assert!(msg.starts_with("Failed to parse config")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_error_status_codes() {
        let response = PageGateError::NotFound("token".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = PageGateError::Timeout.into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

        let response = PageGateError::Storage("disk".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
