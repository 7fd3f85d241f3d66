//! Error types for broadside

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === Peer Errors ===
    #[error("Peer {peer} unreachable: {reason}")]
    Unreachable { peer: String, reason: String },

    #[error("Stale authority from {address} (rank {rank})")]
    StaleAuthority { address: String, rank: i64 },

    // === Session Errors ===
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Invalid move: {0}")]
    InvalidMove(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // === Storage Errors ===
    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Wire tag carried in error-shaped responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unreachable,
    StaleAuthority,
    NotFound,
    InvalidMove,
    InvalidRequest,
    Internal,
}

/// Body of every non-2xx RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: ErrorKind,
}

impl Error {
    pub fn unreachable(peer: impl Into<String>, reason: impl ToString) -> Self {
        Error::Unreachable {
            peer: peer.into(),
            reason: reason.to_string(),
        }
    }

    /// Peer failures are never fatal; callers treat them as absence.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Error::Unreachable { .. })
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Unreachable { .. } => ErrorKind::Unreachable,
            Error::StaleAuthority { .. } => ErrorKind::StaleAuthority,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::InvalidMove(_) => ErrorKind::InvalidMove,
            Error::InvalidRequest(_) | Error::InvalidConfig(_) => ErrorKind::InvalidRequest,
            _ => ErrorKind::Internal,
        }
    }

    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidMove(_) => StatusCode::CONFLICT,
            Error::InvalidRequest(_) | Error::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            Error::StaleAuthority { .. } => StatusCode::PRECONDITION_FAILED,
            Error::Unreachable { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Rebuild an error from a decoded error-shaped response.
    pub fn from_body(peer: &str, body: ErrorBody) -> Self {
        match body.kind {
            ErrorKind::NotFound => Error::NotFound(strip_prefix(&body.error, "Session not found: ")),
            ErrorKind::InvalidMove => Error::InvalidMove(strip_prefix(&body.error, "Invalid move: ")),
            ErrorKind::InvalidRequest => {
                Error::InvalidRequest(strip_prefix(&body.error, "Invalid request: "))
            }
            ErrorKind::Unreachable => Error::unreachable(peer, body.error),
            ErrorKind::StaleAuthority | ErrorKind::Internal => Error::Http(body.error),
        }
    }
}

fn strip_prefix(message: &str, prefix: &str) -> String {
    message.strip_prefix(prefix).unwrap_or(message).to_string()
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.to_http_status();
        if status.is_server_error() {
            tracing::error!("RPC handler failed: {}", self);
        }
        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_is_classified() {
        let err = Error::unreachable("http://a:1", "connection refused");
        assert!(err.is_unreachable());
        assert_eq!(err.to_http_status(), StatusCode::BAD_GATEWAY);
        assert!(!Error::NotFound("x".into()).is_unreachable());
    }

    #[test]
    fn test_body_round_trip_keeps_kind() {
        let err = Error::InvalidMove("cell (0, 0) already targeted".into());
        let body = ErrorBody {
            error: err.to_string(),
            kind: err.kind(),
        };
        match Error::from_body("http://a:1", body) {
            Error::InvalidMove(reason) => assert_eq!(reason, "cell (0, 0) already targeted"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::NotFound("s".into()).to_http_status(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::InvalidRequest("empty name".into()).to_http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Internal("boom".into()).to_http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
