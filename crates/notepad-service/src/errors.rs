//! Notepad service error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse` impl.
//! Infrastructure details (store errors, transport errors) are logged
//! server-side and replaced by a generic message in the response body. A
//! pad host's own rejection message is the one detail surfaced to callers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Notepad service error type.
///
/// Maps to HTTP status codes:
/// - NoHostsConfigured, NoLiveHost: 503 Service Unavailable
/// - HostNotFound: 404 Not Found
/// - RemoteRejected, RemoteUnreachable, RemoteProtocol: 502 Bad Gateway
/// - Store, Metadata, Internal: 500 Internal Server Error
/// - BadRequest: 400 Bad Request
#[derive(Debug, Error)]
pub enum NotepadError {
    /// The host registry is empty. Not retried.
    #[error("Need at least one shared notepad host")]
    NoHostsConfigured,

    /// Every configured host failed its liveness probe.
    #[error("No active shared notepad host found")]
    NoLiveHost,

    #[error("Pad host not found: {0}")]
    HostNotFound(String),

    /// The host answered with a nonzero envelope code; carries its message.
    #[error("Pad host rejected request: {0}")]
    RemoteRejected(String),

    /// Transport failure, timeout, or non-2xx HTTP status.
    #[error("Pad host unreachable: {0}")]
    RemoteUnreachable(String),

    /// The response body was not a valid envelope.
    #[error("Pad host protocol error: {0}")]
    RemoteProtocol(String),

    #[error("Shared store error: {0}")]
    Store(String),

    #[error("Room metadata error: {0}")]
    Metadata(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal,
}

impl NotepadError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            NotepadError::NoHostsConfigured | NotepadError::NoLiveHost => 503,
            NotepadError::HostNotFound(_) => 404,
            NotepadError::RemoteRejected(_)
            | NotepadError::RemoteUnreachable(_)
            | NotepadError::RemoteProtocol(_) => 502,
            NotepadError::Store(_) | NotepadError::Metadata(_) | NotepadError::Internal => 500,
            NotepadError::BadRequest(_) => 400,
        }
    }

    /// Bounded label for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            NotepadError::NoHostsConfigured => "no_hosts_configured",
            NotepadError::NoLiveHost => "no_live_host",
            NotepadError::HostNotFound(_) => "host_not_found",
            NotepadError::RemoteRejected(_) => "remote_rejected",
            NotepadError::RemoteUnreachable(_) => "remote_unreachable",
            NotepadError::RemoteProtocol(_) => "remote_protocol",
            NotepadError::Store(_) => "store",
            NotepadError::Metadata(_) => "metadata",
            NotepadError::BadRequest(_) => "bad_request",
            NotepadError::Internal => "internal",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for NotepadError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            NotepadError::NoHostsConfigured => (
                StatusCode::SERVICE_UNAVAILABLE,
                "NOT_CONFIGURED",
                "Shared notepad is not configured".to_string(),
            ),
            NotepadError::NoLiveHost => (
                StatusCode::SERVICE_UNAVAILABLE,
                "NO_LIVE_HOST",
                "No shared notepad host is available".to_string(),
            ),
            NotepadError::HostNotFound(host_id) => (
                StatusCode::NOT_FOUND,
                "HOST_NOT_FOUND",
                format!("Unknown pad host: {host_id}"),
            ),
            NotepadError::RemoteRejected(message) => {
                (StatusCode::BAD_GATEWAY, "REMOTE_REJECTED", message.clone())
            }
            NotepadError::RemoteUnreachable(reason) | NotepadError::RemoteProtocol(reason) => {
                tracing::warn!(target: "np.errors", reason = %reason, "Pad host call failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "REMOTE_UNAVAILABLE",
                    "Pad host is unavailable".to_string(),
                )
            }
            NotepadError::Store(err) => {
                tracing::error!(target: "np.errors", error = %err, "Shared store operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_ERROR",
                    "An internal storage error occurred".to_string(),
                )
            }
            NotepadError::Metadata(err) => {
                tracing::error!(target: "np.errors", error = %err, "Room metadata operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "METADATA_ERROR",
                    "Room metadata could not be updated".to_string(),
                )
            }
            NotepadError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            NotepadError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<redis::RedisError> for NotepadError {
    fn from(err: redis::RedisError) -> Self {
        NotepadError::Store(err.to_string())
    }
}
