//! Unified error handling for the HTTP API.
//!
//! Handlers return [`ApiError`] and use `?` on engine results; the status
//! code for every [`CalSyncError`] kind is decided here and nowhere else.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use calsync_domain::CalSyncError;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable machine-readable label, see [`CalSyncError::kind`].
    pub kind: &'static str,
}

/// Unified error type for API handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Failure reported by the sync engine or its adapters
    #[error(transparent)]
    Sync(#[from] CalSyncError),

    /// Malformed request (missing header, bad body)
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Sync(err) => status_for(err),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Sync(err) => err.kind(),
        }
    }
}

fn status_for(err: &CalSyncError) -> StatusCode {
    match err {
        CalSyncError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        CalSyncError::AccessRevoked(_) => StatusCode::UNAUTHORIZED,
        CalSyncError::NotFound(_)
        | CalSyncError::ChannelDoesNotExist(_)
        | CalSyncError::NoWatchesForUser(_) => StatusCode::NOT_FOUND,
        CalSyncError::CalendarWatchExists(_) => StatusCode::CONFLICT,
        CalSyncError::Network(_)
        | CalSyncError::NoResourceId(_)
        | CalSyncError::SyncTokenInvalid(_)
        | CalSyncError::StopFailed(_)
        | CalSyncError::Provider(_) => StatusCode::BAD_GATEWAY,
        CalSyncError::Database(_) | CalSyncError::Config(_) | CalSyncError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();

        if status.is_server_error() {
            error!(kind, error = %self, "request failed");
        } else {
            warn!(kind, error = %self, "request rejected");
        }

        let body = Json(ErrorResponse { error: self.to_string(), kind });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_statuses() {
        let cases = [
            (CalSyncError::AccessRevoked("invalid_grant".into()), StatusCode::UNAUTHORIZED),
            (CalSyncError::NotFound("resource".into()), StatusCode::NOT_FOUND),
            (CalSyncError::NoWatchesForUser("u1".into()), StatusCode::NOT_FOUND),
            (CalSyncError::CalendarWatchExists("primary".into()), StatusCode::CONFLICT),
            (CalSyncError::Provider("HTTP 503".into()), StatusCode::BAD_GATEWAY),
            (CalSyncError::Database("locked".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn bad_request_has_own_kind() {
        let err = ApiError::bad_request("missing header");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.kind(), "bad_request");
        assert_eq!(err.to_string(), "Invalid request: missing header");
    }
}
