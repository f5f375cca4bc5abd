//! Push and HTTP error types.

use std::time::Duration;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use beacon_core::{SensorId, StoreError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failure reported by the push subsystem.
#[derive(Debug, Error)]
pub enum PushError {
    /// The sensor does not exist. Reported before any upgrade.
    #[error("sensor {0} not found")]
    SensorNotFound(SensorId),
    /// The sensor lookup failed for another reason.
    #[error("sensor lookup failed: {0}")]
    Lookup(#[source] StoreError),
    /// Shutdown hit its bound with closes still pending.
    #[error("shutdown timed out after {timeout:?} with {outstanding} connection(s) still closing")]
    ShutdownTimeout {
        /// The bound that was hit.
        timeout: Duration,
        /// Closes that had not finished.
        outstanding: usize,
    },
}

/// Error returned by an HTTP handler.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The sensor id path segment is not an integer.
    #[error("invalid sensor id")]
    InvalidSensorId,
    /// The user id path segment is not an integer.
    #[error("invalid user id")]
    InvalidUserId,
    /// A query timestamp is not RFC 3339.
    #[error("invalid {0}: expected an RFC 3339 timestamp")]
    InvalidTimestamp(&'static str),
    /// The request body could not be decoded.
    #[error("invalid request body: {0}")]
    InvalidBody(#[from] JsonRejection),
    /// New push streams are no longer accepted.
    #[error("server is shutting down")]
    ShuttingDown,
    /// Store or validation failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Push subsystem failure.
    #[error(transparent)]
    Push(#[from] PushError),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidSensorId | Self::InvalidUserId | Self::InvalidTimestamp(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::InvalidBody(rejection) => rejection.status(),
            Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store(e) => match e {
                StoreError::SensorNotFound
                | StoreError::UserNotFound
                | StoreError::EventNotFound => StatusCode::NOT_FOUND,
                StoreError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
                StoreError::DuplicateSerial(_) => StatusCode::CONFLICT,
                StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Push(e) => match e {
                PushError::SensorNotFound(_) => StatusCode::NOT_FOUND,
                PushError::Lookup(_) | PushError::ShutdownTimeout { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let reason = if status.is_server_error() {
            error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "reason": reason }))).into_response()
    }
}
