//! API error handling for consistent JSON error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::recorder::RecorderError;

/// API error type that converts to JSON responses.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": true,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<RecorderError> for ApiError {
    fn from(err: RecorderError) -> Self {
        let status = match &err {
            // A full pool is a deferred-start state, not a fault; the
            // client is expected to go through the admission queue.
            RecorderError::AdmissionFull => StatusCode::TOO_MANY_REQUESTS,
            RecorderError::QueueEntryNotFound | RecorderError::SessionNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            RecorderError::SessionConflict(..) => StatusCode::CONFLICT,
            RecorderError::BrowserLaunch(_)
            | RecorderError::NavigationTimeout
            | RecorderError::ReadinessTimeout
            | RecorderError::StopFlushTimeout => StatusCode::BAD_GATEWAY,
            RecorderError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_recorder_errors_to_statuses() {
        let cases = [
            (RecorderError::AdmissionFull, StatusCode::TOO_MANY_REQUESTS),
            (
                RecorderError::SessionNotFound("audio/x".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                RecorderError::SessionConflict("audio/x".to_string(), "starting"),
                StatusCode::CONFLICT,
            ),
            (RecorderError::ReadinessTimeout, StatusCode::BAD_GATEWAY),
        ];

        for (err, expected) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status, expected);
        }
    }
}
