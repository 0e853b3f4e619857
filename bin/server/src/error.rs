//! HTTP-facing error type.
//!
//! Each variant maps to one status code; the body is `{"error": "<message>"}`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;

/// Errors returned by the intake routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The path names no known trigger kind.
    UnknownTrigger { kind: String },
    /// The trigger payload is not a JSON object.
    InvalidPayload,
    /// The execution id does not parse.
    InvalidExecutionId { id: String },
    /// No execution record with this id.
    ExecutionNotFound { id: String },
    /// The workflow definition failed validation.
    InvalidWorkflow { reason: String },
    /// A backing service failed.
    Internal { details: String },
}

impl ApiError {
    /// The response status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnknownTrigger { .. } | Self::ExecutionNotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidPayload | Self::InvalidExecutionId { .. } => StatusCode::BAD_REQUEST,
            Self::InvalidWorkflow { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTrigger { kind } => write!(f, "unknown trigger kind '{kind}'"),
            Self::InvalidPayload => write!(f, "trigger payload must be a JSON object"),
            Self::InvalidExecutionId { id } => write!(f, "invalid execution id '{id}'"),
            Self::ExecutionNotFound { id } => write!(f, "execution '{id}' not found"),
            Self::InvalidWorkflow { reason } => write!(f, "invalid workflow: {reason}"),
            Self::Internal { details } => write!(f, "internal error: {details}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        // Internal details stay in the logs.
        let message = match &self {
            Self::Internal { .. } => "internal error".to_string(),
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            ApiError::UnknownTrigger {
                kind: "x".to_string()
            }
            .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::InvalidPayload.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::InvalidWorkflow {
                reason: "workflow name is empty".to_string()
            }
            .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let response = ApiError::Internal {
            details: "connection refused".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
