//! HTTP error mapping.
//!
//! # Responsibility
//! - Translate tree service errors into status codes and JSON bodies.
//! - Log every failure once, at the API boundary.
//!
//! # Invariants
//! - Every error response carries an `error` field.
//! - Only validation and internal errors carry `details`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use log::{error, warn};
use nodetree_core::{FieldError, TreeServiceError};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Display;

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Error returned by every handler.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>, details: Option<Value>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                details,
            },
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message, None)
    }

    /// 422 with `details` shaped as `{field: [messages]}`.
    pub fn validation(fields: &[FieldError]) -> Self {
        let mut details = Map::new();
        for field in fields {
            let entry = details
                .entry(field.field)
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(messages) = entry {
                messages.push(Value::String(field.message.clone()));
            }
        }
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Validation failed",
            Some(Value::Object(details)),
        )
    }

    /// 500 naming the failed operation, e.g. `"adding the node"`.
    pub fn internal(operation: &str, cause: impl Display) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("An error occurred while {operation}"),
            Some(Value::String(cause.to_string())),
        )
    }

    /// Maps a service error for the named operation.
    pub fn from_service(operation: &str, err: TreeServiceError) -> Self {
        match err {
            TreeServiceError::Validation(fields) => Self::validation(&fields),
            TreeServiceError::NotFound(missing) => Self::not_found(missing.to_string()),
            TreeServiceError::InvalidOperation(op) => {
                Self::new(StatusCode::BAD_REQUEST, op.to_string(), None)
            }
            TreeServiceError::Internal(cause) => Self::internal(operation, cause),
        }
    }

    /// Replaces the message of a 404, leaving other errors untouched.
    pub fn with_not_found_message(mut self, message: &str) -> Self {
        if self.status == StatusCode::NOT_FOUND {
            self.body.error = message.to_string();
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.body.error
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(
                "event=api_error module=api status=error code={} error={} details={}",
                self.status.as_u16(),
                self.body.error,
                self.body.details.as_ref().map_or(Value::Null, Clone::clone)
            );
        } else {
            warn!(
                "event=api_error module=api status=rejected code={} error={}",
                self.status.as_u16(),
                self.body.error
            );
        }
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::ApiError;
    use axum::http::StatusCode;
    use nodetree_core::{FieldError, InvalidOperation, Missing, TreeServiceError};
    use serde_json::json;

    #[test]
    fn validation_groups_messages_by_field() {
        let err = ApiError::validation(&[
            FieldError {
                field: "title",
                message: "one".to_string(),
            },
            FieldError {
                field: "title",
                message: "two".to_string(),
            },
        ]);
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.body.details, Some(json!({ "title": ["one", "two"] })));
    }

    #[test]
    fn service_errors_map_to_expected_status_codes() {
        let cases = [
            (
                TreeServiceError::NotFound(Missing::Root),
                StatusCode::NOT_FOUND,
                "Root node not found",
            ),
            (
                TreeServiceError::InvalidOperation(InvalidOperation::DeleteRoot),
                StatusCode::BAD_REQUEST,
                "Cannot delete root node",
            ),
            (
                TreeServiceError::NotFound(Missing::Parent(3)),
                StatusCode::NOT_FOUND,
                "Parent node not found",
            ),
        ];
        for (err, status, message) in cases {
            let mapped = ApiError::from_service("testing", err);
            assert_eq!(mapped.status(), status);
            assert_eq!(mapped.message(), message);
        }
    }

    #[test]
    fn not_found_message_override_ignores_other_statuses() {
        let err = ApiError::internal("moving the node", "disk full")
            .with_not_found_message("Node or new parent node not found");
        assert_eq!(err.message(), "An error occurred while moving the node");
    }
}
