//! Error handling for the bookshelf HTTP layer

use axum::{
    extract::rejection::{BytesRejection, JsonRejection, PathRejection, QueryRejection},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Uniform error envelope returned for every failure except validation
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub message: String,
}

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Application error types that map to HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation failed with {} violation(s)", .0.len())]
    Validation(Vec<Violation>),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// A framework rejection that carries its own status (e.g. 413)
    #[error("{status}: {message}")]
    Rejected { status: StatusCode, message: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Create a validation error
    pub fn validation(violations: Vec<Violation>) -> Self {
        Self::Validation(violations)
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Rejected { status, .. } => *status,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

impl From<BytesRejection> for AppError {
    fn from(rejection: BytesRejection) -> Self {
        AppError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

/// Render the `{status, message}` envelope for an arbitrary status
pub fn envelope(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        status: status.as_u16(),
        message: message.into(),
    };
    (status, Json(body)).into_response()
}

/// Wrap error responses that left a layer without a JSON body in the envelope.
///
/// Covers failures produced below the handlers, such as timeouts and
/// method mismatches, which would otherwise reach the client bare.
pub async fn ensure_envelope(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));
    if is_json {
        return response;
    }

    let message = status.canonical_reason().unwrap_or("Request failed");
    tracing::debug!(status_code = %status.as_u16(), "enveloping bare error response");
    envelope(status, message)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match self {
            AppError::Validation(violations) => {
                tracing::debug!(violations = violations.len(), "request failed validation");
                return (status, Json(violations)).into_response();
            }
            AppError::NotFound(message)
            | AppError::Forbidden(message)
            | AppError::BadRequest(message)
            | AppError::Rejected { message, .. } => {
                tracing::debug!(status_code = %status.as_u16(), %message, "request rejected");
                message
            }
            AppError::Internal(e) => {
                tracing::error!(
                    status_code = %status.as_u16(),
                    error = ?e,
                    "Request error"
                );
                // In production, we hide internal error details
                if cfg!(debug_assertions) {
                    e.to_string()
                } else {
                    "An internal server error occurred".to_string()
                }
            }
        };

        envelope(status, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_error_renders_violation_array() {
        let error = AppError::validation(vec![
            Violation::new("title", "must not be blank"),
            Violation::new("coverText", "too long"),
        ]);
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(
            body,
            serde_json::json!([
                {"field": "title", "message": "must not be blank"},
                {"field": "coverText", "message": "too long"},
            ])
        );
    }

    #[tokio::test]
    async fn test_error_response_format() {
        let response = AppError::not_found("Book 9 not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(
            body,
            serde_json::json!({"status": 404, "message": "Book 9 not found"})
        );
    }

    #[tokio::test]
    async fn test_forbidden_mapping() {
        let response = AppError::forbidden("no").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["status"], 403);
    }

    #[tokio::test]
    async fn test_rejection_keeps_its_status() {
        let error = AppError::Rejected {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            message: "length limit exceeded".to_string(),
        };
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"status": 413, "message": "length limit exceeded"})
        );
    }

    #[tokio::test]
    async fn test_bare_error_responses_get_enveloped() {
        let bare = StatusCode::REQUEST_TIMEOUT.into_response();
        let response = ensure_envelope(bare).await;
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"status": 408, "message": "Request Timeout"})
        );
    }

    #[tokio::test]
    async fn test_json_and_success_responses_pass_through() {
        let validation = AppError::validation(vec![Violation::new("title", "blank")]);
        let response = ensure_envelope(validation.into_response()).await;
        assert!(body_json(response).await.is_array());

        let ok = ensure_envelope((StatusCode::NO_CONTENT, ()).into_response()).await;
        assert_eq!(ok.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_internal_error_mapping() {
        let internal_error = anyhow::anyhow!("Database connection failed");
        let response = AppError::Internal(internal_error).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["status"], 500);
        assert!(body["message"].is_string());
        assert!(body.get("backtrace").is_none());
    }
}
