use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::queue::QueueError;
use crate::store::StoreError;

/// Client-caused rejection; never has side effects
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required log fields")]
    MissingFields,

    #[error("Invalid log level '{0}'. Allowed : INFO, WARN, ERROR, FATAL, DEBUG")]
    InvalidLevel(String),

    #[error("Invalid {param} '{value}', expected a date or ISO-8601 instant")]
    InvalidDate { param: &'static str, value: String },

    #[error("Malformed request: {0}")]
    MalformedRequest(String),
}

impl ValidationError {
    /// Short label used for the rejection metric
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingFields => "missing_fields",
            Self::InvalidLevel(_) => "invalid_level",
            Self::InvalidDate { .. } => "invalid_date",
            Self::MalformedRequest(_) => "malformed_request",
        }
    }
}

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            Self::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::Queue(_) | Self::Store(_) => {
                tracing::error!(error = %self, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": error_message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = AppError::from(ValidationError::MissingFields);
        assert_eq!(error.to_string(), "Missing required log fields");
    }

    #[test]
    fn test_validation_reason() {
        assert_eq!(ValidationError::InvalidLevel("X".into()).reason(), "invalid_level");
        assert_eq!(ValidationError::MissingFields.reason(), "missing_fields");
    }

    #[tokio::test]
    async fn test_validation_error_response() {
        let response = AppError::from(ValidationError::MissingFields).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "Missing required log fields");
    }

    #[tokio::test]
    async fn test_infra_error_hides_details() {
        let error = AppError::Store(StoreError::Unavailable("db on fire".into()));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "Internal Server Error");
    }
}
