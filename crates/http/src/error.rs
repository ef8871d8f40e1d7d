//! Error handling for the bookshelf HTTP layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use uuid::Uuid;

const REDACTED_MESSAGE: &str = "An internal server error occurred";

/// Application error types that map to HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation error: {message}")]
    Validation {
        details: Vec<Value>,
        code: String,
        message: String,
        /// Extra top-level envelope keys such as `validStatuses`.
        hints: Map<String, Value>,
    },

    #[error("conflict: {message}")]
    Conflict {
        details: Vec<Value>,
        code: String,
        message: String,
    },

    #[error("not found: {message}")]
    NotFound { message: String, code: String },

    #[error("bad request: {message}")]
    BadRequest { message: String, code: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Create a validation error
    pub fn validation(details: Vec<Value>, message: impl Into<String>) -> Self {
        Self::Validation {
            details,
            code: "validation_error".to_string(),
            message: message.into(),
            hints: Map::new(),
        }
    }

    /// Create a conflict error
    pub fn conflict(details: Vec<Value>, message: impl Into<String>) -> Self {
        Self::Conflict {
            details,
            code: "conflict".to_string(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            code: "not_found".to_string(),
        }
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            code: "bad_request".to_string(),
        }
    }

    /// Attach a top-level key to a validation envelope. Ignored for other kinds.
    pub fn with_hint(mut self, key: impl Into<String>, value: Value) -> Self {
        if let Self::Validation { hints, .. } = &mut self {
            hints.insert(key.into(), value);
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Response extension carrying the client-safe variant of an internal error
/// body. [`redact_internal_errors`] swaps it in outside development.
#[derive(Clone, Debug)]
pub struct RedactedBody(pub Value);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4();
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let status = self.status();

        let (error_code, message, details, hints) = match self {
            AppError::Validation {
                details,
                code,
                message,
                hints,
            } => (code, message, Some(details), hints),
            AppError::Conflict {
                details,
                code,
                message,
            } => (code, message, Some(details), Map::new()),
            AppError::NotFound { message, code } => (code, message, None, Map::new()),
            AppError::BadRequest { message, code } => (code, message, None, Map::new()),
            AppError::Internal(e) => ("internal_error".to_string(), e.to_string(), None, Map::new()),
        };

        if status.is_server_error() {
            tracing::error!(
                error_id = %error_id,
                error_code = %error_code,
                status_code = %status.as_u16(),
                error = %message,
                "Request error"
            );
        } else {
            tracing::warn!(
                error_id = %error_id,
                error_code = %error_code,
                status_code = %status.as_u16(),
                "Request error"
            );
        }

        let envelope = |message: &str| {
            let mut body = Map::new();
            body.insert("success".into(), Value::Bool(false));
            body.insert("message".into(), json!(message));
            body.insert("code".into(), json!(error_code));
            if let Some(details) = &details {
                body.insert("details".into(), json!(details));
            }
            for (key, value) in &hints {
                body.insert(key.clone(), value.clone());
            }
            body.insert("trace_id".into(), json!(error_id.to_string()));
            body.insert("timestamp".into(), json!(timestamp));
            Value::Object(body)
        };

        let mut response = (status, Json(envelope(&message))).into_response();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            response
                .extensions_mut()
                .insert(RedactedBody(envelope(REDACTED_MESSAGE)));
        }
        response
    }
}

/// `map_response` middleware replacing internal error bodies with their
/// redacted variant.
pub async fn redact_internal_errors(mut response: Response) -> Response {
    match response.extensions_mut().remove::<RedactedBody>() {
        Some(RedactedBody(body)) => (response.status(), Json(body)).into_response(),
        None => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_validation_error() {
        let details = vec![json!({"field": "price", "error": "Price cannot be negative"})];
        let error = AppError::validation(details.clone(), "Validation failed");

        match error {
            AppError::Validation {
                details: d,
                code,
                message,
                hints,
            } => {
                assert_eq!(d, details);
                assert_eq!(code, "validation_error");
                assert_eq!(message, "Validation failed");
                assert!(hints.is_empty());
            }
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::validation(vec![], "bad").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::conflict(vec![], "dup").status(), StatusCode::CONFLICT);
        assert_eq!(AppError::not_found("gone").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_envelope_carries_hints() {
        let error = AppError::validation(vec![], "Invalid status value")
            .with_hint("validStatuses", json!(["available"]));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["message"], json!("Invalid status value"));
        assert_eq!(body["validStatuses"], json!(["available"]));
        assert!(body["trace_id"].is_string());
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_internal_error_redaction() {
        let response = AppError::Internal(anyhow::anyhow!("Database connection failed"))
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let redacted = redact_internal_errors(response).await;
        assert_eq!(redacted.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(redacted).await;
        assert_eq!(body["message"], json!(REDACTED_MESSAGE));
    }

    #[tokio::test]
    async fn test_internal_error_detail_kept_without_redaction() {
        let response = AppError::Internal(anyhow::anyhow!("Database connection failed"))
            .into_response();
        let body = body_json(response).await;
        assert_eq!(body["message"], json!("Database connection failed"));
    }
}
