//! Success envelope shared by module handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

/// `{ success: true, message, data?, pagination?, filters? }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    #[serde(skip)]
    status: StatusCode,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Value>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            success: true,
            message: message.into(),
            data: Some(data),
            pagination: None,
            filters: None,
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::ok(message, data)
        }
    }

    pub fn with_pagination(mut self, pagination: impl Serialize) -> Self {
        self.pagination = serde_json::to_value(pagination).ok();
        self
    }

    pub fn with_filters(mut self, filters: impl Serialize) -> Self {
        self.filters = serde_json::to_value(filters).ok();
        self
    }
}

impl ApiResponse<()> {
    /// Envelope with no `data` field.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            success: true,
            message: message.into(),
            data: None,
            pagination: None,
            filters: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_only_envelope_omits_data() {
        let value = serde_json::to_value(ApiResponse::message("Book deleted successfully")).unwrap();
        assert_eq!(
            value,
            json!({"success": true, "message": "Book deleted successfully"})
        );
    }

    #[test]
    fn created_uses_201() {
        let response = ApiResponse::created("created", json!({"id": "1"})).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
