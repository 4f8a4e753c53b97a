//! Mapping of chat failures onto HTTP responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chip_agent::ChatError;
use serde_json::json;

/// Error returned by HTTP handlers
///
/// The body carries a stable code and a generic message; the underlying cause
/// is only logged.
#[derive(Debug)]
pub enum ApiError {
    Chat(ChatError),
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        ApiError::Chat(e)
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, &'static str) {
        match self {
            ApiError::Chat(ChatError::UpstreamAuth(_)) => (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_AUTH",
                "The assistant is not available right now.",
            ),
            ApiError::Chat(ChatError::UpstreamGeneration(_)) => (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_GENERATION",
                "The assistant could not generate a reply.",
            ),
            ApiError::Chat(ChatError::Session(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "Something went wrong.",
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        let ApiError::Chat(cause) = &self;
        tracing::error!("Chat request failed ({}): {}", code, cause);

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}
