use axum::{extract::State, response::Html, Json};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// User id shared by every caller that does not name one
pub const DEFAULT_USER_ID: &str = "guest";

fn default_user_id() -> String {
    DEFAULT_USER_ID.to_string()
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    tracing::debug!("Received chat request from {}", payload.user_id);
    let reply = state
        .chat
        .handle_message(&payload.user_id, &payload.message)
        .await?;
    Ok(Json(ChatResponse { reply }))
}

pub async fn index_handler(State(state): State<AppState>) -> Html<String> {
    Html(state.page.to_string())
}

pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "model": state.chat.model(),
        "sessions": state.chat.store().len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::build_router;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use chip_agent::ChatService;
    use chip_core::config::AssistantConfig;
    use chip_providers::{LLMProvider, LLMResponse, Message, ProviderError, ProviderResult};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Replies with the number of messages it was sent, or fails on "fail"/"auth"
    struct CountingProvider;

    #[async_trait]
    impl LLMProvider for CountingProvider {
        async fn chat(
            &self,
            messages: Vec<Message>,
            _model: Option<String>,
            _max_tokens: u32,
            _temperature: f64,
        ) -> ProviderResult<LLMResponse> {
            match messages.last().map(|m| m.content.as_str()) {
                Some("fail") => Err(ProviderError::ApiError("HTTP 503: overloaded".to_string())),
                Some("auth") => Err(ProviderError::Auth("HTTP 401: bad key sk-secret".to_string())),
                _ => Ok(LLMResponse {
                    content: Some(format!("seen {}", messages.len())),
                    finish_reason: "stop".to_string(),
                    usage: HashMap::new(),
                }),
            }
        }

        fn get_default_model(&self) -> String {
            "counting".to_string()
        }
    }

    fn test_state() -> AppState {
        let service = ChatService::from_config(&AssistantConfig::default(), Arc::new(CountingProvider));
        AppState::new(Arc::new(service), "Chip")
    }

    fn chat_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_chat_defaults_to_guest() {
        let state = test_state();
        let app = build_router(state.clone());

        let response = app
            .oneshot(chat_request(serde_json::json!({ "message": "hi" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({ "reply": "seen 2" }));

        let history = state.chat.history(DEFAULT_USER_ID).unwrap();
        assert_eq!(history.len(), 3);
    }

    #[tokio::test]
    async fn test_chat_keeps_context_per_user() {
        let state = test_state();
        let app = build_router(state.clone());

        for expected in ["seen 2", "seen 4"] {
            let response = app
                .clone()
                .oneshot(chat_request(
                    serde_json::json!({ "message": "hello", "user_id": "alice" }),
                ))
                .await
                .unwrap();
            let body: ChatResponse = serde_json::from_value(body_json(response).await).unwrap();
            assert_eq!(body.reply, expected);
        }

        assert_eq!(state.chat.history("alice").unwrap().len(), 5);
        assert!(state.chat.history(DEFAULT_USER_ID).is_err());
    }

    #[tokio::test]
    async fn test_upstream_failure_returns_generic_error() {
        let state = test_state();
        let app = build_router(state.clone());

        let response = app
            .oneshot(chat_request(
                serde_json::json!({ "message": "fail", "user_id": "bob" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["error"], "UPSTREAM_GENERATION");
        assert!(!body.to_string().contains("overloaded"));

        assert_eq!(state.chat.history("bob").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_auth_failure_does_not_leak_details() {
        let app = build_router(test_state());

        let response = app
            .oneshot(chat_request(serde_json::json!({ "message": "auth" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["error"], "UPSTREAM_AUTH");
        assert!(!body.to_string().contains("sk-secret"));
    }

    #[tokio::test]
    async fn test_missing_message_is_rejected() {
        let app = build_router(test_state());

        let response = app
            .oneshot(chat_request(serde_json::json!({ "user_id": "alice" })))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_index_serves_chat_page() {
        let app = build_router(test_state());

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let page = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(page.contains("Chat with Chip"));
        assert!(page.contains("user_id: \"guest\""));
        assert!(!page.contains("{{assistant_name}}"));
    }

    #[tokio::test]
    async fn test_health_reports_model() {
        let app = build_router(test_state());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model"], "gpt-4.1-mini");
        assert_eq!(body["sessions"], 0);
    }
}
