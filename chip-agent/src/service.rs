//! Chat service: the per-message turn

use chip_core::config::AssistantConfig;
use chip_core::utils::truncate;
use chip_core::{ConversationStore, Message, Role};
use chip_providers::{LLMProvider, Message as WireMessage, ProviderError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error returned by a chat turn
#[derive(Error, Debug)]
pub enum ChatError {
    /// The completion API rejected or lacked credentials
    #[error("Upstream authentication failed: {0}")]
    UpstreamAuth(#[source] ProviderError),

    /// The completion API failed to produce a usable reply
    #[error("Upstream generation failed: {0}")]
    UpstreamGeneration(#[source] ProviderError),

    /// Conversation store misuse, e.g. an unknown user session
    #[error(transparent)]
    Session(#[from] chip_core::Error),
}

impl From<ProviderError> for ChatError {
    fn from(e: ProviderError) -> Self {
        if e.is_auth() {
            ChatError::UpstreamAuth(e)
        } else {
            ChatError::UpstreamGeneration(e)
        }
    }
}

/// Generation settings applied to every turn
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Recent messages sent upstream besides the persona (0 = all)
    pub history_window: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        ChatSettings::from(&AssistantConfig::default())
    }
}

impl From<&AssistantConfig> for ChatSettings {
    fn from(config: &AssistantConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            history_window: config.history_window,
        }
    }
}

/// Handles inbound chat messages against the shared conversation store
pub struct ChatService {
    store: Arc<ConversationStore>,
    provider: Arc<dyn LLMProvider>,
    settings: ChatSettings,
    /// One lock per user, held for a whole turn
    turn_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ChatService {
    /// Create a chat service over an existing store
    pub fn new(
        store: Arc<ConversationStore>,
        provider: Arc<dyn LLMProvider>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            store,
            provider,
            settings,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Create a chat service with a fresh store seeded from the assistant config
    pub fn from_config(config: &AssistantConfig, provider: Arc<dyn LLMProvider>) -> Self {
        let store = Arc::new(ConversationStore::new(config.persona.clone()));
        Self::new(store, provider, ChatSettings::from(config))
    }

    /// The conversation store backing this service
    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Model identifier sent upstream
    pub fn model(&self) -> &str {
        &self.settings.model
    }

    /// Stored transcript for `user_id`
    pub fn history(&self, user_id: &str) -> Result<Vec<Message>, ChatError> {
        Ok(self.store.get_history(user_id)?)
    }

    fn turn_lock(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.turn_locks
            .lock()
            .entry(user_id.to_string())
            .or_default()
            .clone()
    }

    /// Run one chat turn for `user_id` and return the assistant's reply
    ///
    /// The user message is recorded before the upstream call and stays
    /// recorded if that call fails; the reply is only recorded on success.
    /// Turns for the same user run one at a time, other users are unaffected.
    pub async fn handle_message(&self, user_id: &str, text: &str) -> Result<String, ChatError> {
        let lock = self.turn_lock(user_id);
        let _turn = lock.lock().await;

        self.store.ensure_session(user_id);
        self.store.append_message(user_id, Role::User, text)?;

        let prompt: Vec<WireMessage> = self
            .store
            .prompt_window(user_id, self.settings.history_window)?
            .iter()
            .map(WireMessage::from)
            .collect();

        info!(
            "Processing message from {}: {} (model: {}, prompt: {} messages)",
            user_id,
            truncate(text, 80),
            self.settings.model,
            prompt.len()
        );

        let response = match self
            .provider
            .chat(
                prompt,
                Some(self.settings.model.clone()),
                self.settings.max_tokens,
                self.settings.temperature,
            )
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Completion failed for {}: {}", user_id, e);
                return Err(e.into());
            }
        };

        let reply = response
            .text()
            .map_err(ChatError::UpstreamGeneration)?
            .to_string();
        self.store
            .append_message(user_id, Role::Assistant, reply.as_str())?;

        debug!(
            "Reply for {}: {} (finish_reason: {})",
            user_id,
            truncate(&reply, 80),
            response.finish_reason
        );
        Ok(reply)
    }
}
