//! Session data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Author of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire name used by completion APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single role-tagged chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,
    /// Message content
    pub content: String,
    /// Message timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new chat message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// The conversation held for one user
///
/// The first message is always the persona system message. It is written
/// once on creation and the only mutation afterwards is appending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// User identifier the session belongs to
    pub user_id: String,
    messages: Vec<Message>,
    /// Session creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session seeded with the persona system message
    pub fn new(user_id: impl Into<String>, persona: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            messages: vec![Message::system(persona)],
            created_at: now,
            updated_at: now,
        }
    }

    /// Full ordered history, persona first
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages including the persona
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false; a session is never without its persona message
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub(crate) fn add_message(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message::new(role, content));
        self.updated_at = Utc::now();
    }

    /// Get message history for LLM context
    ///
    /// Returns the persona followed by at most `max_messages` of the most
    /// recent messages. A window never opens on an assistant reply, so it may
    /// come out one shorter than requested. `0` means no limit.
    pub fn get_history(&self, max_messages: usize) -> Vec<Message> {
        let rest = self.messages.len().saturating_sub(1);
        if max_messages == 0 || rest <= max_messages {
            return self.messages.clone();
        }

        let mut start = self.messages.len() - max_messages;
        while start < self.messages.len() && self.messages[start].role == Role::Assistant {
            start += 1;
        }

        let mut history = Vec::with_capacity(1 + self.messages.len() - start);
        history.push(self.messages[0].clone());
        history.extend_from_slice(&self.messages[start..]);
        history
    }
}
