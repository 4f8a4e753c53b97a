//! Process-wide conversation store

use super::store::{Message, Role, Session};
use crate::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// Holds every user's session in memory
///
/// Each call takes the lock only long enough to read or mutate the map, so
/// different users never contend beyond that. Serializing a whole turn for one
/// user is the caller's job.
#[derive(Debug)]
pub struct ConversationStore {
    /// Persona text seeded into every new session
    persona: String,
    sessions: RwLock<HashMap<String, Session>>,
}

impl ConversationStore {
    /// Create an empty store whose sessions open with `persona`
    pub fn new(persona: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// The persona text used for new sessions
    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// Get or create the session for `user_id`
    ///
    /// A new session holds only the persona message. An existing one is
    /// returned as is, so repeated calls never reset or duplicate anything.
    pub fn ensure_session(&self, user_id: &str) -> Session {
        if let Some(session) = self.sessions.read().get(user_id) {
            return session.clone();
        }

        let mut sessions = self.sessions.write();
        sessions
            .entry(user_id.to_string())
            .or_insert_with(|| {
                debug!(user_id, "Creating conversation session");
                Session::new(user_id, self.persona.as_str())
            })
            .clone()
    }

    /// Append a message to the end of an existing session
    ///
    /// The persona is the only system message a session carries, so appending
    /// another one is rejected.
    pub fn append_message(
        &self,
        user_id: &str,
        role: Role,
        content: impl Into<String>,
    ) -> Result<()> {
        if role == Role::System {
            return Err(Error::Validation(
                "system messages can only be set at session creation".to_string(),
            ));
        }

        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(user_id)
            .ok_or_else(|| Error::UnknownUserSession(user_id.to_string()))?;
        session.add_message(role, content);
        debug!(user_id, %role, len = session.len(), "Appended message");
        Ok(())
    }

    /// Snapshot of the full ordered history for `user_id`
    pub fn get_history(&self, user_id: &str) -> Result<Vec<Message>> {
        self.sessions
            .read()
            .get(user_id)
            .map(|session| session.messages().to_vec())
            .ok_or_else(|| Error::UnknownUserSession(user_id.to_string()))
    }

    /// Snapshot of the prompt to send upstream: the persona plus at most
    /// `max_messages` recent messages (`0` for everything)
    pub fn prompt_window(&self, user_id: &str, max_messages: usize) -> Result<Vec<Message>> {
        self.sessions
            .read()
            .get(user_id)
            .map(|session| session.get_history(max_messages))
            .ok_or_else(|| Error::UnknownUserSession(user_id.to_string()))
    }

    /// Whether a session exists for `user_id`
    pub fn contains(&self, user_id: &str) -> bool {
        self.sessions.read().contains_key(user_id)
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether no user has written in yet
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Identifiers of every live session, sorted
    pub fn user_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const PERSONA: &str = "You are a friendly chatbot named Chip.";

    #[test]
    fn test_store_starts_empty() {
        let store = ConversationStore::new(PERSONA);
        assert!(store.is_empty());
        assert!(!store.contains("alice"));
    }

    #[test]
    fn test_ensure_session_is_idempotent() {
        let store = ConversationStore::new(PERSONA);

        let first = store.ensure_session("alice");
        let second = store.ensure_session("alice");

        assert_eq!(first.messages(), second.messages());
        assert_eq!(second.len(), 1);
        assert_eq!(second.messages()[0].role, Role::System);
        assert_eq!(second.messages()[0].content, PERSONA);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_ensure_session_never_resets_history() {
        let store = ConversationStore::new(PERSONA);
        store.ensure_session("alice");
        store.append_message("alice", Role::User, "hi").unwrap();
        store.append_message("alice", Role::Assistant, "hello").unwrap();

        let session = store.ensure_session("alice");
        assert_eq!(session.len(), 3);
        assert_eq!(store.get_history("alice").unwrap().len(), 3);
    }

    #[test]
    fn test_append_preserves_order() {
        let store = ConversationStore::new(PERSONA);
        store.ensure_session("alice");
        for i in 0..10 {
            store
                .append_message("alice", Role::User, format!("message {}", i))
                .unwrap();
        }

        let history = store.get_history("alice").unwrap();
        let contents: Vec<&str> = history[1..].iter().map(|m| m.content.as_str()).collect();
        let expected: Vec<String> = (0..10).map(|i| format!("message {}", i)).collect();
        assert_eq!(contents, expected);
    }

    #[test]
    fn test_append_without_session_fails() {
        let store = ConversationStore::new(PERSONA);
        let err = store
            .append_message("ghost", Role::User, "boo")
            .unwrap_err();
        assert!(matches!(err, Error::UnknownUserSession(ref id) if id == "ghost"));
        assert!(store.get_history("ghost").is_err());
        assert!(!store.contains("ghost"));
    }

    #[test]
    fn test_append_system_rejected() {
        let store = ConversationStore::new(PERSONA);
        store.ensure_session("alice");
        let err = store
            .append_message("alice", Role::System, "new persona")
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(store.get_history("alice").unwrap().len(), 1);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = ConversationStore::new(PERSONA);
        store.ensure_session("alice");
        store.ensure_session("bob");
        store.append_message("alice", Role::User, "alice secret").unwrap();

        let bob = store.get_history("bob").unwrap();
        assert_eq!(bob.len(), 1);
        assert!(bob.iter().all(|m| m.content != "alice secret"));
        assert_eq!(store.user_ids(), vec!["alice".to_string(), "bob".to_string()]);
    }

    #[test]
    fn test_prompt_window_bounds_prompt_not_history() {
        let store = ConversationStore::new(PERSONA);
        store.ensure_session("alice");
        for i in 0..20 {
            store
                .append_message("alice", Role::User, format!("q{}", i))
                .unwrap();
            store
                .append_message("alice", Role::Assistant, format!("a{}", i))
                .unwrap();
        }
        store.append_message("alice", Role::User, "latest").unwrap();

        let prompt = store.prompt_window("alice", 6).unwrap();
        assert_eq!(prompt.len(), 6);
        assert_eq!(prompt[0].content, PERSONA);
        assert_eq!(prompt.last().unwrap().content, "latest");
        assert_eq!(store.get_history("alice").unwrap().len(), 42);
    }

    #[test]
    fn test_concurrent_access_by_different_users() {
        let store = Arc::new(ConversationStore::new(PERSONA));
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let store = store.clone();
                thread::spawn(move || {
                    let user = format!("user-{}", n);
                    store.ensure_session(&user);
                    for i in 0..50 {
                        store
                            .append_message(&user, Role::User, format!("{}", i))
                            .unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 8);
        for n in 0..8 {
            let history = store.get_history(&format!("user-{}", n)).unwrap();
            assert_eq!(history.len(), 51);
            assert_eq!(history[50].content, "49");
        }
    }
}
