//! Conversation history kept per user
//!
//! Sessions live only in process memory. The store is created empty at
//! startup, filled lazily as users write in, and dropped with the process.

pub mod manager;
pub mod store;

pub use manager::ConversationStore;
pub use store::{Message, Role, Session};
