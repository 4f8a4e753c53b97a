//! Chat turn orchestration for chip
//!
//! This crate ties the conversation store to a completion provider: one
//! inbound message in, one generated reply out, history updated on the way.

pub mod service;

pub use service::{ChatError, ChatService, ChatSettings};
