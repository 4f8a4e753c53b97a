//! Completion API integrations for chip
//!
//! This crate provides the provider abstraction the chat service talks to and
//! an OpenAI-compatible HTTP implementation of it.

pub mod base;
pub mod openai;

pub use base::{LLMProvider, LLMResponse, Message, ProviderError, ProviderResult};
pub use openai::OpenAIClient;
