//! Core types and services for chip
//!
//! This crate provides the error type, configuration handling, logging setup
//! and the in-process conversation store shared by the other chip crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod utils;

pub use error::{Error, Result};
pub use session::{ConversationStore, Message, Role, Session};
