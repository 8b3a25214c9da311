//! Shared types, error definitions, and utilities used across all pelangi crates.

pub mod error;
pub mod text;
pub mod types;

pub use {
    error::{Error, FromMessage, Result},
    types::{ConversationKey, InboundMessage, Language, OutboundAction},
};
