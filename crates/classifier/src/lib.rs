//! Tiered intent classification for inbound guest messages.
//!
//! Tiers run cheapest first: emergency regexes, fuzzy keywords, semantic
//! nearest-example, then a generative fallback through the provider chain.

pub mod emergency;
pub mod entities;
pub mod error;
pub mod fuzzy;
pub mod generative;
pub mod intent_mapper;
pub mod pipeline;
pub mod result;
pub mod semantic;

pub use {
    error::TierError,
    intent_mapper::IntentMapper,
    pipeline::Classifier,
    result::{ClassificationResult, ClassifyContext, SourceTier, UNKNOWN_INTENT},
};
