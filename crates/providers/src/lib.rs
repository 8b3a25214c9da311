//! Text-generation and embedding backends plus the fallback chains that
//! sit in front of them.

pub mod breaker;
pub mod chain;
pub mod embeddings_fallback;
pub mod embeddings_local;
pub mod embeddings_openai;
pub mod error;
pub mod model;
pub mod openai_compat;

use std::sync::Arc;

use tracing::info;

use pelangi_config::{EmbeddingsConfig, ProviderKind, ProvidersConfig};

pub use {
    chain::ProviderChain,
    embeddings_fallback::FallbackEmbeddingProvider,
    embeddings_local::{HashingEmbedder, LOCAL_PROVIDER_ID, cosine_similarity},
    embeddings_openai::OpenAiEmbeddingProvider,
    error::{ProviderError, ProviderFailure, Result},
    model::{
        ChatMessage, EmbeddingProvider, Embeddings, GenerateRequest, Generation, LlmProvider,
        Role, TextGenerator,
    },
    openai_compat::OpenAiCompatProvider,
};

/// Build the generation chain from the enabled entries, in declared order.
#[must_use]
pub fn build_chain(config: &ProvidersConfig) -> ProviderChain {
    let providers: Vec<Arc<dyn LlmProvider>> = config
        .chain
        .iter()
        .filter(|entry| entry.enabled)
        .map(|entry| match entry.kind {
            ProviderKind::OpenaiCompat => {
                Arc::new(OpenAiCompatProvider::from_entry(entry)) as Arc<dyn LlmProvider>
            },
        })
        .collect();
    let chain = ProviderChain::new(providers);
    info!(providers = ?chain.provider_ids(), "provider chain ready");
    chain
}

/// Build the embedding chain: remote entries first, then the local hashing
/// embedder when `local_fallback` is set.
#[must_use]
pub fn build_embedder(config: &EmbeddingsConfig) -> Arc<dyn EmbeddingProvider> {
    let mut providers: Vec<Arc<dyn EmbeddingProvider>> = config
        .chain
        .iter()
        .filter(|entry| entry.enabled)
        .map(|entry| Arc::new(OpenAiEmbeddingProvider::from_entry(entry)) as Arc<dyn EmbeddingProvider>)
        .collect();
    if config.local_fallback || providers.is_empty() {
        providers.push(Arc::new(HashingEmbedder::new(config.dimensions)));
    }
    if providers.len() == 1 {
        return providers.remove(0);
    }
    Arc::new(FallbackEmbeddingProvider::new(providers))
}
