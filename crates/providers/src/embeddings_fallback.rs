/// Fallback chain embedding provider: tries providers in order with circuit breaker.
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    tracing::{info, warn},
};

use crate::{
    breaker::CircuitBreaker,
    error::{ProviderError, ProviderFailure, Result},
    model::{EmbeddingProvider, Embeddings},
};

/// A provider entry in the fallback chain.
struct ChainEntry {
    provider: Arc<dyn EmbeddingProvider>,
    state: CircuitBreaker,
}

/// Tries embedding providers in order, skipping those with circuit breaker tripped.
///
/// The last provider that answered stays active so repeated calls do not keep
/// paying the timeout of a dead primary.
pub struct FallbackEmbeddingProvider {
    chain: Vec<ChainEntry>,
    active: AtomicUsize,
}

impl FallbackEmbeddingProvider {
    pub fn new(providers: Vec<Arc<dyn EmbeddingProvider>>) -> Self {
        let chain = providers
            .into_iter()
            .map(|provider| ChainEntry {
                provider,
                state: CircuitBreaker::new(),
            })
            .collect();
        Self {
            chain,
            active: AtomicUsize::new(0),
        }
    }

    pub fn provider_ids(&self) -> Vec<&str> {
        self.chain.iter().map(|e| e.provider.id()).collect()
    }

    pub fn active_provider_id(&self) -> &str {
        let idx = self.active.load(Ordering::SeqCst);
        self.chain
            .get(idx)
            .map(|e| e.provider.id())
            .unwrap_or("none")
    }
}

#[async_trait]
impl EmbeddingProvider for FallbackEmbeddingProvider {
    fn id(&self) -> &str {
        self.active_provider_id()
    }

    fn timeout(&self) -> Duration {
        self.chain
            .iter()
            .map(|e| e.provider.timeout())
            .sum::<Duration>()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Embeddings> {
        if self.chain.is_empty() {
            return Err(ProviderError::NoProviders);
        }

        let mut failures = Vec::new();
        let start_idx = self.active.load(Ordering::SeqCst);

        for offset in 0..self.chain.len() {
            let idx = (start_idx + offset) % self.chain.len();
            let entry = &self.chain[idx];
            let provider_id = entry.provider.id();

            if entry.state.is_tripped() {
                failures.push(ProviderFailure {
                    provider_id: provider_id.to_string(),
                    error: ProviderError::CircuitOpen,
                });
                continue;
            }

            let timeout = entry.provider.timeout();
            let result = match tokio::time::timeout(timeout, entry.provider.embed_batch(texts)).await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout {
                    after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }),
            };

            match result {
                Ok(embeddings) => {
                    entry.state.record_success();
                    if idx != start_idx {
                        info!(
                            from = self.chain[start_idx].provider.id(),
                            to = provider_id,
                            "embedding fallback: switched active provider"
                        );
                        self.active.store(idx, Ordering::SeqCst);
                    }
                    return Ok(embeddings);
                },
                Err(error) => {
                    warn!(provider = provider_id, error = %error, "embedding provider failed");
                    entry.state.record_failure();
                    failures.push(ProviderFailure {
                        provider_id: provider_id.to_string(),
                        error,
                    });
                },
            }
        }

        Err(ProviderError::Exhausted { failures })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use super::*;

    struct Switchable {
        id: &'static str,
        up: AtomicBool,
        calls: AtomicUsize,
    }

    impl Switchable {
        fn new(id: &'static str, up: bool) -> Arc<Self> {
            Arc::new(Self {
                id,
                up: AtomicBool::new(up),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl EmbeddingProvider for Switchable {
        fn id(&self) -> &str {
            self.id
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Embeddings> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.up.load(Ordering::SeqCst) {
                return Err(ProviderError::Unreachable("down".into()));
            }
            Ok(Embeddings {
                provider_id: self.id.to_string(),
                vectors: texts.iter().map(|_| vec![1.0, 0.0]).collect(),
            })
        }
    }

    #[tokio::test]
    async fn falls_back_and_stays_on_working_provider() {
        let primary = Switchable::new("primary", false);
        let local = Switchable::new("local", true);
        let providers: Vec<Arc<dyn EmbeddingProvider>> = vec![primary.clone(), local.clone()];
        let chain = FallbackEmbeddingProvider::new(providers);

        let out = chain.embed("hi").await.unwrap();
        assert_eq!(out.provider_id, "local");
        assert_eq!(chain.active_provider_id(), "local");

        chain.embed("again").await.unwrap();
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(local.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn all_failing_aggregates() {
        let a = Switchable::new("a", false);
        let b = Switchable::new("b", false);
        let providers: Vec<Arc<dyn EmbeddingProvider>> = vec![a, b];
        let chain = FallbackEmbeddingProvider::new(providers);

        let err = chain.embed("hi").await.unwrap_err();
        let ProviderError::Exhausted { failures } = err else {
            panic!("expected exhausted");
        };
        assert_eq!(failures.len(), 2);
    }
}
