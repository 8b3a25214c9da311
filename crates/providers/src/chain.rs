//! Provider fallback chain with per-provider circuit breakers.
//!
//! Providers are tried in priority order. Each attempt runs under that
//! provider's own timeout; any failure (timeout, rate limit, non-2xx,
//! malformed payload) moves straight to the next provider without retrying.
//! When nothing succeeds the caller gets one aggregated
//! [`ProviderError::Exhausted`] listing every provider's failure.

use std::{sync::Arc, time::Instant};

use {
    async_trait::async_trait,
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use pelangi_metrics::{counter, histogram, labels, provider as provider_metrics};

use crate::{
    breaker::CircuitBreaker,
    error::{ProviderError, ProviderFailure, Result},
    model::{GenerateRequest, Generation, LlmProvider, TextGenerator},
};

struct ChainEntry {
    provider: Arc<dyn LlmProvider>,
    state: CircuitBreaker,
}

/// Ordered failover across [`LlmProvider`]s.
pub struct ProviderChain {
    chain: Vec<ChainEntry>,
}

impl ProviderChain {
    /// Build a chain from providers in priority order.
    pub fn new(providers: Vec<Arc<dyn LlmProvider>>) -> Self {
        let chain = providers
            .into_iter()
            .map(|provider| ChainEntry {
                provider,
                state: CircuitBreaker::new(),
            })
            .collect();
        Self { chain }
    }

    #[cfg(test)]
    fn with_breaker(providers: Vec<Arc<dyn LlmProvider>>, breaker: impl Fn() -> CircuitBreaker) -> Self {
        let chain = providers
            .into_iter()
            .map(|provider| ChainEntry {
                provider,
                state: breaker(),
            })
            .collect();
        Self { chain }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    #[must_use]
    pub fn provider_ids(&self) -> Vec<&str> {
        self.chain.iter().map(|e| e.provider.id()).collect()
    }

    pub async fn generate(&self, request: &GenerateRequest) -> Result<Generation> {
        if self.chain.is_empty() {
            return Err(ProviderError::NoProviders);
        }

        let mut failures = Vec::with_capacity(self.chain.len());
        for entry in &self.chain {
            let provider_id = entry.provider.id();
            if entry.state.is_tripped() {
                debug!(provider = provider_id, "circuit open, skipping provider");
                failures.push(ProviderFailure {
                    provider_id: provider_id.to_string(),
                    error: ProviderError::CircuitOpen,
                });
                continue;
            }

            let timeout = entry.provider.timeout();
            let start = Instant::now();
            let result = match tokio::time::timeout(timeout, entry.provider.generate(request)).await
            {
                Ok(Ok(text)) if text.trim().is_empty() => {
                    Err(ProviderError::malformed("empty completion"))
                },
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout {
                    after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }),
            };
            let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            match result {
                Ok(text) => {
                    entry.state.record_success();

                    #[cfg(feature = "metrics")]
                    {
                        counter!(
                            provider_metrics::GENERATIONS_TOTAL,
                            labels::PROVIDER => provider_id.to_string()
                        )
                        .increment(1);
                        histogram!(
                            provider_metrics::GENERATION_DURATION_SECONDS,
                            labels::PROVIDER => provider_id.to_string()
                        )
                        .record(start.elapsed().as_secs_f64());
                    }

                    debug!(provider = provider_id, latency_ms, "provider generated reply");
                    return Ok(Generation {
                        text,
                        provider_id: provider_id.to_string(),
                        latency_ms,
                    });
                },
                Err(error) => {
                    entry.state.record_failure();

                    #[cfg(feature = "metrics")]
                    counter!(
                        provider_metrics::FAILURES_TOTAL,
                        labels::PROVIDER => provider_id.to_string(),
                        labels::ERROR_TYPE => error.kind()
                    )
                    .increment(1);

                    warn!(
                        provider = provider_id,
                        error = %error,
                        latency_ms,
                        "provider failed, trying next in chain"
                    );
                    failures.push(ProviderFailure {
                        provider_id: provider_id.to_string(),
                        error,
                    });
                },
            }
        }

        #[cfg(feature = "metrics")]
        counter!(provider_metrics::EXHAUSTED_TOTAL).increment(1);

        Err(ProviderError::Exhausted { failures })
    }
}

#[async_trait]
impl TextGenerator for ProviderChain {
    async fn generate(&self, request: &GenerateRequest) -> Result<Generation> {
        ProviderChain::generate(self, request).await
    }
}
