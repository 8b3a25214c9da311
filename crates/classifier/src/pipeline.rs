//! The tier pipeline: emergency → fuzzy → semantic → generative.
//!
//! Each tier has its own enable flag and acceptance threshold. The first
//! tier whose score meets its threshold answers; anything else falls
//! through. Tier failures are logged and count as a non-match.

use std::{sync::Arc, time::Instant};

use tracing::{debug, warn};

#[cfg(feature = "metrics")]
use pelangi_metrics::{classifier as classifier_metrics, counter, histogram, labels};

use {
    pelangi_config::{ClassifierConfig, PelangiConfig},
    pelangi_providers::{EmbeddingProvider, TextGenerator},
};

use crate::{
    emergency::EmergencyTier,
    entities,
    fuzzy::{FuzzyMatch, FuzzyTier},
    generative::GenerativeTier,
    result::{ClassificationResult, ClassifyContext, SourceTier, UNKNOWN_INTENT},
    semantic::SemanticTier,
};

struct Threshold {
    enabled: bool,
    threshold: f32,
}

/// Immutable classifier instance. Build a new one to pick up config changes.
pub struct Classifier {
    emergency: Option<EmergencyTier>,
    fuzzy: FuzzyTier,
    fuzzy_gate: Threshold,
    semantic: Option<SemanticTier>,
    semantic_gate: Threshold,
    fuzzy_skip_cutoff: f32,
    generative: Option<GenerativeTier>,
    generative_gate: Threshold,
}

impl Classifier {
    /// Build from the classifier section. The semantic tier needs an
    /// embedder and the generative tier a generator; a tier without one is
    /// skipped.
    pub fn new(
        config: &ClassifierConfig,
        vocabulary: Vec<String>,
        generator: Option<Arc<dyn TextGenerator>>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        Self {
            emergency: config
                .emergency
                .enabled
                .then(|| EmergencyTier::new(&config.emergency)),
            fuzzy: FuzzyTier::new(&config.fuzzy),
            fuzzy_gate: Threshold {
                enabled: config.fuzzy.enabled,
                threshold: config.fuzzy.threshold,
            },
            semantic: embedder.map(|e| SemanticTier::new(&config.semantic, e)),
            semantic_gate: Threshold {
                enabled: config.semantic.enabled,
                threshold: config.semantic.threshold,
            },
            fuzzy_skip_cutoff: config.semantic.fuzzy_skip_cutoff,
            generative: generator
                .map(|g| GenerativeTier::new(&config.generative, vocabulary, g)),
            generative_gate: Threshold {
                enabled: config.generative.enabled,
                threshold: config.generative.threshold,
            },
        }
    }

    /// Build from a full config; the generative vocabulary is every intent
    /// the config knows about.
    pub fn from_config(
        config: &PelangiConfig,
        generator: Option<Arc<dyn TextGenerator>>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        Self::new(&config.classifier, config.known_intents(), generator, embedder)
    }

    /// Only the emergency tier. Used while a workflow waits for a reply.
    #[must_use]
    pub fn check_emergency(&self, text: &str) -> Option<ClassificationResult> {
        let m = self.emergency.as_ref()?.check(text)?;
        Some(ClassificationResult::new(m.intent, 1.0, SourceTier::EmergencyPattern).with_evidence(m.evidence))
    }

    /// Classify one message. Never fails: total failure is `unknown` at 0.0.
    pub async fn classify(&self, text: &str, context: &ClassifyContext) -> ClassificationResult {
        let start = Instant::now();
        let text = text.trim();
        let mut result = if text.is_empty() {
            ClassificationResult::unknown()
        } else {
            self.run_tiers(text, context).await
        };
        if !text.is_empty() {
            result.entities = entities::extract(text, context.today);
        }

        debug!(
            intent = %result.intent,
            confidence = result.confidence,
            tier = result.source_tier.map_or("none", SourceTier::as_str),
            elapsed_us = start.elapsed().as_micros() as u64,
            "classified message"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(
                classifier_metrics::RESULTS_TOTAL,
                labels::TIER => result.source_tier.map_or("none", SourceTier::as_str),
                labels::INTENT => result.intent.clone()
            )
            .increment(1);
            histogram!(classifier_metrics::DURATION_SECONDS).record(start.elapsed().as_secs_f64());
        }

        result
    }

    async fn run_tiers(&self, text: &str, context: &ClassifyContext) -> ClassificationResult {
        if let Some(result) = self.check_emergency(text) {
            record_invocation(SourceTier::EmergencyPattern);
            return result;
        }

        let mut hint: Option<FuzzyMatch> = None;
        if self.fuzzy_gate.enabled && !self.fuzzy.is_empty() {
            record_invocation(SourceTier::FuzzyKeyword);
            if let Some(m) = self.fuzzy.best_match(text, context.language) {
                if m.score >= self.fuzzy_gate.threshold {
                    return ClassificationResult::new(m.intent, m.score, SourceTier::FuzzyKeyword)
                        .with_evidence(m.keyword);
                }
                debug!(intent = %m.intent, score = m.score, "fuzzy below threshold");
                if m.score >= self.fuzzy_skip_cutoff {
                    hint = Some(m);
                }
            }
        }

        if self.semantic_gate.enabled
            && let Some(semantic) = &self.semantic
            && !semantic.is_empty()
        {
            record_invocation(SourceTier::SemanticExample);
            match semantic.nearest(text).await {
                Ok(Some(m)) if m.score >= self.semantic_gate.threshold => {
                    return ClassificationResult::new(m.intent, m.score, SourceTier::SemanticExample)
                        .with_evidence(m.example);
                },
                Ok(Some(m)) => {
                    debug!(intent = %m.intent, score = m.score, "semantic below threshold");
                },
                Ok(None) => {},
                Err(e) => {
                    record_error(SourceTier::SemanticExample, e.kind());
                    warn!(error = %e, "semantic tier failed, falling through");
                },
            }
        }

        if self.generative_gate.enabled
            && let Some(generative) = &self.generative
        {
            record_invocation(SourceTier::GenerativeFallback);
            match generative.classify(text, context, hint.as_ref()).await {
                Ok(Some(m))
                    if m.intent != UNKNOWN_INTENT
                        && m.confidence >= self.generative_gate.threshold =>
                {
                    return ClassificationResult::new(
                        m.intent,
                        m.confidence,
                        SourceTier::GenerativeFallback,
                    )
                    .with_evidence(format!("{}: {}", m.provider_id, m.raw_label));
                },
                Ok(Some(m)) => {
                    debug!(intent = %m.intent, confidence = m.confidence, "generative below threshold");
                },
                Ok(None) => {},
                Err(e) => {
                    record_error(SourceTier::GenerativeFallback, e.kind());
                    warn!(error = %e, "generative tier failed");
                },
            }
        }

        ClassificationResult::unknown()
    }
}

#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
fn record_invocation(tier: SourceTier) {
    #[cfg(feature = "metrics")]
    counter!(classifier_metrics::TIER_INVOCATIONS_TOTAL, labels::TIER => tier.as_str()).increment(1);
}

#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
fn record_error(tier: SourceTier, kind: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(
        classifier_metrics::TIER_ERRORS_TOTAL,
        labels::TIER => tier.as_str(),
        labels::ERROR_TYPE => kind
    )
    .increment(1);
}
