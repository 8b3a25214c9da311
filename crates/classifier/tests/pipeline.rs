#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use {
    async_trait::async_trait,
    pelangi_classifier::{Classifier, ClassifyContext, SourceTier},
    pelangi_config::{ClassifierConfig, default_config},
    pelangi_providers::{
        EmbeddingProvider, Embeddings, GenerateRequest, Generation, HashingEmbedder, ProviderError,
        TextGenerator,
    },
};

// ── Counting collaborators ──────────────────────────────────────────────────

struct CountingEmbedder {
    inner: HashingEmbedder,
    calls: AtomicUsize,
}

impl CountingEmbedder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: HashingEmbedder::default(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    fn id(&self) -> &str {
        "counting"
    }

    async fn embed_batch(&self, texts: &[String]) -> pelangi_providers::Result<Embeddings> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed_batch(texts).await
    }
}

struct ScriptedGenerator {
    reply: Result<String, ProviderError>,
    calls: AtomicUsize,
    last_system: Mutex<Option<String>>,
}

impl ScriptedGenerator {
    fn replying(text: &str) -> Arc<Self> {
        Self::with(Ok(text.to_string()))
    }

    fn failing(error: ProviderError) -> Arc<Self> {
        Self::with(Err(error))
    }

    fn with(reply: Result<String, ProviderError>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
            last_system: Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerateRequest) -> pelangi_providers::Result<Generation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_system.lock().unwrap() = request.system.clone();
        self.reply.clone().map(|text| Generation {
            text,
            provider_id: "scripted".into(),
            latency_ms: 3,
        })
    }
}

fn default_classifier(
    generator: &Arc<ScriptedGenerator>,
    embedder: &Arc<CountingEmbedder>,
) -> Classifier {
    let config = default_config().unwrap().config;
    Classifier::from_config(
        &config,
        Some(Arc::clone(generator) as Arc<dyn TextGenerator>),
        Some(Arc::clone(embedder) as Arc<dyn EmbeddingProvider>),
    )
}

fn keywords(entries: &[(&str, &[&str])]) -> BTreeMap<String, BTreeMap<String, Vec<String>>> {
    entries
        .iter()
        .map(|(intent, words)| {
            let mut by_lang = BTreeMap::new();
            by_lang.insert(
                "en".to_string(),
                words.iter().map(|w| (*w).to_string()).collect(),
            );
            ((*intent).to_string(), by_lang)
        })
        .collect()
}

// ── Scenarios ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn tq_is_thanks_from_fuzzy_tier_without_later_tiers() {
    let generator = ScriptedGenerator::replying(r#"{"intent":"complaint"}"#);
    let embedder = CountingEmbedder::new();
    let classifier = default_classifier(&generator, &embedder);

    let result = classifier.classify("tq", &ClassifyContext::new()).await;

    assert_eq!(result.intent, "thanks");
    assert_eq!(result.source_tier, Some(SourceTier::FuzzyKeyword));
    assert_eq!(result.confidence, 1.0);
    assert_eq!(result.matched_evidence.as_deref(), Some("tq"));
    assert_eq!(embedder.calls(), 0);
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn fire_is_an_emergency_regardless_of_other_tiers() {
    let generator = ScriptedGenerator::replying(r#"{"intent":"thanks"}"#);
    let embedder = CountingEmbedder::new();
    let classifier = default_classifier(&generator, &embedder);

    let result = classifier.classify("fire", &ClassifyContext::new()).await;

    assert_eq!(result.intent, "fire_emergency");
    assert_eq!(result.source_tier, Some(SourceTier::EmergencyPattern));
    assert_eq!(result.confidence, 1.0);
    assert!(result.is_emergency());
    assert_eq!(embedder.calls(), 0);
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn check_in_request_is_classified() {
    let generator = ScriptedGenerator::replying("{}");
    let embedder = CountingEmbedder::new();
    let classifier = default_classifier(&generator, &embedder);

    let result = classifier
        .classify("I want to check in", &ClassifyContext::new())
        .await;
    assert_eq!(result.intent, "check_in_arrival");
    assert_eq!(result.source_tier, Some(SourceTier::FuzzyKeyword));
}

#[tokio::test]
async fn entities_ride_along() {
    let generator = ScriptedGenerator::replying("{}");
    let embedder = CountingEmbedder::new();
    let classifier = default_classifier(&generator, &embedder);

    let result = classifier
        .classify("check in 2 pax, my number 012-345 6789", &ClassifyContext::new())
        .await;
    assert_eq!(result.entities.get("guests").map(String::as_str), Some("2"));
    assert_eq!(
        result.entities.get("phone").map(String::as_str),
        Some("0123456789")
    );
}

#[tokio::test]
async fn below_threshold_fuzzy_falls_through_to_semantic() {
    let mut config = ClassifierConfig::default();
    config.fuzzy.keywords = keywords(&[("thanks", &["thank you"])]);
    config
        .semantic
        .examples
        .insert("lost_item".into(), vec!["I lost my charger".into()]);

    let generator = ScriptedGenerator::replying(r#"{"intent":"thanks"}"#);
    let embedder = CountingEmbedder::new();
    let classifier = Classifier::new(
        &config,
        vec!["thanks".into(), "lost_item".into()],
        Some(generator.clone()),
        Some(embedder.clone()),
    );

    let result = classifier
        .classify("I lost my charger", &ClassifyContext::new())
        .await;
    assert_eq!(result.intent, "lost_item");
    assert_eq!(result.source_tier, Some(SourceTier::SemanticExample));
    assert!(embedder.calls() >= 1);
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn generative_tier_answers_when_others_miss() {
    let mut config = ClassifierConfig::default();
    config
        .semantic
        .examples
        .insert("lost_item".into(), vec!["I lost my charger".into()]);

    let generator = ScriptedGenerator::replying(r#"{"intent":"pricing_inquiry","confidence":0.8}"#);
    let embedder = CountingEmbedder::new();
    let classifier = Classifier::new(
        &config,
        vec!["lost_item".into(), "pricing_inquiry".into()],
        Some(generator.clone()),
        Some(embedder.clone()),
    );

    let result = classifier
        .classify("brp ringgit semalam", &ClassifyContext::new())
        .await;
    assert_eq!(result.intent, "pricing_inquiry");
    assert_eq!(result.source_tier, Some(SourceTier::GenerativeFallback));
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn near_miss_fuzzy_score_is_passed_to_generative_as_hint() {
    let mut config = ClassifierConfig::default();
    config.fuzzy.threshold = 0.95;
    config.fuzzy.keywords = keywords(&[("thanks", &["thanks"])]);
    config.semantic.enabled = false;

    let generator = ScriptedGenerator::replying(r#"{"intent":"thanks","confidence":0.9}"#);
    let classifier = Classifier::new(
        &config,
        vec!["thanks".into()],
        Some(generator.clone()),
        None,
    );

    let result = classifier.classify("thankss", &ClassifyContext::new()).await;
    assert_eq!(result.source_tier, Some(SourceTier::GenerativeFallback));
    let system = generator.last_system.lock().unwrap().clone().unwrap();
    assert!(system.contains("Keyword matching suggests \"thanks\""), "{system}");
}

#[tokio::test]
async fn exhausted_providers_yield_unknown() {
    let generator = ScriptedGenerator::failing(ProviderError::Exhausted {
        failures: Vec::new(),
    });
    let mut config = ClassifierConfig::default();
    config.semantic.enabled = false;
    let classifier = Classifier::new(&config, vec![], Some(generator.clone()), None);

    let result = classifier
        .classify("qwerty asdf", &ClassifyContext::new())
        .await;
    assert!(result.is_unknown());
    assert_eq!(result.confidence, 0.0);
    assert_eq!(result.source_tier, None);
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn every_tier_disabled_is_unknown() {
    let mut config = ClassifierConfig::default();
    config.emergency.enabled = false;
    config.fuzzy.enabled = false;
    config.semantic.enabled = false;
    config.generative.enabled = false;
    let classifier = Classifier::new(&config, vec![], None, None);

    let result = classifier.classify("fire", &ClassifyContext::new()).await;
    assert!(result.is_unknown());
    assert_eq!(result.source_tier, None);
}

#[tokio::test]
async fn blank_text_is_unknown() {
    let classifier = Classifier::new(&ClassifierConfig::default(), vec![], None, None);
    assert!(classifier.classify("   ", &ClassifyContext::new()).await.is_unknown());
}
