//! Generative-fallback tier: asks the provider chain to pick an intent.

use std::sync::Arc;

use {serde::Deserialize, tracing::debug};

use {
    pelangi_config::GenerativeTierConfig,
    pelangi_providers::{ChatMessage, GenerateRequest, TextGenerator},
};

use crate::{
    error::{Result, TierError},
    fuzzy::FuzzyMatch,
    intent_mapper::IntentMapper,
    result::{ClassifyContext, UNKNOWN_INTENT},
};

/// Confidence assumed when the provider names an intent but no number.
const DEFAULT_CONFIDENCE: f32 = 0.7;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerativeMatch {
    pub intent: String,
    pub confidence: f32,
    /// Label as returned by the provider, before mapping.
    pub raw_label: String,
    pub provider_id: String,
}

#[derive(Deserialize)]
struct IntentReply {
    intent: String,
    #[serde(default)]
    confidence: Option<f32>,
}

pub struct GenerativeTier {
    generator: Arc<dyn TextGenerator>,
    mapper: IntentMapper,
    max_history: usize,
}

impl GenerativeTier {
    pub fn new(
        config: &GenerativeTierConfig,
        vocabulary: impl IntoIterator<Item = String>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            generator,
            mapper: IntentMapper::new(vocabulary, &config.aliases),
            max_history: config.max_history,
        }
    }

    fn system_prompt(&self, hint: Option<&FuzzyMatch>) -> String {
        let vocabulary: Vec<&str> = self.mapper.vocabulary().collect();
        let mut prompt = format!(
            "You classify messages sent by hostel guests.\n\
             Reply with JSON only: {{\"intent\": \"<label>\", \"confidence\": <0.0-1.0>}}.\n\
             Allowed labels: {}, {UNKNOWN_INTENT}.\n\
             Use \"{UNKNOWN_INTENT}\" when none of the labels fit.",
            vocabulary.join(", ")
        );
        if let Some(hint) = hint {
            prompt.push_str(&format!(
                "\nKeyword matching suggests \"{}\" (matched \"{}\").",
                hint.intent, hint.keyword
            ));
        }
        prompt
    }

    pub async fn classify(
        &self,
        text: &str,
        context: &ClassifyContext,
        hint: Option<&FuzzyMatch>,
    ) -> Result<Option<GenerativeMatch>> {
        let skip = context.history.len().saturating_sub(self.max_history);
        let history = context.history[skip..]
            .iter()
            .map(|h| ChatMessage::user(h.clone()))
            .collect();
        let request = GenerateRequest::new(text)
            .with_system(self.system_prompt(hint))
            .with_history(history)
            .with_temperature(0.0);

        let generation = self.generator.generate(&request).await?;
        let (label, confidence) = parse_reply(&generation.text, self.mapper.vocabulary())
            .ok_or_else(|| TierError::Unparseable(generation.text.clone()))?;

        let Some(intent) = self.mapper.map(&label, text) else {
            debug!(label = %label, "generative label outside vocabulary");
            return Ok(None);
        };
        Ok(Some(GenerativeMatch {
            intent,
            confidence,
            raw_label: label,
            provider_id: generation.provider_id,
        }))
    }
}

/// Extract `(label, confidence)` from a provider reply.
///
/// Accepts a JSON object anywhere in the text (code fences and chatter are
/// ignored). Without JSON, a bare vocabulary label in the text is accepted at
/// a reduced confidence.
fn parse_reply<'a>(
    reply: &str,
    vocabulary: impl Iterator<Item = &'a str>,
) -> Option<(String, f32)> {
    if let (Some(start), Some(end)) = (reply.find('{'), reply.rfind('}'))
        && start < end
        && let Ok(parsed) = serde_json::from_str::<IntentReply>(&reply[start..=end])
    {
        let confidence = parsed
            .confidence
            .filter(|c| c.is_finite())
            .unwrap_or(DEFAULT_CONFIDENCE)
            .clamp(0.0, 1.0);
        return Some((parsed.intent, confidence));
    }

    let lowered = reply.to_lowercase();
    let mut labels: Vec<&str> = vocabulary.collect();
    // Longest first so "noise_complaint_infant" beats "noise_complaint".
    labels.sort_by_key(|l| std::cmp::Reverse(l.len()));
    labels
        .into_iter()
        .find(|l| lowered.contains(l))
        .map(|l| (l.to_string(), DEFAULT_CONFIDENCE * 0.8))
        .or_else(|| lowered.contains(UNKNOWN_INTENT).then(|| (UNKNOWN_INTENT.to_string(), 0.0)))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use {
        async_trait::async_trait,
        pelangi_providers::{Generation, ProviderError},
    };

    use super::*;

    struct Scripted {
        reply: std::result::Result<String, ProviderError>,
        calls: AtomicUsize,
        last: Mutex<Option<GenerateRequest>>,
    }

    impl Scripted {
        fn new(reply: std::result::Result<&str, ProviderError>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string),
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate(
            &self,
            request: &GenerateRequest,
        ) -> pelangi_providers::Result<Generation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(request.clone());
            self.reply.clone().map(|text| Generation {
                text,
                provider_id: "scripted".into(),
                latency_ms: 1,
            })
        }
    }

    fn tier(generator: Arc<Scripted>) -> GenerativeTier {
        let vocabulary = ["complaint", "post_checkout_complaint", "pricing_inquiry"].map(String::from);
        GenerativeTier::new(
            &GenerativeTierConfig {
                max_history: 2,
                ..GenerativeTierConfig::default()
            },
            vocabulary,
            generator,
        )
    }

    #[tokio::test]
    async fn parses_fenced_json_and_maps_intent() {
        let generator = Scripted::new(Ok(
            "```json\n{\"intent\": \"complaint\", \"confidence\": 0.9}\n```",
        ));
        let m = tier(generator)
            .classify(
                "I already checked out but was charged twice",
                &ClassifyContext::new(),
                None,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(m.intent, "post_checkout_complaint");
        assert_eq!(m.raw_label, "complaint");
        assert!((m.confidence - 0.9).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn bare_label_is_accepted() {
        let generator = Scripted::new(Ok("That sounds like pricing_inquiry to me."));
        let m = tier(generator)
            .classify("how much ah", &ClassifyContext::new(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(m.intent, "pricing_inquiry");
        assert!(m.confidence < DEFAULT_CONFIDENCE);
    }

    #[tokio::test]
    async fn history_is_truncated_and_hint_included() {
        let generator = Scripted::new(Ok(r#"{"intent":"unknown","confidence":0.1}"#));
        let context = ClassifyContext::new().with_history(vec![
            "one".into(),
            "two".into(),
            "three".into(),
        ]);
        let hint = FuzzyMatch {
            intent: "pricing_inquiry".into(),
            score: 0.86,
            keyword: "price".into(),
        };
        let m = tier(generator.clone())
            .classify("hmm", &context, Some(&hint))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(m.intent, "unknown");

        let request = generator.last.lock().unwrap().clone().unwrap();
        let contents: Vec<&str> = request.history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["two", "three"]);
        assert!(request.system.unwrap().contains("pricing_inquiry"));
    }

    #[tokio::test]
    async fn out_of_vocabulary_label_is_no_match() {
        let generator = Scripted::new(Ok(r#"{"intent":"weather"}"#));
        let m = tier(generator)
            .classify("is it raining", &ClassifyContext::new(), None)
            .await
            .unwrap();
        assert!(m.is_none());
    }

    #[tokio::test]
    async fn provider_exhaustion_is_tier_error() {
        let generator = Scripted::new(Err(ProviderError::Exhausted { failures: vec![] }));
        let err = tier(generator)
            .classify("hi", &ClassifyContext::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, TierError::Provider(ProviderError::Exhausted { .. })));
    }

    #[test]
    fn gibberish_is_unparseable() {
        assert!(parse_reply("no idea", ["complaint"].into_iter()).is_none());
    }
}
