use std::{collections::BTreeMap, fmt};

use {
    chrono::{NaiveDate, Utc},
    serde::{Deserialize, Serialize},
};

use pelangi_common::Language;

/// Intent returned when no tier could classify the message.
pub const UNKNOWN_INTENT: &str = "unknown";

/// Which pipeline tier produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceTier {
    EmergencyPattern,
    FuzzyKeyword,
    SemanticExample,
    GenerativeFallback,
}

impl SourceTier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmergencyPattern => "emergency-pattern",
            Self::FuzzyKeyword => "fuzzy-keyword",
            Self::SemanticExample => "semantic-example",
            Self::GenerativeFallback => "generative-fallback",
        }
    }
}

impl fmt::Display for SourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying one message. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub intent: String,
    /// In `[0, 1]`.
    pub confidence: f32,
    /// `None` only for the `unknown` fallback.
    pub source_tier: Option<SourceTier>,
    /// Keyword, pattern or example that triggered the match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_evidence: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entities: BTreeMap<String, String>,
}

impl ClassificationResult {
    pub fn new(intent: impl Into<String>, confidence: f32, tier: SourceTier) -> Self {
        Self {
            intent: intent.into(),
            confidence: confidence.clamp(0.0, 1.0),
            source_tier: Some(tier),
            matched_evidence: None,
            entities: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn unknown() -> Self {
        Self {
            intent: UNKNOWN_INTENT.to_string(),
            confidence: 0.0,
            source_tier: None,
            matched_evidence: None,
            entities: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.matched_evidence = Some(evidence.into());
        self
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.intent == UNKNOWN_INTENT
    }

    #[must_use]
    pub fn is_emergency(&self) -> bool {
        self.source_tier == Some(SourceTier::EmergencyPattern)
    }
}

/// Per-conversation context handed to `classify`.
#[derive(Debug, Clone)]
pub struct ClassifyContext {
    /// Declared or previously detected language.
    pub language: Option<Language>,
    /// Earlier guest messages, oldest first.
    pub history: Vec<String>,
    /// Anchor for relative dates ("tomorrow") in extracted entities.
    pub today: NaiveDate,
}

impl ClassifyContext {
    #[must_use]
    pub fn new() -> Self {
        Self {
            language: None,
            history: Vec::new(),
            today: Utc::now().date_naive(),
        }
    }

    #[must_use]
    pub fn with_language(mut self, language: Option<Language>) -> Self {
        self.language = language;
        self
    }

    #[must_use]
    pub fn with_history(mut self, history: Vec<String>) -> Self {
        self.history = history;
        self
    }

    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }
}

impl Default for ClassifyContext {
    fn default() -> Self {
        Self::new()
    }
}
