//! Config schema types (classifier tiers, providers, routing table, templates,
//! workflows, staff, runtime limits).

use std::{collections::BTreeMap, path::PathBuf};

use {
    pelangi_common::Language,
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

use crate::{
    builtin,
    workflow::{LocalizedText, WorkflowDefinition},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PelangiConfig {
    pub system: SystemConfig,
    pub classifier: ClassifierConfig,
    pub providers: ProvidersConfig,
    pub routing: RoutingConfig,
    /// Reply templates keyed by id.
    pub templates: BTreeMap<String, LocalizedText>,
    pub staff: StaffConfig,
    pub actions: ActionsConfig,
    pub orchestrator: OrchestratorConfig,
    pub sessions: SessionsConfig,
    pub metrics: MetricsConfig,
    /// Directory of one-definition-per-file workflows, relative to the config file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflows_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub workflows: Vec<WorkflowDefinition>,
}

impl PelangiConfig {
    /// Render-ready text of a template in `language`. Configured templates
    /// shadow the built-in text of the same id.
    #[must_use]
    pub fn template_text(&self, id: &str, language: Language) -> Option<&str> {
        match self.templates.get(id) {
            Some(t) => Some(t.for_language(language)),
            None => builtin::builtin_text(id, language),
        }
    }

    /// True when `id` is configured or has built-in text.
    #[must_use]
    pub fn has_template(&self, id: &str) -> bool {
        self.templates.contains_key(id) || builtin::is_builtin(id)
    }

    #[must_use]
    pub fn workflow(&self, id: &str) -> Option<&WorkflowDefinition> {
        self.workflows.iter().find(|w| w.id == id)
    }

    /// Every intent label the configuration knows about: routing keys,
    /// keyword intents, semantic example intents and emergency intents.
    #[must_use]
    pub fn known_intents(&self) -> Vec<String> {
        let mut intents: Vec<String> = self
            .routing
            .intents
            .keys()
            .chain(self.classifier.fuzzy.keywords.keys())
            .chain(self.classifier.semantic.examples.keys())
            .chain(self.classifier.emergency.patterns.iter().map(|p| &p.intent))
            .cloned()
            .collect();
        intents.sort();
        intents.dedup();
        intents
    }
}

// ── System ──────────────────────────────────────────────────────────────────

/// Hostel-wide constants exposed to templates as `{{system.*}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub hostel_name: String,
    /// IANA timezone used for `{{system.date}}` / `{{system.time}}`.
    pub timezone: String,
    /// Extra static constants (`wifi_password`, `check_in_time`, …).
    pub constants: BTreeMap<String, String>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            hostel_name: "Pelangi Capsule Hostel".into(),
            timezone: "Asia/Kuala_Lumpur".into(),
            constants: BTreeMap::new(),
        }
    }
}

// ── Classifier ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub emergency: EmergencyTierConfig,
    pub fuzzy: FuzzyTierConfig,
    pub semantic: SemanticTierConfig,
    pub generative: GenerativeTierConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergencyTierConfig {
    pub enabled: bool,
    /// Checked in order; the first match wins.
    pub patterns: Vec<EmergencyPattern>,
}

impl Default for EmergencyTierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            patterns: default_emergency_patterns(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyPattern {
    pub intent: String,
    /// Regular expression (Rust `regex` syntax).
    pub pattern: String,
}

impl EmergencyPattern {
    pub fn new(intent: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            pattern: pattern.into(),
        }
    }
}

fn default_emergency_patterns() -> Vec<EmergencyPattern> {
    vec![
        EmergencyPattern::new(
            "fire_emergency",
            r"(?i)\b(fire|smoke|burning|kebakaran|terbakar)\b|火灾|着火",
        ),
        EmergencyPattern::new(
            "theft_report",
            r"(?i)\b(stolen|theft|thief|robbed|dicuri|kecurian|pencuri)\b|被偷|小偷",
        ),
        EmergencyPattern::new(
            "medical_emergency",
            r"(?i)\b(ambulance|unconscious|heart attack|bleeding|can'?t breathe|pengsan|kecemasan)\b|救护车|晕倒",
        ),
        EmergencyPattern::new(
            "lockout",
            r"(?i)\b(locked out|lost (my )?(key|card|access card)|terkunci)\b|锁在外面",
        ),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyTierConfig {
    pub enabled: bool,
    /// Minimum normalized similarity for an immediate answer.
    pub threshold: f32,
    /// intent → language code (`en`, `ms`, `zh`, or `any`) → keywords.
    pub keywords: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl Default for FuzzyTierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.80,
            keywords: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticTierConfig {
    pub enabled: bool,
    pub threshold: f32,
    /// A fuzzy score at or above this (but under the fuzzy threshold) is
    /// carried forward as a hint to the generative tier.
    pub fuzzy_skip_cutoff: f32,
    /// intent → labelled example phrases.
    pub examples: BTreeMap<String, Vec<String>>,
}

impl Default for SemanticTierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.75,
            fuzzy_skip_cutoff: 0.85,
            examples: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerativeTierConfig {
    pub enabled: bool,
    pub threshold: f32,
    /// Generic provider labels → intent vocabulary (`"greeting" = "greeting_hello"`).
    pub aliases: BTreeMap<String, String>,
    /// Number of previous guest messages included in the prompt.
    pub max_history: usize,
}

impl Default for GenerativeTierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.5,
            aliases: BTreeMap::new(),
            max_history: 6,
        }
    }
}

// ── Providers ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// LLM providers in priority order.
    pub chain: Vec<ProviderEntry>,
    pub embeddings: EmbeddingsConfig,
}

/// Wire protocol spoken by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// `POST {base_url}/chat/completions` (OpenAI, Groq, OpenRouter, Ollama …).
    #[default]
    #[serde(alias = "openai")]
    OpenaiCompat,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub id: String,
    #[serde(default)]
    pub kind: ProviderKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
    pub model: String,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl ProviderEntry {
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ProviderKind::default(),
            enabled: true,
            base_url: default_openai_base_url(),
            api_key: None,
            model: model.into(),
            timeout_secs: default_provider_timeout(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl std::fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("enabled", &self.enabled)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    /// Remote embedding providers tried in order.
    pub chain: Vec<EmbeddingEntry>,
    /// Append the local hashing embedder as the last resort.
    pub local_fallback: bool,
    /// Dimensions of the local embedder.
    pub dimensions: usize,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            chain: Vec::new(),
            local_fallback: true,
            dimensions: 256,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingEntry {
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
    pub model: String,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl EmbeddingEntry {
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            base_url: default_openai_base_url(),
            api_key: None,
            model: model.into(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl std::fmt::Debug for EmbeddingEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingEntry")
            .field("id", &self.id)
            .field("enabled", &self.enabled)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_provider_timeout() -> u64 {
    10
}

fn default_embedding_timeout() -> u64 {
    5
}

fn default_max_tokens() -> u32 {
    300
}

fn default_temperature() -> f32 {
    0.3
}

fn default_true() -> bool {
    true
}

// ── Routing ─────────────────────────────────────────────────────────────────

/// What to do with a classified intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RouteEntry {
    StaticReply {
        template: String,
    },
    GeneratedReply {
        /// Extra system instructions for the reply generator.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instructions: Option<String>,
    },
    StartWorkflow {
        workflow: String,
    },
    Escalate {
        /// Staff recipient; defaults to `staff.default_recipient`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        recipient: Option<String>,
        /// Template sent to the guest while staff take over.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reply_template: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// intent → action.
    pub intents: BTreeMap<String, RouteEntry>,
    /// Action for intents missing from the table (including `unknown`).
    pub default: RouteEntry,
    /// Intents that escalate whatever the table says.
    pub always_escalate: Vec<String>,
    /// Template used when every provider fails during a generated reply.
    pub generated_reply_fallback: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            intents: BTreeMap::new(),
            default: RouteEntry::Escalate {
                recipient: None,
                reply_template: Some("escalation_unknown".into()),
            },
            always_escalate: vec!["noise_complaint_infant".into()],
            generated_reply_fallback: "fallback".into(),
        }
    }
}

// ── Staff / actions ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StaffConfig {
    pub default_recipient: String,
    /// Named recipients → delivery address (phone number, group id …).
    pub recipients: BTreeMap<String, String>,
}

impl Default for StaffConfig {
    fn default() -> Self {
        Self {
            default_recipient: "front_desk".into(),
            recipients: BTreeMap::new(),
        }
    }
}

impl StaffConfig {
    /// Map a named recipient to its address; unknown names pass through.
    #[must_use]
    pub fn resolve<'a>(&'a self, recipient: &'a str) -> &'a str {
        self.recipients
            .get(recipient)
            .map_or(recipient, String::as_str)
    }
}

/// External booking system reached by `external_call` nodes.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    /// MCP endpoint; `None` disables external calls (every call fails).
    pub endpoint: Option<String>,
    /// Prefix prepended to action names to form the MCP tool name.
    pub tool_prefix: String,
    pub timeout_secs: u64,
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            endpoint: Some("http://localhost:3001/mcp".into()),
            tool_prefix: "pelangi_".into(),
            timeout_secs: 10,
            api_key: None,
        }
    }
}

impl std::fmt::Debug for ActionsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionsConfig")
            .field("endpoint", &self.endpoint)
            .field("tool_prefix", &self.tool_prefix)
            .field("timeout_secs", &self.timeout_secs)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ── Orchestrator ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Wall-clock budget for handling one inbound message.
    pub budget_secs: u64,
    /// Inbound messages remembered per conversation.
    pub history_len: usize,
    /// Message ids remembered per conversation for duplicate detection.
    pub dedup_window: usize,
    /// Node visits allowed per start/resume call.
    pub max_workflow_steps: u32,
    /// Replies that cancel a waiting workflow.
    pub cancel_words: Vec<String>,
    pub hold_template: String,
    pub cancelled_template: String,
    pub workflow_failed_template: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            budget_secs: 20,
            history_len: 10,
            dedup_window: 50,
            max_workflow_steps: 50,
            cancel_words: ["cancel", "stop", "batal", "取消"]
                .into_iter()
                .map(String::from)
                .collect(),
            hold_template: "please_hold".into(),
            cancelled_template: "workflow_cancelled".into(),
            workflow_failed_template: "workflow_failed".into(),
        }
    }
}

// ── Sessions / metrics ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    pub backend: SessionBackend,
    /// SQLite database file; defaults to `sessions.db` in the data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Labels attached to every metric.
    pub labels: BTreeMap<String, String>,
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg: PelangiConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.system.timezone, "Asia/Kuala_Lumpur");
        assert!((cfg.classifier.fuzzy.threshold - 0.80).abs() < f32::EPSILON);
        assert!((cfg.classifier.semantic.fuzzy_skip_cutoff - 0.85).abs() < f32::EPSILON);
        assert_eq!(cfg.orchestrator.max_workflow_steps, 50);
        assert_eq!(cfg.classifier.emergency.patterns.len(), 4);
        assert!(matches!(cfg.routing.default, RouteEntry::Escalate { .. }));
    }

    #[test]
    fn route_entries_are_tagged_by_action() {
        let cfg: PelangiConfig = toml::from_str(
            r#"
[routing.intents.thanks]
action = "static_reply"
template = "thanks"

[routing.intents.check_in_arrival]
action = "start_workflow"
workflow = "check_in"

[routing.intents.general_question]
action = "generated_reply"
"#,
        )
        .unwrap();
        assert_eq!(
            cfg.routing.intents["check_in_arrival"],
            RouteEntry::StartWorkflow {
                workflow: "check_in".into()
            }
        );
        assert_eq!(
            cfg.routing.intents["general_question"],
            RouteEntry::GeneratedReply { instructions: None }
        );
    }

    #[test]
    fn provider_api_key_is_redacted_in_debug() {
        let cfg: PelangiConfig = toml::from_str(
            r#"
[[providers.chain]]
id = "groq"
base_url = "https://api.groq.com/openai/v1"
api_key = "sk-very-secret"
model = "llama-3.1-8b-instant"
"#,
        )
        .unwrap();
        let entry = &cfg.providers.chain[0];
        assert_eq!(entry.timeout_secs, 10);
        assert_eq!(entry.api_key.as_ref().unwrap().expose_secret(), "sk-very-secret");
        let debug = format!("{entry:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn staff_recipient_resolution() {
        let mut staff = StaffConfig::default();
        staff
            .recipients
            .insert("front_desk".into(), "+60120000000".into());
        assert_eq!(staff.resolve("front_desk"), "+60120000000");
        assert_eq!(staff.resolve("+6019"), "+6019");
    }

    #[test]
    fn known_intents_merges_all_sources() {
        let mut cfg = PelangiConfig::default();
        cfg.classifier
            .fuzzy
            .keywords
            .insert("thanks".into(), BTreeMap::new());
        cfg.classifier
            .semantic
            .examples
            .insert("wifi_password".into(), vec!["what is the wifi".into()]);
        let intents = cfg.known_intents();
        assert!(intents.contains(&"thanks".to_string()));
        assert!(intents.contains(&"wifi_password".to_string()));
        assert!(intents.contains(&"fire_emergency".to_string()));
    }
}
