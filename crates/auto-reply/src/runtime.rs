//! Immutable per-config snapshot: classifier, router, workflow registry and
//! engine built from one validated [`PelangiConfig`]. A reload builds a new
//! snapshot and swaps it in; messages already in flight keep the old one.

use std::sync::Arc;

use {
    chrono::{DateTime, NaiveDate, Utc},
    chrono_tz::Tz,
    pelangi_classifier::Classifier,
    pelangi_common::Language,
    pelangi_config::PelangiConfig,
    pelangi_providers::{EmbeddingProvider, TextGenerator},
    pelangi_routing::Router,
    pelangi_workflow::{
        EngineContext, ExternalActions, NoActions, TemplateContext, Variables, WorkflowEngine,
        WorkflowRegistry, template,
    },
    tracing::{info, warn},
};

use crate::error::Result;

/// Backends that outlive a config reload unless explicitly replaced.
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Option<Arc<dyn TextGenerator>>,
    pub embedder: Option<Arc<dyn EmbeddingProvider>>,
    pub actions: Arc<dyn ExternalActions>,
}

impl Collaborators {
    /// Provider chain, embedder and action client as configured. An empty
    /// provider chain leaves the generator unset.
    #[must_use]
    pub fn from_config(config: &PelangiConfig) -> Self {
        let chain = pelangi_providers::build_chain(&config.providers);
        let generator = if chain.is_empty() {
            None
        } else {
            Some(Arc::new(chain) as Arc<dyn TextGenerator>)
        };
        Self {
            generator,
            embedder: Some(pelangi_providers::build_embedder(
                &config.providers.embeddings,
            )),
            actions: pelangi_workflow::build_actions(config),
        }
    }

    /// No generator, no embedder and no external actions.
    #[must_use]
    pub fn offline() -> Self {
        Self {
            generator: None,
            embedder: None,
            actions: Arc::new(NoActions),
        }
    }

    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    #[must_use]
    pub fn with_actions(mut self, actions: Arc<dyn ExternalActions>) -> Self {
        self.actions = actions;
        self
    }
}

pub struct Runtime {
    config: Arc<PelangiConfig>,
    classifier: Classifier,
    router: Router,
    registry: WorkflowRegistry,
    engine: WorkflowEngine,
    collaborators: Collaborators,
    timezone: Tz,
}

impl Runtime {
    /// Fails when a workflow definition does not compile to a graph.
    pub fn build(config: PelangiConfig, collaborators: Collaborators) -> Result<Self> {
        let registry = WorkflowRegistry::from_config(&config)?;
        let classifier = Classifier::from_config(
            &config,
            collaborators.generator.clone(),
            collaborators.embedder.clone(),
        );
        let router = Router::from_config(&config);
        let engine = pelangi_workflow::build_engine(&config, Arc::clone(&collaborators.actions));
        let timezone = config.system.timezone.parse().unwrap_or(Tz::UTC);

        info!(
            workflows = registry.len(),
            templates = config.templates.len(),
            generator = collaborators.generator.is_some(),
            "runtime ready"
        );
        Ok(Self {
            config: Arc::new(config),
            classifier,
            router,
            registry,
            engine,
            collaborators,
            timezone,
        })
    }

    #[must_use]
    pub fn config(&self) -> &PelangiConfig {
        &self.config
    }

    #[must_use]
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    #[must_use]
    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    #[must_use]
    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    #[must_use]
    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    #[must_use]
    pub fn generator(&self) -> Option<&Arc<dyn TextGenerator>> {
        self.collaborators.generator.as_ref()
    }

    /// Calendar date in the hostel timezone.
    #[must_use]
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.timezone).date_naive()
    }

    #[must_use]
    pub fn system_variables(&self, now: DateTime<Utc>) -> Variables {
        template::system_variables(&self.config.system, now)
    }

    /// Render template `id` in the context's language, falling back to the
    /// built-in text of the same id. `None` (with a warning) when there is no
    /// text or a required placeholder is unbound.
    #[must_use]
    pub fn render_template(
        &self,
        id: &str,
        variables: &Variables,
        ctx: &EngineContext,
    ) -> Option<String> {
        let Some(raw) = self.config.template_text(id, ctx.language) else {
            warn!(template = id, "unknown template");
            return None;
        };
        let tctx = TemplateContext {
            variables,
            guest: &ctx.guest,
            system: &ctx.system,
        };
        match template::render(raw, &tctx) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(template = id, language = %ctx.language, error = %e, "template not rendered");
                None
            },
        }
    }

    /// Delivery address of the default staff recipient.
    #[must_use]
    pub fn default_recipient(&self) -> &str {
        let staff = &self.config.staff;
        staff.resolve(&staff.default_recipient)
    }

    /// True when `text` is one of the configured cancel words.
    #[must_use]
    pub fn is_cancel_word(&self, text: &str) -> bool {
        let text = pelangi_common::text::normalize(text);
        !text.is_empty()
            && self
                .config
                .orchestrator
                .cancel_words
                .iter()
                .any(|w| pelangi_common::text::normalize(w) == text)
    }
}

/// English name of a language, for generation prompts.
#[must_use]
pub fn language_name(language: Language) -> &'static str {
    match language {
        Language::En => "English",
        Language::Ms => "Malay",
        Language::Zh => "Simplified Chinese",
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {chrono::TimeZone, pelangi_common::ConversationKey, serde_json::json};

    use super::*;

    fn runtime() -> Runtime {
        let config = pelangi_config::default_config().unwrap().config;
        Runtime::build(config, Collaborators::offline()).unwrap()
    }

    #[test]
    fn today_uses_hostel_timezone() {
        let rt = runtime();
        // 20:00 UTC is already the next day in Kuala Lumpur.
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 20, 0, 0).unwrap();
        assert_eq!(rt.today(now), NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
    }

    #[test]
    fn renders_localized_template() {
        let rt = runtime();
        let ctx = EngineContext::new(
            ConversationKey::from("+60123"),
            Language::Ms,
            rt.system_variables(Utc::now()),
        );
        let text = rt.render_template("greeting", &Variables::new(), &ctx).unwrap();
        assert!(text.starts_with("Hai! Selamat datang ke Pelangi Capsule Hostel"));
        assert!(rt.render_template("no_such_template", &Variables::new(), &ctx).is_none());
    }

    #[test]
    fn builtin_text_backs_unconfigured_template() {
        let mut config = pelangi_config::default_config().unwrap().config;
        config.templates.clear();
        let rt = Runtime::build(config, Collaborators::offline()).unwrap();
        let ctx = EngineContext::new("k".into(), Language::Zh, Variables::new());
        assert_eq!(
            rt.render_template("workflow_failed", &Variables::new(), &ctx)
                .as_deref(),
            Some("抱歉出了点问题，工作人员会继续为您处理。")
        );
    }

    #[test]
    fn unresolved_template_is_none() {
        let mut config = pelangi_config::default_config().unwrap().config;
        config.templates.insert(
            "needs_name".into(),
            serde_json::from_value(json!({ "en": "Hi {{guest_name}}" })).unwrap(),
        );
        let rt = Runtime::build(config, Collaborators::offline()).unwrap();
        let ctx = EngineContext::new("k".into(), Language::En, Variables::new());
        assert!(rt.render_template("needs_name", &Variables::new(), &ctx).is_none());
    }

    #[test]
    fn cancel_words_ignore_case_and_punctuation() {
        let rt = runtime();
        assert!(rt.is_cancel_word("Cancel!"));
        assert!(rt.is_cancel_word(" BATAL "));
        assert!(rt.is_cancel_word("取消"));
        assert!(!rt.is_cancel_word("cancel my booking please"));
        assert!(!rt.is_cancel_word("?!"));
    }
}
