//! The per-message pipeline.
//!
//! For each inbound message: drop duplicate deliveries, settle the language,
//! then either feed the reply to the waiting workflow or classify and route
//! it and perform the chosen action. Work for one conversation is
//! serialized; work for different conversations runs concurrently.
//!
//! Handling runs against a wall-clock budget. When it runs out the guest
//! gets a hold reply and the message is queued on the conversation record;
//! the next inbound message (or [`Orchestrator::sweep_retries`]) runs it
//! again.

use std::{
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};

use {
    chrono::{DateTime, Utc},
    pelangi_classifier::ClassifyContext,
    pelangi_common::{ConversationKey, InboundMessage, Language, OutboundAction},
    pelangi_config::{PelangiConfig, builtin, validate},
    pelangi_providers::{ChatMessage, GenerateRequest},
    pelangi_routing::{ConversationState, EscalationReason, RouteAction, RoutingDecision},
    pelangi_sessions::{ConversationRecord, ConversationStore},
    pelangi_workflow::{
        EngineContext, InstanceStatus, StepOutcome, StepReport, Variables, WorkflowError,
        WorkflowInstance,
    },
    serde_json::Value,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use pelangi_metrics::{counter, histogram, labels, messages as message_metrics};

use crate::{
    error::Result,
    locks::ConversationLocks,
    outbound::{Outbound, deliver},
    runtime::{Collaborators, Runtime, language_name},
};

/// Budget overruns a held message survives before staff take over.
pub const MAX_RETRY_ATTEMPTS: u32 = 3;

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Already handled under the same message id.
    Duplicate,
    /// Classified and routed. Emergencies raised while a workflow waits
    /// land here too; the workflow stays suspended.
    Routed(RoutingDecision),
    /// A workflow was started or advanced.
    Workflow {
        workflow: String,
        outcome: StepOutcome,
    },
    /// The guest cancelled the waiting workflow.
    Cancelled { workflow: String },
    /// Out of time; a hold reply went out and the message is queued.
    Held,
}

impl Disposition {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::Routed(_) => "routed",
            Self::Workflow { .. } => "workflow",
            Self::Cancelled { .. } => "cancelled",
            Self::Held => "held",
        }
    }
}

/// Output of one timed pass. Finished instances are archived only once the
/// pass completes within budget.
#[derive(Default)]
struct Batch {
    actions: Vec<OutboundAction>,
    finished: Vec<WorkflowInstance>,
    last: Option<Disposition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HandleOutcome {
    /// Everything to send, in emission order.
    pub actions: Vec<OutboundAction>,
    pub disposition: Disposition,
}

pub struct Orchestrator {
    runtime: RwLock<Arc<Runtime>>,
    store: Arc<dyn ConversationStore>,
    locks: ConversationLocks,
    outbound: Option<Arc<dyn Outbound>>,
}

impl Orchestrator {
    pub fn new(runtime: Runtime, store: Arc<dyn ConversationStore>) -> Self {
        Self {
            runtime: RwLock::new(Arc::new(runtime)),
            store,
            locks: ConversationLocks::new(),
            outbound: None,
        }
    }

    /// Build everything `config` describes: providers, actions and the
    /// configured session store.
    pub async fn from_config(config: PelangiConfig) -> Result<Self> {
        let store = pelangi_sessions::open_store(&config.sessions).await?;
        let collaborators = Collaborators::from_config(&config);
        Ok(Self::new(Runtime::build(config, collaborators)?, store))
    }

    /// Also deliver every action through `outbound` once handling is done.
    #[must_use]
    pub fn with_outbound(mut self, outbound: Arc<dyn Outbound>) -> Self {
        self.outbound = Some(outbound);
        self
    }

    /// The snapshot new messages are handled with.
    #[must_use]
    pub fn runtime(&self) -> Arc<Runtime> {
        Arc::clone(&self.runtime.read().unwrap_or_else(|e| e.into_inner()))
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Swap in a new configuration, keeping the current backends. Messages
    /// already in flight finish on the old snapshot.
    pub fn reload(&self, config: PelangiConfig) -> Result<()> {
        let collaborators = self.runtime().collaborators().clone();
        self.reload_with(config, collaborators)
    }

    /// Rejects a config with error-level diagnostics; the current snapshot
    /// stays live.
    pub fn reload_with(&self, config: PelangiConfig, collaborators: Collaborators) -> Result<()> {
        let result = validate::validate_config(&config);
        if result.has_errors() {
            let errors: Vec<String> = result.errors().map(ToString::to_string).collect();
            warn!(errors = errors.len(), "reload rejected, keeping current configuration");
            return Err(pelangi_config::Error::Invalid { errors }.into());
        }
        let runtime = Arc::new(Runtime::build(config, collaborators)?);
        *self.runtime.write().unwrap_or_else(|e| e.into_inner()) = runtime;
        info!("configuration reloaded");
        Ok(())
    }

    /// Handle one message and return what to send.
    pub async fn handle_message(
        &self,
        conversation_key: impl Into<ConversationKey>,
        text: impl Into<String>,
        received_at: DateTime<Utc>,
    ) -> Result<Vec<OutboundAction>> {
        let message = InboundMessage::new(conversation_key, text).received_at(received_at);
        Ok(self.handle(message).await?.actions)
    }

    pub async fn handle(&self, message: InboundMessage) -> Result<HandleOutcome> {
        message.trimmed_text()?;
        let started = Instant::now();
        #[cfg(feature = "metrics")]
        counter!(message_metrics::RECEIVED_TOTAL).increment(1);

        let key = message.conversation_key.clone();
        let _guard = self.locks.acquire(&key).await;
        let rt = self.runtime();
        let settings = &rt.config().orchestrator;

        let mut record = self
            .store
            .load(&key)
            .await?
            .unwrap_or_else(|| ConversationRecord::new(key.clone()));

        if let Some(id) = message.message_id.as_deref()
            && record.has_seen(id)
        {
            debug!(conversation = %key, message_id = id, "duplicate delivery dropped");
            #[cfg(feature = "metrics")]
            counter!(message_metrics::DUPLICATES_TOTAL).increment(1);
            return Ok(HandleOutcome {
                actions: Vec::new(),
                disposition: Disposition::Duplicate,
            });
        }

        // Work on a copy so an abandoned run leaves the stored state intact.
        let mut working = record.clone();
        let run = tokio::time::timeout(
            budget(&rt),
            self.process_batch(&rt, &mut working, Some(&message)),
        )
        .await;

        let (actions, disposition) = match run {
            Ok(result) => {
                let batch = result?;
                self.archive_finished(&batch.finished).await?;
                record = working;
                (batch.actions, batch.last.unwrap_or(Disposition::Held))
            },
            Err(_) => {
                warn!(
                    conversation = %key,
                    budget_secs = settings.budget_secs,
                    "handling exceeded budget, holding message"
                );
                #[cfg(feature = "metrics")]
                counter!(message_metrics::BUDGET_EXCEEDED_TOTAL).increment(1);
                record.defer(message.clone());
                let ctx = engine_context(&rt, &record.key, language_of(&message, &record));
                let mut actions = Vec::new();
                reply_or_escalate(
                    &rt,
                    &settings.hold_template,
                    builtin::PLEASE_HOLD,
                    &Variables::new(),
                    &ctx,
                    &mut actions,
                );
                (actions, Disposition::Held)
            },
        };

        if let Some(id) = &message.message_id {
            record.remember_message_id(id.clone(), settings.dedup_window);
        }
        record.touch();
        self.store.save(&record).await?;
        self.dispatch(&actions).await;

        #[cfg(feature = "metrics")]
        histogram!(message_metrics::HANDLING_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        info!(
            conversation = %key,
            disposition = disposition.as_str(),
            actions = actions.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "message handled"
        );
        Ok(HandleOutcome {
            actions,
            disposition,
        })
    }

    /// Re-run held messages for every conversation that has some. Returns
    /// what each retried conversation produced. A conversation that fails
    /// is logged and left held; the others still run.
    pub async fn sweep_retries(&self) -> Result<Vec<(ConversationKey, Vec<OutboundAction>)>> {
        let mut handled = Vec::new();
        for key in self.store.pending_retries().await? {
            match self.retry_held(&key).await {
                Ok(Some(actions)) => handled.push((key, actions)),
                Ok(None) => {},
                Err(e) => warn!(conversation = %key, error = %e, "retry failed"),
            }
        }
        Ok(handled)
    }

    /// `None` when nothing was held or the retry ran out of time again.
    async fn retry_held(&self, key: &ConversationKey) -> Result<Option<Vec<OutboundAction>>> {
        let _guard = self.locks.acquire(key).await;
        let Some(mut record) = self.store.load(key).await? else {
            return Ok(None);
        };
        if record.pending_retry.is_none() {
            return Ok(None);
        }
        let rt = self.runtime();
        let mut working = record.clone();
        let run =
            tokio::time::timeout(budget(&rt), self.process_batch(&rt, &mut working, None)).await;
        match run {
            Ok(result) => {
                let batch = result?;
                self.archive_finished(&batch.finished).await?;
                record = working;
                record.touch();
                self.store.save(&record).await?;
                self.dispatch(&batch.actions).await;
                Ok(Some(batch.actions))
            },
            Err(_) => {
                warn!(conversation = %key, "retry exceeded budget again");
                #[cfg(feature = "metrics")]
                counter!(message_metrics::BUDGET_EXCEEDED_TOTAL).increment(1);
                if let Some(pending) = record.pending_retry.as_mut() {
                    pending.attempts += 1;
                }
                record.touch();
                self.store.save(&record).await?;
                Ok(None)
            },
        }
    }

    async fn archive_finished(&self, finished: &[WorkflowInstance]) -> Result<()> {
        for instance in finished {
            self.store.archive(instance).await?;
        }
        Ok(())
    }

    async fn dispatch(&self, actions: &[OutboundAction]) {
        if let Some(outbound) = &self.outbound {
            deliver(outbound.as_ref(), actions).await;
        }
    }

    /// Held messages first, then `current`.
    async fn process_batch(
        &self,
        rt: &Runtime,
        record: &mut ConversationRecord,
        current: Option<&InboundMessage>,
    ) -> Result<Batch> {
        let mut batch = Batch::default();

        if let Some(pending) = record.pending_retry.take() {
            if pending.attempts >= MAX_RETRY_ATTEMPTS {
                abandon_retry(rt, &record.key, &pending.messages, &mut batch.actions);
            } else {
                info!(
                    conversation = %record.key,
                    messages = pending.messages.len(),
                    attempts = pending.attempts,
                    "retrying held messages"
                );
                for message in &pending.messages {
                    let disposition = self.process_one(rt, record, message, &mut batch).await?;
                    batch.last = Some(disposition);
                }
            }
        }
        if let Some(message) = current {
            let disposition = self.process_one(rt, record, message, &mut batch).await?;
            batch.last = Some(disposition);
        }
        Ok(batch)
    }

    async fn process_one(
        &self,
        rt: &Runtime,
        record: &mut ConversationRecord,
        message: &InboundMessage,
        batch: &mut Batch,
    ) -> Result<Disposition> {
        let text = message.trimmed_text()?;
        let language = language_of(message, record);
        record.language = Some(language);
        let now = Utc::now();
        let ctx = engine_context(rt, &record.key, language);

        if record.active.as_ref().is_some_and(|i| !i.is_active())
            && let Some(stale) = record.take_active()
        {
            batch.finished.push(stale);
        }

        let disposition = if record.active.is_some() {
            self.continue_workflow(rt, record, message, text, &ctx, batch)
                .await?
        } else {
            let context = ClassifyContext::new()
                .with_language(Some(language))
                .with_history(record.history.iter().cloned().collect())
                .with_today(rt.today(now));
            let result = rt.classifier().classify(text, &context).await;
            let decision = rt.router().route(&result, &ConversationState {
                active_workflow: record.active_workflow_id(),
            });
            self.act(rt, record, decision, text, &ctx, batch).await?
        };

        record.push_history(text, rt.config().orchestrator.history_len);
        Ok(disposition)
    }

    /// A workflow is waiting for this message. Emergencies escalate and
    /// leave it suspended; a cancel word ends it; anything else resumes it.
    async fn continue_workflow(
        &self,
        rt: &Runtime,
        record: &mut ConversationRecord,
        message: &InboundMessage,
        text: &str,
        ctx: &EngineContext,
        batch: &mut Batch,
    ) -> Result<Disposition> {
        if let Some(result) = rt.classifier().check_emergency(text) {
            let decision = rt.router().route(&result, &ConversationState {
                active_workflow: record.active_workflow_id(),
            });
            warn!(
                conversation = %record.key,
                intent = %decision.intent,
                workflow = record.active_workflow_id().unwrap_or_default(),
                "emergency while a workflow waits"
            );
            return self.act(rt, record, decision, text, ctx, batch).await;
        }

        let mut instance = record.take_active().ok_or(WorkflowError::NotWaiting)?;

        if rt.is_cancel_word(text) {
            instance.finish(InstanceStatus::Cancelled, None);
            info!(
                conversation = %record.key,
                workflow = %instance.workflow_id,
                "workflow cancelled by guest"
            );
            reply_or_escalate(
                rt,
                &rt.config().orchestrator.cancelled_template,
                builtin::WORKFLOW_CANCELLED,
                &Variables::new(),
                ctx,
                &mut batch.actions,
            );
            let workflow = instance.workflow_id.clone();
            batch.finished.push(instance);
            return Ok(Disposition::Cancelled { workflow });
        }

        let Some(graph) = rt.registry().get(&instance.workflow_id) else {
            let error = WorkflowError::UnknownWorkflow(instance.workflow_id.clone());
            instance.finish(InstanceStatus::Errored, Some(error.to_string()));
            let report = errored_report(&error);
            return self.settle_workflow(rt, record, instance, report, ctx, batch).await;
        };

        let report = match rt
            .engine()
            .resume(&graph, &mut instance, message.message_id.as_deref(), text, ctx)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                warn!(
                    conversation = %record.key,
                    workflow = %instance.workflow_id,
                    error = %e,
                    "workflow could not resume"
                );
                instance.finish(InstanceStatus::Errored, Some(e.to_string()));
                errored_report(&e)
            },
        };
        self.settle_workflow(rt, record, instance, report, ctx, batch)
            .await
    }

    async fn act(
        &self,
        rt: &Runtime,
        record: &mut ConversationRecord,
        decision: RoutingDecision,
        text: &str,
        ctx: &EngineContext,
        batch: &mut Batch,
    ) -> Result<Disposition> {
        let actions = &mut batch.actions;
        let params: Variables = decision
            .parameters
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();

        match &decision.action {
            RouteAction::StaticReply { template } => {
                if !push_reply(rt, template, &params, ctx, actions) {
                    let fallback = &rt.config().routing.generated_reply_fallback;
                    reply_or_escalate(rt, fallback, builtin::FALLBACK, &params, ctx, actions);
                }
            },
            RouteAction::GeneratedReply {
                instructions,
                fallback_template,
            } => match self
                .generate(rt, record, &decision, instructions.as_deref(), text, ctx)
                .await
            {
                Some(reply) => actions.push(OutboundAction::send(&record.key, reply)),
                None => {
                    reply_or_escalate(
                        rt,
                        fallback_template,
                        builtin::FALLBACK,
                        &params,
                        ctx,
                        actions,
                    );
                },
            },
            RouteAction::StartWorkflow { workflow, .. } => {
                return self.start_workflow(rt, record, workflow, ctx, batch).await;
            },
            RouteAction::Escalate {
                recipient,
                reply_template,
                reason,
            } => {
                warn!(
                    conversation = %record.key,
                    intent = %decision.intent,
                    reason = reason.as_str(),
                    recipient = %recipient,
                    "escalating to staff"
                );
                actions.push(OutboundAction::notify(
                    recipient,
                    escalation_text(&record.key, &decision, *reason, text),
                ));
                record_escalation(reason.as_str());
                if let Some(template) = reply_template {
                    reply_or_escalate(
                        rt,
                        template,
                        builtin::PLEASE_HOLD,
                        &params,
                        ctx,
                        actions,
                    );
                }
            },
        }
        Ok(Disposition::Routed(decision))
    }

    async fn start_workflow(
        &self,
        rt: &Runtime,
        record: &mut ConversationRecord,
        workflow: &str,
        ctx: &EngineContext,
        batch: &mut Batch,
    ) -> Result<Disposition> {
        if let Some(mut previous) = record.take_active() {
            info!(
                conversation = %record.key,
                from = %previous.workflow_id,
                to = workflow,
                "superseding active workflow"
            );
            previous.finish(InstanceStatus::Superseded, None);
            batch.finished.push(previous);
        }

        let Some(graph) = rt.registry().get(workflow) else {
            let error = WorkflowError::UnknownWorkflow(workflow.to_string());
            warn!(conversation = %record.key, workflow, "routed to an unconfigured workflow");
            notify_workflow_failure(
                rt,
                &record.key,
                workflow,
                &error,
                &Variables::new(),
                ctx,
                &mut batch.actions,
            );
            return Ok(Disposition::Workflow {
                workflow: workflow.to_string(),
                outcome: errored_report(&error).outcome,
            });
        };

        let (instance, report) = rt.engine().start(&graph, ctx).await;
        self.settle_workflow(rt, record, instance, report, ctx, batch)
            .await
    }

    /// Keep a waiting instance on the record, archive a finished one and
    /// hand an errored one to staff.
    async fn settle_workflow(
        &self,
        rt: &Runtime,
        record: &mut ConversationRecord,
        instance: WorkflowInstance,
        report: StepReport,
        ctx: &EngineContext,
        batch: &mut Batch,
    ) -> Result<Disposition> {
        batch.actions.extend(report.outbound);
        let workflow = instance.workflow_id.clone();
        match &report.outcome {
            StepOutcome::Waiting { .. } | StepOutcome::Duplicate => {
                record.active = Some(instance);
            },
            StepOutcome::Completed => batch.finished.push(instance),
            StepOutcome::Errored { kind, reason } => {
                let error = format!("{kind}: {reason}");
                notify_workflow_failure(
                    rt,
                    &record.key,
                    &workflow,
                    &error,
                    &instance.variables,
                    ctx,
                    &mut batch.actions,
                );
                batch.finished.push(instance);
            },
        }
        Ok(Disposition::Workflow {
            workflow,
            outcome: report.outcome,
        })
    }

    /// Free-form reply through the provider chain. `None` when there is no
    /// generator or every provider failed.
    async fn generate(
        &self,
        rt: &Runtime,
        record: &ConversationRecord,
        decision: &RoutingDecision,
        instructions: Option<&str>,
        text: &str,
        ctx: &EngineContext,
    ) -> Option<String> {
        let Some(generator) = rt.generator() else {
            debug!(intent = %decision.intent, "no generator configured, using fallback template");
            return None;
        };

        let mut system = format!(
            "You are the front desk assistant of {}. Reply to the guest in {} in at most three \
             short sentences. Never invent prices, availability or house rules.",
            rt.config().system.hostel_name,
            language_name(ctx.language),
        );
        if let Some(instructions) = instructions {
            system.push('\n');
            system.push_str(instructions);
        }
        system.push_str(&format!(
            "\nThe guest's message was classified as `{}`.",
            decision.intent
        ));

        let history = record
            .history
            .iter()
            .map(|h| ChatMessage::user(h.clone()))
            .collect();
        let request = GenerateRequest::new(text)
            .with_system(system)
            .with_history(history);

        match generator.generate(&request).await {
            Ok(generation) if !generation.text.trim().is_empty() => {
                debug!(
                    provider = %generation.provider_id,
                    latency_ms = generation.latency_ms,
                    "generated reply"
                );
                Some(generation.text.trim().to_string())
            },
            Ok(generation) => {
                warn!(provider = %generation.provider_id, "empty generation, using fallback template");
                None
            },
            Err(e) => {
                warn!(conversation = %record.key, error = %e, "generation failed, using fallback template");
                None
            },
        }
    }
}

fn budget(rt: &Runtime) -> Duration {
    Duration::from_secs(rt.config().orchestrator.budget_secs.max(1))
}

/// Declared language, else detected, else whatever the conversation used
/// last.
fn language_of(message: &InboundMessage, record: &ConversationRecord) -> Language {
    message
        .language
        .or_else(|| Language::detect(&message.text))
        .or(record.language)
        .unwrap_or_default()
}

fn engine_context(rt: &Runtime, key: &ConversationKey, language: Language) -> EngineContext {
    EngineContext::new(key.clone(), language, rt.system_variables(Utc::now()))
}

/// Render template `id` and queue it for the guest. False when it could
/// not be rendered.
fn push_reply(
    rt: &Runtime,
    id: &str,
    variables: &Variables,
    ctx: &EngineContext,
    actions: &mut Vec<OutboundAction>,
) -> bool {
    match rt.render_template(id, variables, ctx) {
        Some(text) => {
            actions.push(OutboundAction::send(&ctx.conversation_key, text));
            true
        },
        None => false,
    }
}

/// Render template `id`, else send the built-in text of `fallback`. When
/// neither yields a reply the default staff recipient is asked to answer.
fn reply_or_escalate(
    rt: &Runtime,
    id: &str,
    fallback: &str,
    variables: &Variables,
    ctx: &EngineContext,
    actions: &mut Vec<OutboundAction>,
) {
    if push_reply(rt, id, variables, ctx, actions) {
        return;
    }
    if let Some(text) = builtin::builtin_text(fallback, ctx.language) {
        debug!(template = id, fallback, "using built-in reply");
        actions.push(OutboundAction::send(&ctx.conversation_key, text));
        return;
    }
    warn!(conversation = %ctx.conversation_key, template = id, "no reply text, asking staff");
    actions.push(OutboundAction::notify(
        rt.default_recipient(),
        format!(
            "[no_reply] {}: template '{id}' could not be rendered; please reply to the guest",
            ctx.conversation_key
        ),
    ));
    record_escalation("no_reply");
}

fn errored_report(error: &WorkflowError) -> StepReport {
    StepReport {
        outbound: Vec::new(),
        outcome: StepOutcome::Errored {
            kind: error.kind(),
            reason: error.to_string(),
        },
        transitions: 0,
    }
}

fn escalation_text(
    key: &ConversationKey,
    decision: &RoutingDecision,
    reason: EscalationReason,
    text: &str,
) -> String {
    let mut out = format!("[{}] {key} ({}): \"{text}\"", reason.as_str(), decision.intent);
    let entities: Vec<String> = decision
        .parameters
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), "intent" | "confidence"))
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    if !entities.is_empty() {
        out.push_str(&format!(" [{}]", entities.join(", ")));
    }
    out
}

/// Staff get the failure and whatever the workflow collected; the guest gets
/// the workflow-failed reply.
fn notify_workflow_failure(
    rt: &Runtime,
    key: &ConversationKey,
    workflow: &str,
    error: &dyn std::fmt::Display,
    collected: &Variables,
    ctx: &EngineContext,
    actions: &mut Vec<OutboundAction>,
) {
    let mut text = format!("[workflow_error] {key}: {workflow} stopped ({error})");
    if !collected.is_empty() {
        let fields: Vec<String> = collected
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => format!("{k}={s}"),
                other => format!("{k}={other}"),
            })
            .collect();
        text.push_str(&format!("; collected {}", fields.join(", ")));
    }
    actions.push(OutboundAction::notify(rt.default_recipient(), text));
    record_escalation("workflow_error");
    reply_or_escalate(
        rt,
        &rt.config().orchestrator.workflow_failed_template,
        builtin::WORKFLOW_FAILED,
        &Variables::new(),
        ctx,
        actions,
    );
}

fn abandon_retry(
    rt: &Runtime,
    key: &ConversationKey,
    messages: &[InboundMessage],
    actions: &mut Vec<OutboundAction>,
) {
    warn!(conversation = %key, messages = messages.len(), "giving up on held messages");
    let texts: Vec<String> = messages.iter().map(|m| format!("\"{}\"", m.text.trim())).collect();
    actions.push(OutboundAction::notify(
        rt.default_recipient(),
        format!(
            "[retry_abandoned] {key}: could not handle in time: {}",
            texts.join(" / ")
        ),
    ));
    record_escalation("retry_abandoned");
}

fn record_escalation(reason: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(message_metrics::ESCALATIONS_TOTAL, labels::REASON => reason).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = reason;
}
