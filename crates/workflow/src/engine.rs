//! Graph traversal over a [`WorkflowInstance`].
//!
//! `start` creates an instance and runs until the first `wait_for_reply`
//! node or the end. `resume` binds a reply to the waiting node's variable
//! and continues. Every edge followed increments `step_count`; a single
//! call that would enter more than `max_steps` nodes halts with the instance
//! errored, so a cycle without a wait node cannot spin forever.
//!
//! Errors inside a traversal never escape as `Err`: they mark the instance
//! errored and are reported as [`StepOutcome::Errored`] for the caller to
//! escalate.

use std::{cmp::Ordering, collections::BTreeMap, sync::Arc, time::Duration};

use {
    chrono::Utc,
    pelangi_common::{ConversationKey, Language, OutboundAction},
    pelangi_config::{ConditionOperator, LocalizedText, Node, StaffConfig, WorkflowFormat, WorkflowGraph},
    serde_json::Value,
    tracing::{debug, error, info, warn},
};

#[cfg(feature = "metrics")]
use pelangi_metrics::{counter, labels, workflow as workflow_metrics};

use crate::{
    actions::ExternalActions,
    error::{ActionError, Result, WorkflowError},
    instance::{InstanceStatus, WorkflowInstance},
    template::{self, TemplateContext, Variables, resolve_path},
};

pub const DEFAULT_MAX_STEPS: u32 = 50;

/// Variable set to the failure message when an action takes its error edge.
pub const LAST_ERROR_VARIABLE: &str = "last_error";

/// Per-call context that is not part of the instance.
#[derive(Debug, Clone)]
pub struct EngineContext {
    pub conversation_key: ConversationKey,
    pub language: Language,
    /// `{{guest.*}}` values; always carries `key`.
    pub guest: Variables,
    /// `{{system.*}}` values.
    pub system: Variables,
}

impl EngineContext {
    pub fn new(conversation_key: ConversationKey, language: Language, system: Variables) -> Self {
        let mut guest = Variables::new();
        guest.insert("key".into(), Value::String(conversation_key.to_string()));
        Self {
            conversation_key,
            language,
            guest,
            system,
        }
    }

    #[must_use]
    pub fn with_guest_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.guest.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Suspended at a `wait_for_reply` node.
    Waiting { node: String },
    Completed,
    /// Instance marked errored; the conversation needs staff.
    Errored { kind: &'static str, reason: String },
    /// The reply was already applied; nothing happened.
    Duplicate,
}

/// What one start/resume call produced, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub outbound: Vec<OutboundAction>,
    pub outcome: StepOutcome,
    /// Edges followed during this call.
    pub transitions: u32,
}

impl StepReport {
    fn new() -> Self {
        Self {
            outbound: Vec::new(),
            outcome: StepOutcome::Completed,
            transitions: 0,
        }
    }

    #[must_use]
    pub fn is_waiting(&self) -> bool {
        matches!(self.outcome, StepOutcome::Waiting { .. })
    }
}

pub struct WorkflowEngine {
    actions: Arc<dyn ExternalActions>,
    staff: StaffConfig,
    max_steps: u32,
    action_timeout: Duration,
}

impl WorkflowEngine {
    pub fn new(actions: Arc<dyn ExternalActions>, staff: StaffConfig) -> Self {
        Self {
            actions,
            staff,
            max_steps: DEFAULT_MAX_STEPS,
            action_timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    #[must_use]
    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    /// Create an instance at the start node and run it.
    pub async fn start(
        &self,
        graph: &WorkflowGraph,
        ctx: &EngineContext,
    ) -> (WorkflowInstance, StepReport) {
        let mut instance = WorkflowInstance::new(
            ctx.conversation_key.clone(),
            &graph.id,
            graph.version,
            &graph.start_node_id,
        );
        info!(
            conversation = %ctx.conversation_key,
            workflow = %graph.id,
            version = graph.version,
            "workflow started"
        );
        #[cfg(feature = "metrics")]
        counter!(workflow_metrics::STARTED_TOTAL, labels::WORKFLOW => graph.id.clone()).increment(1);

        let mut report = StepReport::new();
        let start = Some(graph.start_node_id.clone());
        let result = self.traverse(graph, &mut instance, start, ctx, &mut report).await;
        self.settle(&mut instance, &mut report, result);
        (instance, report)
    }

    /// Apply a reply to an instance waiting at a `wait_for_reply` node.
    ///
    /// A `message_id` equal to the last one applied is a no-op.
    pub async fn resume(
        &self,
        graph: &WorkflowGraph,
        instance: &mut WorkflowInstance,
        message_id: Option<&str>,
        text: &str,
        ctx: &EngineContext,
    ) -> Result<StepReport> {
        if let Some(id) = message_id
            && instance.last_message_id.as_deref() == Some(id)
        {
            debug!(conversation = %instance.conversation_key, message_id = id, "duplicate reply ignored");
            return Ok(StepReport {
                outbound: Vec::new(),
                outcome: StepOutcome::Duplicate,
                transitions: 0,
            });
        }
        if !instance.is_active() {
            return Err(WorkflowError::NotWaiting);
        }
        let node_id = instance
            .current_node_id
            .clone()
            .ok_or(WorkflowError::NotWaiting)?;
        if graph.version != instance.workflow_version {
            info!(
                workflow = %graph.id,
                from = instance.workflow_version,
                to = graph.version,
                "resuming on a reloaded definition"
            );
            instance.workflow_version = graph.version;
        }

        let mut report = StepReport::new();
        let result = match graph.node(&node_id) {
            Some(Node::WaitForReply { variable, next, .. }) => {
                instance
                    .variables
                    .insert(variable.clone(), Value::String(text.trim().to_string()));
                instance.last_message_id = message_id.map(str::to_string);
                self.traverse(graph, instance, next.clone(), ctx, &mut report)
                    .await
            },
            Some(_) => return Err(WorkflowError::NotWaiting),
            None => Err(WorkflowError::NodeMissing {
                workflow: graph.id.clone(),
                node: node_id,
            }),
        };
        self.settle(instance, &mut report, result);
        Ok(report)
    }

    fn settle(&self, instance: &mut WorkflowInstance, report: &mut StepReport, result: Result<()>) {
        instance.updated_at = Utc::now();
        match result {
            Ok(()) if report.is_waiting() => {},
            Ok(()) => {
                instance.finish(InstanceStatus::Completed, None);
                report.outcome = StepOutcome::Completed;
                info!(
                    conversation = %instance.conversation_key,
                    workflow = %instance.workflow_id,
                    steps = instance.step_count,
                    "workflow completed"
                );
                #[cfg(feature = "metrics")]
                counter!(workflow_metrics::COMPLETED_TOTAL, labels::WORKFLOW => instance.workflow_id.clone())
                    .increment(1);
            },
            Err(e) => {
                let kind = e.kind();
                error!(
                    conversation = %instance.conversation_key,
                    workflow = %instance.workflow_id,
                    node = instance.current_node_id.as_deref().unwrap_or("-"),
                    steps = instance.step_count,
                    error = %e,
                    "workflow errored"
                );
                #[cfg(feature = "metrics")]
                counter!(
                    workflow_metrics::ERRORED_TOTAL,
                    labels::WORKFLOW => instance.workflow_id.clone(),
                    labels::ERROR_TYPE => kind
                )
                .increment(1);
                instance.finish(InstanceStatus::Errored, Some(e.to_string()));
                report.outcome = StepOutcome::Errored {
                    kind,
                    reason: e.to_string(),
                };
            },
        }
    }

    fn count(&self, instance: &mut WorkflowInstance, report: &mut StepReport) {
        instance.step_count += 1;
        report.transitions += 1;
    }

    async fn traverse(
        &self,
        graph: &WorkflowGraph,
        instance: &mut WorkflowInstance,
        mut next: Option<String>,
        ctx: &EngineContext,
        report: &mut StepReport,
    ) -> Result<()> {
        loop {
            let Some(node_id) = next.take() else {
                // Edge to the end.
                self.count(instance, report);
                return Ok(());
            };
            if report.transitions >= self.max_steps {
                return Err(WorkflowError::StepLimit {
                    limit: self.max_steps,
                });
            }
            self.count(instance, report);
            instance.current_node_id = Some(node_id.clone());

            let node = graph
                .node(&node_id)
                .ok_or_else(|| WorkflowError::NodeMissing {
                    workflow: graph.id.clone(),
                    node: node_id.clone(),
                })?;
            debug!(workflow = %graph.id, node = %node_id, kind = node.kind_name(), "visiting node");

            next = match node {
                Node::Message { template, next } => {
                    let text = self.render(&node_id, template, instance, ctx)?;
                    report
                        .outbound
                        .push(OutboundAction::send(&ctx.conversation_key, text));
                    next.clone()
                },
                Node::WaitForReply { prompt, .. } => {
                    if let Some(prompt) = prompt {
                        let text = self.render(&node_id, prompt, instance, ctx)?;
                        report
                            .outbound
                            .push(OutboundAction::send(&ctx.conversation_key, text));
                    }
                    report.outcome = StepOutcome::Waiting { node: node_id };
                    return Ok(());
                },
                Node::ExternalCall {
                    action,
                    params,
                    on_success,
                    on_error,
                } => {
                    let params = self.render_params(&node_id, params, instance, ctx)?;
                    match self.call_action(action, &params).await {
                        Ok(fields) => {
                            instance.variables.remove(LAST_ERROR_VARIABLE);
                            instance.variables.extend(fields);
                            on_success.clone()
                        },
                        Err(e) => {
                            warn!(
                                conversation = %ctx.conversation_key,
                                workflow = %graph.id,
                                node = %node_id,
                                action = %action,
                                error = %e,
                                has_error_edge = on_error.is_some(),
                                "external action failed"
                            );
                            instance
                                .variables
                                .insert(LAST_ERROR_VARIABLE.into(), Value::String(e.to_string()));
                            match on_error {
                                Some(edge) => Some(edge.clone()),
                                // Flat steps continue (or finish) past a failure.
                                None if graph.format == WorkflowFormat::Steps => None,
                                None => {
                                    return Err(WorkflowError::UnhandledAction {
                                        action: action.clone(),
                                        source: e,
                                    });
                                },
                            }
                        },
                    }
                },
                Node::Condition {
                    field,
                    operator,
                    value,
                    if_true,
                    if_false,
                } => {
                    let outcome =
                        evaluate(&node_id, field, *operator, value.as_ref(), &instance.variables)?;
                    debug!(node = %node_id, field = %field, outcome, "condition evaluated");
                    if outcome {
                        if_true.clone()
                    } else {
                        if_false.clone()
                    }
                },
                Node::OutboundNotify {
                    recipient,
                    template,
                    next,
                } => {
                    let text = self.render(&node_id, template, instance, ctx)?;
                    let recipient = self.staff.resolve(recipient).to_string();
                    report.outbound.push(OutboundAction::notify(recipient, text));
                    next.clone()
                },
            };
        }
    }

    fn render(
        &self,
        node_id: &str,
        template: &LocalizedText,
        instance: &WorkflowInstance,
        ctx: &EngineContext,
    ) -> Result<String> {
        template::render(template.for_language(ctx.language), &TemplateContext {
            variables: &instance.variables,
            guest: &ctx.guest,
            system: &ctx.system,
        })
        .map_err(|source| WorkflowError::Template {
            node: node_id.to_string(),
            source,
        })
    }

    fn render_params(
        &self,
        node_id: &str,
        params: &BTreeMap<String, String>,
        instance: &WorkflowInstance,
        ctx: &EngineContext,
    ) -> Result<BTreeMap<String, String>> {
        let tctx = TemplateContext {
            variables: &instance.variables,
            guest: &ctx.guest,
            system: &ctx.system,
        };
        params
            .iter()
            .map(|(name, value)| {
                template::render(value, &tctx)
                    .map(|rendered| (name.clone(), rendered))
                    .map_err(|source| WorkflowError::Template {
                        node: node_id.to_string(),
                        source,
                    })
            })
            .collect()
    }

    async fn call_action(
        &self,
        action: &str,
        params: &BTreeMap<String, String>,
    ) -> std::result::Result<Variables, ActionError> {
        let result = match tokio::time::timeout(self.action_timeout, self.actions.call(action, params))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ActionError::Timeout {
                action: action.to_string(),
                after_ms: self.action_timeout.as_millis() as u64,
            }),
        };

        #[cfg(feature = "metrics")]
        counter!(
            workflow_metrics::EXTERNAL_CALLS_TOTAL,
            labels::ACTION => action.to_string(),
            labels::SUCCESS => if result.is_ok() { "true" } else { "false" }
        )
        .increment(1);

        result
    }
}

// ── Conditions ──────────────────────────────────────────────────────────────

fn evaluate(
    node_id: &str,
    field: &str,
    operator: ConditionOperator,
    expected: Option<&Value>,
    variables: &Variables,
) -> Result<bool> {
    let actual = resolve_path(variables, field).filter(|v| !is_blank(v));
    let bound = || {
        actual.ok_or_else(|| WorkflowError::ConditionUnbound {
            node: node_id.to_string(),
            field: field.to_string(),
        })
    };
    let expected = expected.unwrap_or(&Value::Null);

    Ok(match operator {
        ConditionOperator::Exists => actual.is_some(),
        ConditionOperator::NotExists => actual.is_none(),
        ConditionOperator::Equals => values_equal(bound()?, expected),
        ConditionOperator::NotEquals => !values_equal(bound()?, expected),
        ConditionOperator::GreaterThan => compare(bound()?, expected) == Some(Ordering::Greater),
        ConditionOperator::GreaterOrEqual => matches!(
            compare(bound()?, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        ConditionOperator::LessThan => compare(bound()?, expected) == Some(Ordering::Less),
        ConditionOperator::LessOrEqual => matches!(
            compare(bound()?, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        ConditionOperator::Contains => contains(bound()?, expected),
    })
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_lowercase(),
        other => other.to_string(),
    }
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (as_number(actual), as_number(expected)) {
        (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
        _ => as_text(actual) == as_text(expected),
    }
}

fn compare(actual: &Value, expected: &Value) -> Option<Ordering> {
    match (as_number(actual), as_number(expected)) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => match (actual, expected) {
            // ISO dates and times order correctly as strings.
            (Value::String(a), Value::String(b)) => Some(a.trim().cmp(b.trim())),
            _ => None,
        },
    }
}

fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| values_equal(item, expected)),
        Value::Object(map) => expected.as_str().is_some_and(|key| map.contains_key(key)),
        other => as_text(other).contains(&as_text(expected)),
    }
}
