//! Workflow definitions: a directed graph of typed nodes, or the older flat
//! list of steps for flows that never branch.
//!
//! Both formats normalize into a [`WorkflowGraph`], which is what the engine
//! walks. Structural problems (dangling edges, missing start node) are
//! reported by [`WorkflowDefinition::to_graph`] so they surface at load time
//! instead of mid-conversation.

use std::collections::BTreeMap;

use {
    pelangi_common::Language,
    serde::{Deserialize, Serialize},
};

/// A named, versioned workflow as authored in config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Graph format: entry node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_node_id: Option<String>,
    /// Graph format: node id → node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<BTreeMap<String, Node>>,
    /// Flat format: steps executed in order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<Step>>,
}

fn default_version() -> u32 {
    1
}

/// Text with optional per-language variants.
///
/// Written either as a plain string or as a table keyed by language code
/// (`en`, `ms`, `zh`). Lookups fall back to `en`, then to any variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalizedText {
    Plain(String),
    Localized(BTreeMap<String, String>),
}

impl LocalizedText {
    #[must_use]
    pub fn for_language(&self, language: Language) -> &str {
        match self {
            Self::Plain(text) => text,
            Self::Localized(variants) => variants
                .get(language.code())
                .or_else(|| variants.get(Language::En.code()))
                .or_else(|| variants.values().next())
                .map_or("", String::as_str),
        }
    }

    /// Every variant, for validation passes that inspect placeholders.
    pub fn variants(&self) -> impl Iterator<Item = &str> {
        let items: Vec<&str> = match self {
            Self::Plain(text) => vec![text.as_str()],
            Self::Localized(variants) => variants.values().map(String::as_str).collect(),
        };
        items.into_iter()
    }
}

impl From<&str> for LocalizedText {
    fn from(value: &str) -> Self {
        Self::Plain(value.to_string())
    }
}

/// Comparison applied by a `condition` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    #[serde(alias = "==", alias = "eq")]
    Equals,
    #[serde(alias = "!=", alias = "ne")]
    NotEquals,
    #[serde(alias = ">", alias = "gt")]
    GreaterThan,
    #[serde(alias = ">=", alias = "gte")]
    GreaterOrEqual,
    #[serde(alias = "<", alias = "lt")]
    LessThan,
    #[serde(alias = "<=", alias = "lte")]
    LessOrEqual,
    Contains,
    Exists,
    NotExists,
}

impl ConditionOperator {
    /// Existence checks never need the variable to be bound.
    #[must_use]
    pub fn tolerates_missing(self) -> bool {
        matches!(self, Self::Exists | Self::NotExists)
    }
}

/// One node of a workflow graph. A missing edge (`next`, `on_success`, …)
/// ends the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Send a rendered template to the guest.
    Message {
        template: LocalizedText,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        next: Option<String>,
    },
    /// Optionally prompt, then suspend until the guest replies; the reply is
    /// bound to `variable`.
    WaitForReply {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt: Option<LocalizedText>,
        variable: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        next: Option<String>,
    },
    /// Call a named action on the booking system. Without `on_error` a
    /// failure hands the conversation to staff.
    ExternalCall {
        action: String,
        /// Parameter templates rendered against the workflow variables.
        #[serde(default)]
        params: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        on_success: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        on_error: Option<String>,
    },
    /// Branch on a workflow variable.
    Condition {
        field: String,
        operator: ConditionOperator,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        if_true: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        if_false: Option<String>,
    },
    /// Message a staff recipient instead of the guest.
    OutboundNotify {
        recipient: String,
        template: LocalizedText,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        next: Option<String>,
    },
}

impl Node {
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::WaitForReply { .. } => "wait_for_reply",
            Self::ExternalCall { .. } => "external_call",
            Self::Condition { .. } => "condition",
            Self::OutboundNotify { .. } => "outbound_notify",
        }
    }

    /// Outgoing edges that point at a node (ends are omitted).
    #[must_use]
    pub fn edges(&self) -> Vec<&str> {
        let edges: [Option<&String>; 2] = match self {
            Self::Message { next, .. }
            | Self::WaitForReply { next, .. }
            | Self::OutboundNotify { next, .. } => [next.as_ref(), None],
            Self::ExternalCall {
                on_success,
                on_error,
                ..
            } => [on_success.as_ref(), on_error.as_ref()],
            Self::Condition {
                if_true, if_false, ..
            } => [if_true.as_ref(), if_false.as_ref()],
        };
        edges.into_iter().flatten().map(String::as_str).collect()
    }

    #[must_use]
    pub fn is_wait(&self) -> bool {
        matches!(self, Self::WaitForReply { .. })
    }
}

/// One step of the flat format. Steps run in order; there is no branching
/// and a failed action simply continues with the next step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    Message {
        template: LocalizedText,
    },
    WaitForReply {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt: Option<LocalizedText>,
        variable: String,
    },
    ExternalCall {
        action: String,
        #[serde(default)]
        params: BTreeMap<String, String>,
    },
    OutboundNotify {
        recipient: String,
        template: LocalizedText,
    },
}

/// Which authoring format a definition used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowFormat {
    Graph,
    Steps,
}

/// Structural defects found while normalizing a definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("workflow '{workflow}' defines both `nodes` and `steps`")]
    BothFormats { workflow: String },

    #[error("workflow '{workflow}' defines neither `nodes` nor `steps`")]
    NoFormat { workflow: String },

    #[error("workflow '{workflow}' has no nodes")]
    Empty { workflow: String },

    #[error("workflow '{workflow}' is missing `start_node_id`")]
    MissingStart { workflow: String },

    #[error("workflow '{workflow}' starts at unknown node '{start}'")]
    StartNotFound { workflow: String, start: String },

    #[error("workflow '{workflow}': node '{node}' points to unknown node '{target}'")]
    DanglingEdge {
        workflow: String,
        node: String,
        target: String,
    },
}

/// Normalized, structurally checked workflow graph.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowGraph {
    pub id: String,
    pub version: u32,
    pub format: WorkflowFormat,
    pub start_node_id: String,
    pub nodes: BTreeMap<String, Node>,
}

impl WorkflowGraph {
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }
}

impl WorkflowDefinition {
    #[must_use]
    pub fn format(&self) -> Option<WorkflowFormat> {
        match (&self.nodes, &self.steps) {
            (Some(_), None) => Some(WorkflowFormat::Graph),
            (None, Some(_)) => Some(WorkflowFormat::Steps),
            _ => None,
        }
    }

    /// Normalize into a graph, checking that every edge resolves.
    pub fn to_graph(&self) -> Result<WorkflowGraph, DefinitionError> {
        let workflow = self.id.clone();
        let (format, start_node_id, nodes) = match (&self.nodes, &self.steps) {
            (Some(_), Some(_)) => return Err(DefinitionError::BothFormats { workflow }),
            (None, None) => return Err(DefinitionError::NoFormat { workflow }),
            (Some(nodes), None) => {
                if nodes.is_empty() {
                    return Err(DefinitionError::Empty { workflow });
                }
                let start = self
                    .start_node_id
                    .clone()
                    .ok_or_else(|| DefinitionError::MissingStart {
                        workflow: workflow.clone(),
                    })?;
                (WorkflowFormat::Graph, start, nodes.clone())
            },
            (None, Some(steps)) => {
                if steps.is_empty() {
                    return Err(DefinitionError::Empty { workflow });
                }
                (WorkflowFormat::Steps, step_id(0), steps_to_nodes(steps))
            },
        };

        if !nodes.contains_key(&start_node_id) {
            return Err(DefinitionError::StartNotFound {
                workflow,
                start: start_node_id,
            });
        }
        for (id, node) in &nodes {
            if let Some(target) = node.edges().into_iter().find(|t| !nodes.contains_key(*t)) {
                return Err(DefinitionError::DanglingEdge {
                    workflow,
                    node: id.clone(),
                    target: target.to_string(),
                });
            }
        }

        Ok(WorkflowGraph {
            id: self.id.clone(),
            version: self.version,
            format,
            start_node_id,
            nodes,
        })
    }
}

fn step_id(index: usize) -> String {
    format!("step_{:03}", index + 1)
}

fn steps_to_nodes(steps: &[Step]) -> BTreeMap<String, Node> {
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let next = (i + 1 < steps.len()).then(|| step_id(i + 1));
            let node = match step.clone() {
                Step::Message { template } => Node::Message { template, next },
                Step::WaitForReply { prompt, variable } => Node::WaitForReply {
                    prompt,
                    variable,
                    next,
                },
                Step::ExternalCall { action, params } => Node::ExternalCall {
                    action,
                    params,
                    on_success: next.clone(),
                    on_error: next,
                },
                Step::OutboundNotify {
                    recipient,
                    template,
                } => Node::OutboundNotify {
                    recipient,
                    template,
                    next,
                },
            };
            (step_id(i), node)
        })
        .collect()
}
