use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// The four things routing can decide to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    StaticReply,
    GeneratedReply,
    StartWorkflow,
    Escalate,
}

impl ActionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StaticReply => "static_reply",
            Self::GeneratedReply => "generated_reply",
            Self::StartWorkflow => "start_workflow",
            Self::Escalate => "escalate",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a decision escalates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    /// Emergency-pattern intent.
    Emergency,
    /// Listed in `routing.always_escalate`.
    Policy,
    /// The table (or default route) says so.
    Configured,
}

impl EscalationReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Emergency => "emergency",
            Self::Policy => "policy",
            Self::Configured => "configured",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteAction {
    StaticReply {
        template: String,
    },
    GeneratedReply {
        instructions: Option<String>,
        /// Template sent when every provider fails.
        fallback_template: String,
    },
    StartWorkflow {
        workflow: String,
        /// Workflow that was active and will be superseded.
        supersedes: Option<String>,
    },
    Escalate {
        recipient: String,
        reply_template: Option<String>,
        reason: EscalationReason,
    },
}

/// Exactly one action for one classified message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub intent: String,
    pub action: RouteAction,
    /// Extracted entities plus `intent` and `confidence`.
    pub parameters: BTreeMap<String, String>,
}

impl RoutingDecision {
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match &self.action {
            RouteAction::StaticReply { .. } => ActionKind::StaticReply,
            RouteAction::GeneratedReply { .. } => ActionKind::GeneratedReply,
            RouteAction::StartWorkflow { .. } => ActionKind::StartWorkflow,
            RouteAction::Escalate { .. } => ActionKind::Escalate,
        }
    }

    /// Template id, workflow id or escalation recipient.
    #[must_use]
    pub fn target(&self) -> &str {
        match &self.action {
            RouteAction::StaticReply { template } => template,
            RouteAction::GeneratedReply {
                fallback_template, ..
            } => fallback_template,
            RouteAction::StartWorkflow { workflow, .. } => workflow,
            RouteAction::Escalate { recipient, .. } => recipient,
        }
    }
}
