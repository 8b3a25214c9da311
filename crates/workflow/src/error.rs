use pelangi_config::DefinitionError;

/// A template referenced placeholders that have no value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unresolved placeholders: {}", missing.join(", "))]
    Unresolved { missing: Vec<String> },
}

/// Failure of one `external_call` action. Routed through the node's error
/// edge when the node has one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("action '{action}' timed out after {after_ms}ms")]
    Timeout { action: String, after_ms: u64 },

    #[error("no external action backend configured for '{0}'")]
    NotConfigured(String),

    #[error("action '{action}' failed: {message}")]
    Failed { action: String, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed action response: {0}")]
    Malformed(String),
}

impl ActionError {
    #[must_use]
    pub fn failed(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            action: action.into(),
            message: message.into(),
        }
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::NotConfigured(_) => "not_configured",
            Self::Failed { .. } => "failed",
            Self::Transport(_) => "transport",
            Self::Malformed(_) => "malformed",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("unknown workflow '{0}'")]
    UnknownWorkflow(String),

    #[error(transparent)]
    InvalidDefinition(#[from] DefinitionError),

    #[error("workflow '{workflow}' has no node '{node}'")]
    NodeMissing { workflow: String, node: String },

    #[error("workflow instance is not waiting for a reply")]
    NotWaiting,

    #[error("node '{node}': {source}")]
    Template {
        node: String,
        #[source]
        source: TemplateError,
    },

    #[error("node '{node}': condition field '{field}' is not bound")]
    ConditionUnbound { node: String, field: String },

    #[error("step limit of {limit} reached")]
    StepLimit { limit: u32 },

    #[error("action '{action}' failed with no error edge: {source}")]
    UnhandledAction {
        action: String,
        #[source]
        source: ActionError,
    },
}

impl WorkflowError {
    /// Short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownWorkflow(_) => "unknown_workflow",
            Self::InvalidDefinition(_) => "invalid_definition",
            Self::NodeMissing { .. } => "node_missing",
            Self::NotWaiting => "not_waiting",
            Self::Template { .. } => "template",
            Self::ConditionUnbound { .. } => "condition_unbound",
            Self::StepLimit { .. } => "step_limit",
            Self::UnhandledAction { .. } => "unhandled_action",
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
