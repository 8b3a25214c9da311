//! Workflow execution: template rendering, graph traversal and the
//! external-action façade used by `external_call` nodes.

pub mod actions;
pub mod engine;
pub mod error;
pub mod instance;
pub mod mcp;
pub mod registry;
pub mod template;

use std::{sync::Arc, time::Duration};

use pelangi_config::PelangiConfig;

pub use {
    actions::{ExternalActions, NoActions},
    engine::{EngineContext, StepOutcome, StepReport, WorkflowEngine},
    error::{ActionError, Result, TemplateError, WorkflowError},
    instance::{InstanceStatus, WorkflowInstance},
    mcp::McpActionClient,
    registry::WorkflowRegistry,
    template::{TemplateContext, Variables},
};

/// The configured action backend: the MCP client when an endpoint is set,
/// otherwise [`NoActions`].
#[must_use]
pub fn build_actions(config: &PelangiConfig) -> Arc<dyn ExternalActions> {
    match McpActionClient::from_config(&config.actions) {
        Some(client) => Arc::new(client),
        None => Arc::new(NoActions),
    }
}

/// Engine wired with the step ceiling, staff directory and action timeout
/// from `config`.
#[must_use]
pub fn build_engine(config: &PelangiConfig, actions: Arc<dyn ExternalActions>) -> WorkflowEngine {
    WorkflowEngine::new(actions, config.staff.clone())
        .with_max_steps(config.orchestrator.max_workflow_steps)
        .with_action_timeout(Duration::from_secs(config.actions.timeout_secs.max(1)))
}
