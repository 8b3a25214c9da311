use std::{collections::BTreeMap, sync::Arc};

use {
    pelangi_config::{PelangiConfig, WorkflowDefinition, WorkflowGraph},
    tracing::warn,
};

use crate::error::{Result, WorkflowError};

/// Normalized graphs keyed by workflow id. Rebuilt on every config reload;
/// instances look their graph up by id at each traversal.
#[derive(Debug, Clone, Default)]
pub struct WorkflowRegistry {
    graphs: BTreeMap<String, Arc<WorkflowGraph>>,
}

impl WorkflowRegistry {
    pub fn from_definitions<'a>(
        definitions: impl IntoIterator<Item = &'a WorkflowDefinition>,
    ) -> Result<Self> {
        let mut graphs = BTreeMap::new();
        for def in definitions {
            let graph = def.to_graph()?;
            if graphs.contains_key(&graph.id) {
                warn!(workflow = %graph.id, "duplicate workflow id, keeping the first");
                continue;
            }
            graphs.insert(graph.id.clone(), Arc::new(graph));
        }
        Ok(Self { graphs })
    }

    pub fn from_config(config: &PelangiConfig) -> Result<Self> {
        Self::from_definitions(&config.workflows)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<WorkflowGraph>> {
        self.graphs.get(id).cloned()
    }

    pub fn require(&self, id: &str) -> Result<Arc<WorkflowGraph>> {
        self.get(id)
            .ok_or_else(|| WorkflowError::UnknownWorkflow(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.graphs.keys().map(String::as_str)
    }

    pub fn graphs(&self) -> impl Iterator<Item = &WorkflowGraph> {
        self.graphs.values().map(AsRef::as_ref)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use pelangi_config::{WorkflowFormat, default_config};

    use super::*;

    #[test]
    fn default_config_workflows_load() {
        let config = default_config().unwrap().config;
        let registry = WorkflowRegistry::from_config(&config).unwrap();
        assert_eq!(registry.ids().collect::<Vec<_>>(), ["check_in", "late_checkout"]);
        assert_eq!(registry.get("late_checkout").unwrap().format, WorkflowFormat::Steps);
        assert!(matches!(
            registry.require("nope"),
            Err(WorkflowError::UnknownWorkflow(_))
        ));
    }

    #[test]
    fn broken_definition_is_rejected() {
        let def: WorkflowDefinition = toml::from_str(
            r#"
id = "broken"
start_node_id = "a"

[nodes.a]
kind = "message"
template = "hi"
next = "missing"
"#,
        )
        .unwrap();
        assert!(matches!(
            WorkflowRegistry::from_definitions([&def]),
            Err(WorkflowError::InvalidDefinition(_))
        ));
    }
}
