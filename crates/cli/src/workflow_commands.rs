use std::fmt::Write as _;

use {
    clap::Subcommand,
    pelangi_config::{PelangiConfig, WorkflowFormat, WorkflowGraph},
    pelangi_workflow::WorkflowRegistry,
};

#[derive(Subcommand)]
pub enum WorkflowAction {
    /// List configured workflows.
    List,
    /// Show the nodes and edges of one workflow.
    Show { id: String },
}

pub fn handle_workflows(action: WorkflowAction, config: &PelangiConfig) -> anyhow::Result<()> {
    let registry = WorkflowRegistry::from_config(config)?;
    match action {
        WorkflowAction::List => {
            if registry.is_empty() {
                println!("No workflows configured.");
            }
            for graph in registry.graphs() {
                println!("{}", summary(graph));
            }
        },
        WorkflowAction::Show { id } => {
            let graph = registry.require(&id)?;
            print!("{}", describe(&graph));
        },
    }
    Ok(())
}

fn format_name(format: WorkflowFormat) -> &'static str {
    match format {
        WorkflowFormat::Graph => "graph",
        WorkflowFormat::Steps => "steps",
    }
}

fn summary(graph: &WorkflowGraph) -> String {
    format!(
        "{:<20} v{:<3} {:<6} start={:<16} {} nodes",
        graph.id,
        graph.version,
        format_name(graph.format),
        graph.start_node_id,
        graph.nodes.len()
    )
}

fn describe(graph: &WorkflowGraph) -> String {
    let mut out = format!("{}\n", summary(graph));
    for (id, node) in &graph.nodes {
        let marker = if *id == graph.start_node_id { "*" } else { " " };
        let edges = node.edges();
        let edges = if edges.is_empty() {
            "(end)".to_string()
        } else {
            edges.join(", ")
        };
        let _ = writeln!(out, " {marker} {id:<20} {:<16} → {edges}", node.kind_name());
    }
    out
}
