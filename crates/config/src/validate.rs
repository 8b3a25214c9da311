//! Configuration validation engine.
//!
//! Runs at load and at every hot reload. Detects unknown/misspelled fields,
//! structural workflow defects, routing entries that point nowhere, and
//! classifier settings that cannot work. A config with any error-severity
//! diagnostic is rejected by the loader.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
    fmt,
    path::{Path, PathBuf},
};

use pelangi_common::text::suggest;

use crate::{
    loader,
    schema::{PelangiConfig, RouteEntry},
    workflow::{DefinitionError, Node, WorkflowDefinition, WorkflowGraph},
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "workflow",
    /// "routing", "classifier", "system", "providers", "orchestrator"
    pub category: &'static str,
    /// Dotted path, e.g. "workflows.check_in.nodes.ask_name"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "[{}] {}", self.severity, self.message)
        } else {
            write!(f, "[{}] {}: {}", self.severity, self.path, self.message)
        }
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

/// Expected shape of a config document.
enum KnownKeys {
    /// A struct with fixed field names.
    Struct(HashMap<&'static str, KnownKeys>),
    /// A map with dynamic keys whose values have a known shape.
    Map(Box<KnownKeys>),
    /// An array of typed items.
    Array(Box<KnownKeys>),
    /// Scalar or free-form value: stop recursion.
    Leaf,
}

fn leaves(names: &[&'static str]) -> KnownKeys {
    KnownKeys::Struct(names.iter().map(|n| (*n, KnownKeys::Leaf)).collect())
}

fn workflow_schema() -> KnownKeys {
    use KnownKeys::{Array, Leaf, Map, Struct};

    let node = || {
        leaves(&[
            "kind",
            "template",
            "next",
            "prompt",
            "variable",
            "action",
            "params",
            "on_success",
            "on_error",
            "field",
            "operator",
            "value",
            "if_true",
            "if_false",
            "recipient",
        ])
    };

    Struct(HashMap::from([
        ("id", Leaf),
        ("version", Leaf),
        ("name", Leaf),
        ("start_node_id", Leaf),
        ("nodes", Map(Box::new(node()))),
        ("steps", Array(Box::new(node()))),
    ]))
}

/// Build the full schema map mirroring every field in `schema.rs`.
fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Array, Leaf, Map, Struct};

    let route_entry = || {
        leaves(&[
            "action",
            "template",
            "instructions",
            "workflow",
            "recipient",
            "reply_template",
        ])
    };

    Struct(HashMap::from([
        ("system", leaves(&["hostel_name", "timezone", "constants"])),
        (
            "classifier",
            Struct(HashMap::from([
                (
                    "emergency",
                    Struct(HashMap::from([
                        ("enabled", Leaf),
                        ("patterns", Array(Box::new(leaves(&["intent", "pattern"])))),
                    ])),
                ),
                ("fuzzy", leaves(&["enabled", "threshold", "keywords"])),
                (
                    "semantic",
                    leaves(&["enabled", "threshold", "fuzzy_skip_cutoff", "examples"]),
                ),
                (
                    "generative",
                    leaves(&["enabled", "threshold", "aliases", "max_history"]),
                ),
            ])),
        ),
        (
            "providers",
            Struct(HashMap::from([
                (
                    "chain",
                    Array(Box::new(leaves(&[
                        "id",
                        "kind",
                        "enabled",
                        "base_url",
                        "api_key",
                        "model",
                        "timeout_secs",
                        "max_tokens",
                        "temperature",
                    ]))),
                ),
                (
                    "embeddings",
                    Struct(HashMap::from([
                        (
                            "chain",
                            Array(Box::new(leaves(&[
                                "id",
                                "enabled",
                                "base_url",
                                "api_key",
                                "model",
                                "timeout_secs",
                            ]))),
                        ),
                        ("local_fallback", Leaf),
                        ("dimensions", Leaf),
                    ])),
                ),
            ])),
        ),
        (
            "routing",
            Struct(HashMap::from([
                ("intents", Map(Box::new(route_entry()))),
                ("default", route_entry()),
                ("always_escalate", Leaf),
                ("generated_reply_fallback", Leaf),
            ])),
        ),
        ("templates", Leaf),
        ("staff", leaves(&["default_recipient", "recipients"])),
        (
            "actions",
            leaves(&["endpoint", "tool_prefix", "timeout_secs", "api_key"]),
        ),
        (
            "orchestrator",
            leaves(&[
                "budget_secs",
                "history_len",
                "dedup_window",
                "max_workflow_steps",
                "cancel_words",
                "hold_template",
                "cancelled_template",
                "workflow_failed_template",
            ]),
        ),
        ("sessions", leaves(&["backend", "path"])),
        ("metrics", leaves(&["enabled", "labels"])),
        ("workflows_dir", Leaf),
        ("workflows", Array(Box::new(workflow_schema()))),
    ]))
}

/// Flag keys the schema does not know, with "did you mean" suggestions.
#[must_use]
pub fn check_unknown_fields(value: &serde_json::Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    walk_unknown(value, &build_schema_map(), "", &mut diagnostics);
    diagnostics
}

/// Same as [`check_unknown_fields`] for a standalone workflow document.
#[must_use]
pub fn check_unknown_workflow_fields(value: &serde_json::Value, prefix: &str) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    walk_unknown(value, &workflow_schema(), prefix, &mut diagnostics);
    diagnostics
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn walk_unknown(
    value: &serde_json::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match (value, schema) {
        (serde_json::Value::Object(table), KnownKeys::Struct(fields)) => {
            for (key, child) in table {
                let path = join_path(prefix, key);
                if let Some(child_schema) = fields.get(key.as_str()) {
                    walk_unknown(child, child_schema, &path, diagnostics);
                    continue;
                }
                let level = if prefix.is_empty() {
                    " at top level"
                } else {
                    ""
                };
                let message = match suggest(key, fields.keys().copied(), 3) {
                    Some(s) => format!("unknown field{level} (did you mean \"{s}\"?)"),
                    None => format!("unknown field{level}"),
                };
                diagnostics.push(Diagnostic::new(
                    Severity::Error,
                    "unknown-field",
                    path,
                    message,
                ));
            }
        },
        (serde_json::Value::Object(table), KnownKeys::Map(value_schema)) => {
            for (key, child) in table {
                walk_unknown(child, value_schema, &join_path(prefix, key), diagnostics);
            }
        },
        (serde_json::Value::Array(items), KnownKeys::Array(item_schema)) => {
            for (i, item) in items.iter().enumerate() {
                walk_unknown(item, item_schema, &format!("{prefix}[{i}]"), diagnostics);
            }
        },
        // Leaf or type mismatch: type errors are reported by deserialization.
        _ => {},
    }
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or the discovered config file
/// when `path` is `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = path
        .map(Path::to_path_buf)
        .or_else(loader::find_config_file);

    let Some(actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Info,
                "file-ref",
                "",
                "no config file found; using the built-in default configuration",
            )],
            config_path: None,
        };
    };

    let mut diagnostics = Vec::new();
    match loader::read_and_build(&actual_path) {
        Ok((config, mut found)) => {
            diagnostics.append(&mut found);
            diagnostics.extend(validate_config(&config).diagnostics);
        },
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "syntax",
            "",
            e.to_string(),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: Some(actual_path),
    }
}

/// Semantic checks on an already-deserialized config.
#[must_use]
pub fn validate_config(config: &PelangiConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();
    check_workflows(config, &mut diagnostics);
    check_routing(config, &mut diagnostics);
    check_classifier(config, &mut diagnostics);
    check_runtime(config, &mut diagnostics);
    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

// ── Workflows ───────────────────────────────────────────────────────────────

fn check_workflows(config: &PelangiConfig, diagnostics: &mut Vec<Diagnostic>) {
    let mut seen = HashSet::new();
    for def in &config.workflows {
        let path = format!("workflows.{}", def.id);
        if def.id.trim().is_empty() {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "workflow",
                "workflows",
                "workflow id must not be empty",
            ));
            continue;
        }
        if !seen.insert(def.id.as_str()) {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "workflow",
                &path,
                format!("duplicate workflow id '{}'", def.id),
            ));
            continue;
        }
        match def.to_graph() {
            Ok(graph) => check_graph(&graph, &path, diagnostics),
            Err(e) => diagnostics.push(definition_diagnostic(def, &e, &path)),
        }
    }
}

fn definition_diagnostic(def: &WorkflowDefinition, err: &DefinitionError, path: &str) -> Diagnostic {
    let node_ids = || {
        def.nodes
            .as_ref()
            .map(|n| n.keys().map(String::as_str).collect::<Vec<_>>())
            .unwrap_or_default()
    };
    let (path, hint) = match err {
        DefinitionError::DanglingEdge { node, target, .. } => (
            format!("{path}.nodes.{node}"),
            suggest(target, node_ids(), 3).map(|s| format!(" (did you mean \"{s}\"?)")),
        ),
        DefinitionError::StartNotFound { start, .. } => (
            format!("{path}.start_node_id"),
            suggest(start, node_ids(), 3).map(|s| format!(" (did you mean \"{s}\"?)")),
        ),
        _ => (path.to_string(), None),
    };
    Diagnostic::new(
        Severity::Error,
        "workflow",
        path,
        format!("{err}{}", hint.unwrap_or_default()),
    )
}

fn check_graph(graph: &WorkflowGraph, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    // Reachability from the start node.
    let mut reachable = HashSet::new();
    let mut queue = VecDeque::from([graph.start_node_id.as_str()]);
    while let Some(id) = queue.pop_front() {
        if !reachable.insert(id) {
            continue;
        }
        if let Some(node) = graph.node(id) {
            queue.extend(node.edges());
        }
    }
    for id in graph.nodes.keys() {
        if !reachable.contains(id.as_str()) {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "workflow",
                format!("{path}.nodes.{id}"),
                "node is unreachable from the start node",
            ));
        }
    }

    let bound: BTreeSet<&str> = graph
        .nodes
        .values()
        .filter_map(|n| match n {
            Node::WaitForReply { variable, .. } => Some(variable.as_str()),
            _ => None,
        })
        .collect();

    for (id, node) in &graph.nodes {
        let Node::Condition {
            field,
            operator,
            value,
            ..
        } = node
        else {
            continue;
        };
        let node_path = format!("{path}.nodes.{id}");
        if value.is_none() && !operator.tolerates_missing() {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "workflow",
                &node_path,
                format!("operator {operator:?} needs a comparison `value`"),
            ));
        }
        let root = field.split('.').next().unwrap_or(field);
        if !bound.contains(root) && !operator.tolerates_missing() {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "workflow",
                &node_path,
                format!(
                    "condition field '{field}' is not bound by any wait_for_reply node; it must come from an external_call result"
                ),
            ));
        }
    }

    if let Some(node) = find_cycle_without_wait(graph) {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "workflow",
            format!("{path}.nodes.{node}"),
            "cycle with no wait_for_reply node; traversal will stop at the step ceiling",
        ));
    }
}

/// A node on some cycle made only of non-waiting nodes, if one exists.
fn find_cycle_without_wait(graph: &WorkflowGraph) -> Option<&str> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let mut marks: BTreeMap<&str, Mark> = graph
        .nodes
        .iter()
        .filter(|(_, n)| !n.is_wait())
        .map(|(id, _)| (id.as_str(), Mark::Unvisited))
        .collect();
    let roots: Vec<&str> = marks.keys().copied().collect();

    for root in roots {
        if marks.get(root) != Some(&Mark::Unvisited) {
            continue;
        }
        // Iterative DFS: (node, index of next edge to explore).
        let mut stack = vec![(root, 0usize)];
        marks.insert(root, Mark::InProgress);
        while let Some((id, edge_idx)) = stack.pop() {
            let edges = graph.node(id).map(Node::edges).unwrap_or_default();
            let Some(next) = edges.get(edge_idx).copied() else {
                marks.insert(id, Mark::Done);
                continue;
            };
            stack.push((id, edge_idx + 1));
            match marks.get(next) {
                Some(Mark::InProgress) => return Some(next),
                Some(Mark::Unvisited) => {
                    marks.insert(next, Mark::InProgress);
                    stack.push((next, 0));
                },
                // Waiting nodes are absent from `marks` and break the cycle.
                Some(Mark::Done) | None => {},
            }
        }
    }
    None
}

// ── Routing ─────────────────────────────────────────────────────────────────

fn check_routing(config: &PelangiConfig, diagnostics: &mut Vec<Diagnostic>) {
    let workflow_ids: Vec<&str> = config.workflows.iter().map(|w| w.id.as_str()).collect();
    let template_ids: Vec<&str> = config.templates.keys().map(String::as_str).collect();

    let missing = |kind: &str, id: &str, candidates: &[&str]| {
        let hint = suggest(id, candidates.iter().copied(), 3)
            .map(|s| format!(" (did you mean \"{s}\"?)"))
            .unwrap_or_default();
        format!("unknown {kind} '{id}'{hint}")
    };

    let entries = config
        .routing
        .intents
        .iter()
        .map(|(intent, entry)| (format!("routing.intents.{intent}"), entry))
        .chain(std::iter::once(("routing.default".to_string(), &config.routing.default)));

    for (path, entry) in entries {
        match entry {
            RouteEntry::StaticReply { template } => {
                if !config.has_template(template) {
                    diagnostics.push(Diagnostic::new(
                        Severity::Error,
                        "routing",
                        path,
                        missing("template", template, &template_ids),
                    ));
                }
            },
            RouteEntry::StartWorkflow { workflow } => {
                if config.workflow(workflow).is_none() {
                    diagnostics.push(Diagnostic::new(
                        Severity::Error,
                        "routing",
                        path,
                        missing("workflow", workflow, &workflow_ids),
                    ));
                }
            },
            RouteEntry::Escalate {
                reply_template: Some(template),
                ..
            } if !config.has_template(template) => {
                diagnostics.push(Diagnostic::new(
                    Severity::Error,
                    "routing",
                    path,
                    missing("template", template, &template_ids),
                ));
            },
            RouteEntry::Escalate { .. } | RouteEntry::GeneratedReply { .. } => {},
        }
    }

    if !config.has_template(&config.routing.generated_reply_fallback) {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "routing",
            "routing.generated_reply_fallback",
            format!(
                "template '{}' is not defined; a built-in apology is used when all providers fail",
                config.routing.generated_reply_fallback
            ),
        ));
    }

    let mut classified: BTreeSet<&str> = config
        .classifier
        .fuzzy
        .keywords
        .keys()
        .map(String::as_str)
        .collect();
    classified.extend(config.classifier.semantic.examples.keys().map(String::as_str));
    for intent in classified {
        if !config.routing.intents.contains_key(intent) {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "routing",
                format!("routing.intents.{intent}"),
                "intent can be classified but has no routing entry; the default action applies",
            ));
        }
    }
}

// ── Classifier ──────────────────────────────────────────────────────────────

fn check_classifier(config: &PelangiConfig, diagnostics: &mut Vec<Diagnostic>) {
    let classifier = &config.classifier;
    for (i, p) in classifier.emergency.patterns.iter().enumerate() {
        if let Err(e) = regex::Regex::new(&p.pattern) {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "classifier",
                format!("classifier.emergency.patterns[{i}]"),
                format!("invalid regex for '{}': {e}", p.intent),
            ));
        }
    }

    let thresholds = [
        ("classifier.fuzzy.threshold", classifier.fuzzy.threshold),
        ("classifier.semantic.threshold", classifier.semantic.threshold),
        (
            "classifier.semantic.fuzzy_skip_cutoff",
            classifier.semantic.fuzzy_skip_cutoff,
        ),
        (
            "classifier.generative.threshold",
            classifier.generative.threshold,
        ),
    ];
    for (path, value) in thresholds {
        if !(0.0..=1.0).contains(&value) {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "classifier",
                path,
                format!("{value} is outside [0, 1]"),
            ));
        }
    }

    if classifier.generative.enabled && config.providers.chain.iter().all(|p| !p.enabled) {
        diagnostics.push(Diagnostic::new(
            Severity::Info,
            "providers",
            "providers.chain",
            "no enabled providers; the generative tier and generated replies will always fall back",
        ));
    }

    let mut ids = HashSet::new();
    for entry in &config.providers.chain {
        if !ids.insert(entry.id.as_str()) {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "providers",
                format!("providers.chain.{}", entry.id),
                "duplicate provider id",
            ));
        }
    }
}

// ── Runtime settings ────────────────────────────────────────────────────────

fn check_runtime(config: &PelangiConfig, diagnostics: &mut Vec<Diagnostic>) {
    if config.system.timezone.parse::<chrono_tz::Tz>().is_err() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "system",
            "system.timezone",
            format!("unknown timezone '{}'", config.system.timezone),
        ));
    }
    let orchestrator = &config.orchestrator;
    if orchestrator.max_workflow_steps == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "orchestrator",
            "orchestrator.max_workflow_steps",
            "step ceiling must be at least 1",
        ));
    }
    if orchestrator.budget_secs == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "orchestrator",
            "orchestrator.budget_secs",
            "handling budget must be at least 1 second",
        ));
    }
    for (path, id) in [
        ("orchestrator.hold_template", &orchestrator.hold_template),
        (
            "orchestrator.cancelled_template",
            &orchestrator.cancelled_template,
        ),
        (
            "orchestrator.workflow_failed_template",
            &orchestrator.workflow_failed_template,
        ),
    ] {
        if !config.has_template(id) {
            diagnostics.push(Diagnostic::new(
                Severity::Info,
                "orchestrator",
                path,
                format!("template '{id}' is not defined; built-in text is used"),
            ));
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> PelangiConfig {
        toml::from_str(src).unwrap()
    }

    fn value(src: &str) -> serde_json::Value {
        serde_json::to_value(toml::from_str::<toml::Value>(src).unwrap()).unwrap()
    }

    fn has(result: &ValidationResult, severity: Severity, needle: &str) -> bool {
        result
            .diagnostics
            .iter()
            .any(|d| d.severity == severity && (d.message.contains(needle) || d.path.contains(needle)))
    }

    #[test]
    fn unknown_top_level_key_with_suggestion() {
        let diags = check_unknown_fields(&value("[routng]\ndefault = 1\n"));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].path, "routng");
        assert!(diags[0].message.contains("\"routing\""), "{}", diags[0].message);
    }

    #[test]
    fn unknown_node_field_is_reported() {
        let diags = check_unknown_fields(&value(
            r#"
[[workflows]]
id = "w"
start_node_id = "a"

[workflows.nodes.a]
kind = "message"
template = "hi"
nxt = "b"
"#,
        ));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].path, "workflows[0].nodes.a.nxt");
        assert!(diags[0].message.contains("\"next\""));
    }

    #[test]
    fn empty_config_has_no_errors() {
        let result = validate_config(&PelangiConfig::default());
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
    }

    #[test]
    fn dangling_edge_suggests_close_node() {
        let cfg = parse(
            r#"
[[workflows]]
id = "check_in"
start_node_id = "welcome"

[workflows.nodes.welcome]
kind = "message"
template = "hi"
next = "ask_nam"

[workflows.nodes.ask_name]
kind = "wait_for_reply"
variable = "guest_name"
"#,
        );
        let result = validate_config(&cfg);
        assert!(result.has_errors());
        let err = result.errors().next().unwrap();
        assert_eq!(err.path, "workflows.check_in.nodes.welcome");
        assert!(err.message.contains("did you mean \"ask_name\""), "{}", err.message);
    }

    #[test]
    fn duplicate_workflow_ids_are_errors() {
        let cfg = parse(
            r#"
[[workflows]]
id = "w"
[[workflows.steps]]
kind = "message"
template = "a"

[[workflows]]
id = "w"
[[workflows.steps]]
kind = "message"
template = "b"
"#,
        );
        assert!(has(&validate_config(&cfg), Severity::Error, "duplicate workflow id"));
    }

    #[test]
    fn cycle_without_wait_is_warned() {
        let cfg = parse(
            r#"
[[workflows]]
id = "loop"
start_node_id = "a"

[workflows.nodes.a]
kind = "condition"
field = "x"
operator = "exists"
if_true = "b"
if_false = "b"

[workflows.nodes.b]
kind = "message"
template = "again"
next = "a"
"#,
        );
        let result = validate_config(&cfg);
        assert!(has(&result, Severity::Warning, "cycle with no wait_for_reply"));
        assert!(!result.has_errors());
    }

    #[test]
    fn cycle_through_wait_is_fine() {
        let cfg = parse(
            r#"
[[workflows]]
id = "retry"
start_node_id = "ask"

[workflows.nodes.ask]
kind = "wait_for_reply"
prompt = "Your phone?"
variable = "phone"
next = "check"

[workflows.nodes.check]
kind = "condition"
field = "phone"
operator = "exists"
if_false = "ask"
"#,
        );
        let result = validate_config(&cfg);
        assert!(!has(&result, Severity::Warning, "cycle"));
        assert!(!has(&result, Severity::Warning, "not bound"));
    }

    #[test]
    fn unbound_condition_field_and_unreachable_node() {
        let cfg = parse(
            r#"
[[workflows]]
id = "w"
start_node_id = "c"

[workflows.nodes.c]
kind = "condition"
field = "available_units"
operator = ">"
value = 0

[workflows.nodes.orphan]
kind = "message"
template = "never"
"#,
        );
        let result = validate_config(&cfg);
        assert!(has(&result, Severity::Warning, "available_units"));
        assert!(has(&result, Severity::Warning, "unreachable"));
    }

    #[test]
    fn condition_without_value_is_error() {
        let cfg = parse(
            r#"
[[workflows]]
id = "w"
start_node_id = "c"

[workflows.nodes.c]
kind = "condition"
field = "x"
operator = "equals"
"#,
        );
        assert!(has(&validate_config(&cfg), Severity::Error, "comparison `value`"));
    }

    #[test]
    fn routing_targets_must_exist() {
        let cfg = parse(
            r#"
[templates]
thanks = "You're welcome!"

[routing.intents.thanks]
action = "static_reply"
template = "thank"

[routing.intents.check_in_arrival]
action = "start_workflow"
workflow = "check_in"
"#,
        );
        let result = validate_config(&cfg);
        assert_eq!(result.count(Severity::Error), 2, "{:?}", result.diagnostics);
        assert!(has(&result, Severity::Error, "unknown workflow 'check_in'"));
        assert!(has(&result, Severity::Error, "did you mean \"thanks\""));
    }

    #[test]
    fn builtin_templates_satisfy_routes() {
        let cfg = parse(
            r#"
[system]
hostel_name = "Rainbow"

[routing.intents.unknown]
action = "escalate"
reply_template = "escalation_unknown"

[routing.intents.pricing]
action = "static_reply"
template = "fallback"
"#,
        );
        let result = validate_config(&cfg);
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
        assert!(!has(&result, Severity::Warning, "generated_reply_fallback"));
        assert!(!has(&result, Severity::Info, "built-in text is used"));
    }

    #[test]
    fn classifier_settings_checked() {
        let cfg = parse(
            r#"
[classifier.fuzzy]
threshold = 1.5

[[classifier.emergency.patterns]]
intent = "fire_emergency"
pattern = "(unclosed"

[classifier.fuzzy.keywords.thanks]
en = ["thanks"]
"#,
        );
        let result = validate_config(&cfg);
        assert!(has(&result, Severity::Error, "outside [0, 1]"));
        assert!(has(&result, Severity::Error, "invalid regex"));
        assert!(has(&result, Severity::Warning, "routing.intents.thanks"));
    }

    #[test]
    fn bad_timezone_and_zero_ceiling() {
        let cfg = parse(
            r#"
[system]
timezone = "Mars/Olympus"

[orchestrator]
max_workflow_steps = 0
"#,
        );
        let result = validate_config(&cfg);
        assert!(has(&result, Severity::Error, "unknown timezone"));
        assert!(has(&result, Severity::Error, "step ceiling"));
    }

    #[test]
    fn default_template_is_clean() {
        let cfg: PelangiConfig = toml::from_str(crate::template::DEFAULT_CONFIG_TEMPLATE).unwrap();
        let result = validate_config(&cfg);
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
        // Only the availability branch reads a variable filled by an external call.
        let warnings: Vec<_> = result
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .collect();
        assert!(
            warnings.iter().all(|d| d.message.contains("external_call")),
            "{warnings:?}"
        );
    }
}
