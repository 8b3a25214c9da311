#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    async_trait::async_trait,
    pelangi_common::{Language, OutboundAction},
    pelangi_config::{StaffConfig, WorkflowDefinition, WorkflowGraph, default_config},
    pelangi_workflow::{
        ActionError, EngineContext, ExternalActions, InstanceStatus, NoActions, StepOutcome,
        Variables, WorkflowEngine, WorkflowRegistry, template,
    },
    serde_json::{Value, json},
};

// ── Scripted booking system ─────────────────────────────────────────────────

#[derive(Default)]
struct ScriptedActions {
    replies: BTreeMap<String, Result<Value, ActionError>>,
    calls: Mutex<Vec<(String, BTreeMap<String, String>)>>,
    delay: Option<Duration>,
}

impl ScriptedActions {
    fn with(mut self, action: &str, reply: Result<Value, ActionError>) -> Self {
        self.replies.insert(action.to_string(), reply);
        self
    }

    fn calls(&self) -> Vec<(String, BTreeMap<String, String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExternalActions for ScriptedActions {
    async fn call(
        &self,
        action: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<Variables, ActionError> {
        self.calls
            .lock()
            .unwrap()
            .push((action.to_string(), params.clone()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.replies.get(action) {
            Some(Ok(value)) => Ok(serde_json::from_value(value.clone()).unwrap()),
            Some(Err(e)) => Err(e.clone()),
            None => Err(ActionError::NotConfigured(action.to_string())),
        }
    }
}

fn check_in_graph() -> Arc<WorkflowGraph> {
    let config = default_config().unwrap().config;
    WorkflowRegistry::from_config(&config)
        .unwrap()
        .get("check_in")
        .unwrap()
}

fn staff() -> StaffConfig {
    let mut staff = StaffConfig::default();
    staff
        .recipients
        .insert("front_desk".into(), "+60300000000".into());
    staff
}

fn ctx() -> EngineContext {
    let system: Variables = serde_json::from_value(json!({
        "hostel_name": "Pelangi",
        "date": "2026-03-14",
    }))
    .unwrap();
    EngineContext::new("+60123456789".into(), Language::En, system)
}

fn texts(outbound: &[OutboundAction]) -> Vec<&str> {
    outbound.iter().map(OutboundAction::text).collect()
}

fn graph(toml_src: &str) -> WorkflowGraph {
    toml::from_str::<WorkflowDefinition>(toml_src)
        .unwrap()
        .to_graph()
        .unwrap()
}

// ── Check-in ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn check_in_start_auto_advances_to_name_prompt() {
    let engine = WorkflowEngine::new(Arc::new(NoActions), staff());
    let graph = check_in_graph();

    let (instance, report) = engine.start(&graph, &ctx()).await;

    assert_eq!(report.outcome, StepOutcome::Waiting {
        node: "ask_name".into()
    });
    assert_eq!(texts(&report.outbound), [
        "Welcome to Pelangi! Let's get you checked in.",
        "May I have your full name?",
    ]);
    assert_eq!(instance.current_node_id.as_deref(), Some("ask_name"));
    assert_eq!(instance.status, InstanceStatus::Active);
    assert_eq!(instance.step_count, 2);
}

#[tokio::test]
async fn name_reply_resumes_to_phone_prompt() {
    let engine = WorkflowEngine::new(Arc::new(NoActions), staff());
    let graph = check_in_graph();
    let (mut instance, _) = engine.start(&graph, &ctx()).await;

    let report = engine
        .resume(&graph, &mut instance, Some("m1"), "  Ali Hassan ", &ctx())
        .await
        .unwrap();

    assert_eq!(report.outcome, StepOutcome::Waiting {
        node: "ask_phone".into()
    });
    assert_eq!(texts(&report.outbound), [
        "Thanks Ali Hassan! What's your phone number?"
    ]);
    assert_eq!(instance.variables["guest_name"], "Ali Hassan");
    assert_eq!(instance.step_count, 3);
}

#[tokio::test]
async fn failed_availability_check_still_reaches_link_creation() {
    let actions = Arc::new(
        ScriptedActions::default()
            .with(
                "check_availability",
                Err(ActionError::Transport("connection refused".into())),
            )
            .with(
                "create_checkin_link",
                Ok(json!({ "checkin_link": "https://pelangi.example/c/abc" })),
            ),
    );
    let engine = WorkflowEngine::new(actions.clone(), staff());
    let graph = check_in_graph();
    let (mut instance, _) = engine.start(&graph, &ctx()).await;
    engine
        .resume(&graph, &mut instance, Some("m1"), "Ali", &ctx())
        .await
        .unwrap();

    let report = engine
        .resume(&graph, &mut instance, Some("m2"), "0123456789", &ctx())
        .await
        .unwrap();

    assert_eq!(report.outcome, StepOutcome::Completed);
    assert_eq!(report.outbound, vec![
        OutboundAction::send(
            &"+60123456789".into(),
            "Please complete your check-in here: https://pelangi.example/c/abc"
        ),
        OutboundAction::notify("+60300000000", "Check-in link sent to Ali (0123456789)."),
    ]);
    let calls = actions.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, "check_availability");
    assert_eq!(calls[0].1["date"], "2026-03-14");
    assert_eq!(calls[1].0, "create_checkin_link");
    assert_eq!(calls[1].1["name"], "Ali");
    assert_eq!(calls[1].1["phone"], "0123456789");
    assert_eq!(instance.status, InstanceStatus::Completed);
    assert_eq!(instance.current_node_id, None);
}

#[tokio::test]
async fn full_house_notifies_staff_before_the_link() {
    let actions = Arc::new(
        ScriptedActions::default()
            .with("check_availability", Ok(json!({ "available_units": 0 })))
            .with(
                "create_checkin_link",
                Ok(json!({ "checkin_link": "https://pelangi.example/c/x" })),
            ),
    );
    let engine = WorkflowEngine::new(actions, staff());
    let graph = check_in_graph();
    let (mut instance, _) = engine.start(&graph, &ctx()).await;
    engine
        .resume(&graph, &mut instance, None, "Mei", &ctx())
        .await
        .unwrap();
    let report = engine
        .resume(&graph, &mut instance, None, "0198765432", &ctx())
        .await
        .unwrap();

    assert_eq!(texts(&report.outbound), [
        "No capsules free on 2026-03-14 for Mei (0198765432); please arrange one.",
        "Please complete your check-in here: https://pelangi.example/c/x",
        "Check-in link sent to Mei (0198765432).",
    ]);
}

#[tokio::test]
async fn no_backend_takes_the_failure_path_and_tells_staff() {
    let engine = WorkflowEngine::new(Arc::new(NoActions), staff());
    let graph = check_in_graph();
    let (mut instance, _) = engine.start(&graph, &ctx()).await;
    engine
        .resume(&graph, &mut instance, None, "Ali", &ctx())
        .await
        .unwrap();
    let report = engine
        .resume(&graph, &mut instance, None, "0123456789", &ctx())
        .await
        .unwrap();

    assert_eq!(report.outcome, StepOutcome::Completed);
    assert_eq!(texts(&report.outbound), [
        "Thanks Ali! Our staff will send your check-in link shortly.",
        "Could not create a check-in link for Ali (0123456789); please send one manually.",
    ]);
    assert!(instance.variables.contains_key("last_error"));
}

#[tokio::test]
async fn slow_action_times_out_onto_the_error_edge() {
    let actions = Arc::new(ScriptedActions {
        delay: Some(Duration::from_millis(200)),
        ..ScriptedActions::default()
    });
    let engine = WorkflowEngine::new(actions, staff()).with_action_timeout(Duration::from_millis(20));
    let graph = check_in_graph();
    let (mut instance, _) = engine.start(&graph, &ctx()).await;
    engine
        .resume(&graph, &mut instance, None, "Ali", &ctx())
        .await
        .unwrap();
    let report = engine
        .resume(&graph, &mut instance, None, "0123456789", &ctx())
        .await
        .unwrap();

    assert_eq!(report.outcome, StepOutcome::Completed);
    assert!(
        instance.variables["last_error"]
            .as_str()
            .unwrap()
            .contains("timed out")
    );
}

#[tokio::test]
async fn localized_prompts_follow_the_conversation_language() {
    let engine = WorkflowEngine::new(Arc::new(NoActions), staff());
    let graph = check_in_graph();
    let mut ctx = ctx();
    ctx.language = Language::Ms;

    let (_, report) = engine.start(&graph, &ctx).await;
    assert_eq!(texts(&report.outbound)[1], "Boleh saya dapatkan nama penuh anda?");
}

// ── Idempotence and step accounting ─────────────────────────────────────────

#[tokio::test]
async fn same_message_id_does_not_advance_twice() {
    let engine = WorkflowEngine::new(Arc::new(NoActions), staff());
    let graph = check_in_graph();
    let (mut instance, _) = engine.start(&graph, &ctx()).await;

    engine
        .resume(&graph, &mut instance, Some("wamid.1"), "Ali", &ctx())
        .await
        .unwrap();
    let snapshot = instance.clone();

    let report = engine
        .resume(&graph, &mut instance, Some("wamid.1"), "Ali", &ctx())
        .await
        .unwrap();
    assert_eq!(report.outcome, StepOutcome::Duplicate);
    assert!(report.outbound.is_empty());
    assert_eq!(instance, snapshot);
}

#[tokio::test]
async fn step_count_strictly_increases_on_every_call() {
    let engine = WorkflowEngine::new(Arc::new(NoActions), staff());
    let graph = check_in_graph();
    let (mut instance, _) = engine.start(&graph, &ctx()).await;
    let mut last = instance.step_count;
    assert!(last > 0);

    for (i, reply) in ["Ali", "0123456789"].iter().enumerate() {
        let id = format!("m{i}");
        engine
            .resume(&graph, &mut instance, Some(id.as_str()), reply, &ctx())
            .await
            .unwrap();
        assert!(instance.step_count > last);
        last = instance.step_count;
    }
}

#[tokio::test]
async fn resume_after_completion_is_rejected() {
    let engine = WorkflowEngine::new(Arc::new(NoActions), staff());
    let graph = graph(
        r#"
id = "one_shot"
start_node_id = "hi"

[nodes.hi]
kind = "message"
template = "Hello!"
"#,
    );
    let (mut instance, report) = engine.start(&graph, &ctx()).await;
    assert_eq!(report.outcome, StepOutcome::Completed);
    assert!(
        engine
            .resume(&graph, &mut instance, None, "hello?", &ctx())
            .await
            .is_err()
    );
}

// ── Failure handling ────────────────────────────────────────────────────────

#[tokio::test]
async fn condition_cycle_halts_at_the_step_ceiling() {
    let engine = WorkflowEngine::new(Arc::new(NoActions), staff());
    let graph = graph(
        r#"
id = "loop"
start_node_id = "a"

[nodes.a]
kind = "condition"
field = "missing"
operator = "not_exists"
if_true = "b"

[nodes.b]
kind = "condition"
field = "missing"
operator = "not_exists"
if_true = "a"
"#,
    );

    let (instance, report) = engine.start(&graph, &ctx()).await;

    assert_eq!(report.transitions, 50);
    assert_eq!(instance.step_count, 50);
    assert_eq!(instance.status, InstanceStatus::Errored);
    assert!(matches!(report.outcome, StepOutcome::Errored { kind: "step_limit", .. }));
    assert!(instance.error.as_deref().unwrap().contains("50"));
}

#[tokio::test]
async fn configured_ceiling_is_honoured() {
    let engine = WorkflowEngine::new(Arc::new(NoActions), staff()).with_max_steps(5);
    let graph = graph(
        r#"
id = "spin"
start_node_id = "a"

[nodes.a]
kind = "message"
template = "again"
next = "a"
"#,
    );
    let (_, report) = engine.start(&graph, &ctx()).await;
    assert_eq!(report.transitions, 5);
    assert_eq!(report.outbound.len(), 5);
}

#[tokio::test]
async fn unbound_condition_field_errors_the_instance() {
    let engine = WorkflowEngine::new(Arc::new(NoActions), staff());
    let graph = graph(
        r#"
id = "cond"
start_node_id = "check"

[nodes.check]
kind = "condition"
field = "available_units"
operator = ">"
value = 0
if_true = "yes"

[nodes.yes]
kind = "message"
template = "ok"
"#,
    );
    let (instance, report) = engine.start(&graph, &ctx()).await;
    assert!(matches!(report.outcome, StepOutcome::Errored {
        kind: "condition_unbound",
        ..
    }));
    assert_eq!(instance.status, InstanceStatus::Errored);
}

#[tokio::test]
async fn action_failure_without_error_edge_errors_the_instance() {
    let engine = WorkflowEngine::new(Arc::new(NoActions), staff());
    let graph = graph(
        r#"
id = "strict"
start_node_id = "reserve"

[nodes.reserve]
kind = "external_call"
action = "reserve_unit"
on_success = "done"

[nodes.done]
kind = "message"
template = "Reserved"
"#,
    );
    let (_, report) = engine.start(&graph, &ctx()).await;
    assert!(matches!(report.outcome, StepOutcome::Errored {
        kind: "unhandled_action",
        ..
    }));
    assert!(report.outbound.is_empty());
}

#[tokio::test]
async fn unresolved_template_errors_the_instance() {
    let engine = WorkflowEngine::new(Arc::new(NoActions), staff());
    let graph = graph(
        r#"
id = "tpl"
start_node_id = "hi"

[nodes.hi]
kind = "message"
template = "Your link: {{checkin_link}}"
"#,
    );
    let (_, report) = engine.start(&graph, &ctx()).await;
    let StepOutcome::Errored { kind, reason } = report.outcome else {
        panic!("expected errored outcome");
    };
    assert_eq!(kind, "template");
    assert!(reason.contains("checkin_link"), "{reason}");
}

// ── Flat steps ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn flat_steps_continue_past_a_failed_action() {
    let config = default_config().unwrap().config;
    let graph = WorkflowRegistry::from_config(&config)
        .unwrap()
        .get("late_checkout")
        .unwrap();
    let engine = WorkflowEngine::new(Arc::new(NoActions), staff());

    let (mut instance, report) = engine.start(&graph, &ctx()).await;
    assert_eq!(texts(&report.outbound), ["What time would you like to check out?"]);

    let report = engine
        .resume(&graph, &mut instance, None, "2pm", &ctx())
        .await
        .unwrap();
    assert_eq!(report.outcome, StepOutcome::Completed);
    assert_eq!(report.outbound, vec![
        OutboundAction::send(
            &"+60123456789".into(),
            "Noted! We'll confirm your late checkout at 2pm shortly."
        ),
        OutboundAction::notify(
            "+60300000000",
            "Late checkout requested for 2pm by +60123456789."
        ),
    ]);
}

#[tokio::test]
async fn rendered_messages_carry_no_placeholders() {
    let actions = Arc::new(ScriptedActions::default().with(
        "create_checkin_link",
        Ok(json!({ "checkin_link": "https://pelangi.example/c/abc" })),
    ));
    let engine = WorkflowEngine::new(actions, staff());
    let graph = check_in_graph();
    let (mut instance, mut all) = engine.start(&graph, &ctx()).await;
    for reply in ["Ali", "0123456789"] {
        let report = engine
            .resume(&graph, &mut instance, None, reply, &ctx())
            .await
            .unwrap();
        all.outbound.extend(report.outbound);
    }
    for action in &all.outbound {
        assert!(template::placeholders(action.text()).is_empty(), "{action:?}");
    }
}
