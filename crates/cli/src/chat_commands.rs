//! Terminal chat: each stdin line is one inbound guest message.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use {
    pelangi_auto_reply::{Collaborators, Disposition, HandleOutcome, Orchestrator},
    pelangi_common::{InboundMessage, Language, OutboundAction},
    pelangi_config::{
        LoadedConfig,
        watcher::{ConfigWatchEvent, ConfigWatcher},
    },
    pelangi_metrics::MetricsHandle,
    tokio::{
        io::{AsyncBufReadExt, BufReader},
        sync::mpsc,
    },
    tracing::{info, warn},
};

const SWEEP_EVERY: Duration = Duration::from_secs(30);

pub async fn run(
    loaded: LoadedConfig,
    key: &str,
    language: Option<Language>,
    watch: bool,
    metrics: MetricsHandle,
) -> anyhow::Result<()> {
    let config_path = loaded.path.clone();
    let workflows_dir = workflows_dir(&loaded);
    let orchestrator = Orchestrator::from_config(loaded.config).await?;

    // Keep the watcher alive for the whole session.
    let (_watcher, mut events) = match (&config_path, watch) {
        (Some(path), true) => {
            let (watcher, rx) = ConfigWatcher::start(path, workflows_dir.as_deref())?;
            (Some(watcher), Some(rx))
        },
        _ => (None, None),
    };

    eprintln!("Chatting as {key}. Type /quit to leave, /metrics to dump counters.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut sweep = tokio::time::interval(SWEEP_EVERY);
    sweep.tick().await;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                match line {
                    "" => continue,
                    "/quit" | "/exit" => break,
                    "/metrics" => {
                        println!("{}", metrics.render());
                        continue;
                    },
                    _ => {},
                }
                let mut message = InboundMessage::new(key, line);
                if let Some(language) = language {
                    message = message.with_language(language);
                }
                match orchestrator.handle(message).await {
                    Ok(outcome) => print_outcome(&outcome),
                    Err(e) => eprintln!("error: {e}"),
                }
            },
            Some(event) = next_event(&mut events) => {
                let ConfigWatchEvent::Changed { path } = event;
                if let Some(ref config_path) = config_path {
                    reload(&orchestrator, config_path, &path);
                }
            },
            _ = sweep.tick() => {
                match orchestrator.sweep_retries().await {
                    Ok(retried) => {
                        for (_, actions) in retried {
                            print_actions(&actions);
                        }
                    },
                    Err(e) => warn!(error = %e, "retry sweep failed"),
                }
            },
        }
    }
    Ok(())
}

fn reload(orchestrator: &Orchestrator, config_path: &Path, changed: &Path) {
    match pelangi_config::load_config(config_path) {
        Ok(loaded) => {
            let collaborators = Collaborators::from_config(&loaded.config);
            match orchestrator.reload_with(loaded.config, collaborators) {
                Ok(()) => info!(changed = %changed.display(), "configuration reloaded"),
                Err(e) => warn!(error = %e, "new configuration rejected, keeping the previous one"),
            }
        },
        Err(e) => warn!(error = %e, "new configuration rejected, keeping the previous one"),
    }
}

async fn next_event(
    events: &mut Option<mpsc::UnboundedReceiver<ConfigWatchEvent>>,
) -> Option<ConfigWatchEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// `workflows_dir` is relative to the config file.
fn workflows_dir(loaded: &LoadedConfig) -> Option<PathBuf> {
    let dir = loaded.config.workflows_dir.as_ref()?;
    if dir.is_absolute() {
        return Some(dir.clone());
    }
    let base = loaded.path.as_ref()?.parent()?;
    Some(base.join(dir))
}

fn print_outcome(outcome: &HandleOutcome) {
    if outcome.disposition == Disposition::Duplicate {
        eprintln!("(duplicate, ignored)");
        return;
    }
    print_actions(&outcome.actions);
    match &outcome.disposition {
        Disposition::Routed(decision) => {
            eprintln!("({} → {} {})", decision.intent, decision.kind(), decision.target());
        },
        Disposition::Workflow { workflow, outcome } => {
            eprintln!("(workflow {workflow}: {outcome:?})");
        },
        Disposition::Cancelled { workflow } => eprintln!("(workflow {workflow} cancelled)"),
        Disposition::Held => eprintln!("(held for retry)"),
        Disposition::Duplicate => {},
    }
}

fn print_actions(actions: &[OutboundAction]) {
    for action in actions {
        match action {
            OutboundAction::SendMessage { text, .. } => println!("pelangi> {text}"),
            OutboundAction::NotifyStaff { recipient, text } => {
                println!("  [staff → {recipient}] {text}");
            },
        }
    }
}
