mod chat_commands;
mod config_commands;
mod db_commands;
mod workflow_commands;

use std::path::{Path, PathBuf};

use {
    clap::{Parser, Subcommand},
    pelangi_auto_reply::{Collaborators, Runtime},
    pelangi_classifier::ClassifyContext,
    pelangi_common::Language,
    pelangi_config::LoadedConfig,
    pelangi_metrics::{MetricsHandle, MetricsRecorderConfig},
    pelangi_routing::ConversationState,
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "pelangi", about = "Pelangi, the hostel guest-message assistant")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to load instead of the discovered one.
    #[arg(long, short, global = true, env = "PELANGI_CONFIG")]
    config: Option<PathBuf>,

    /// Custom config directory (overrides default ~/.config/pelangi/).
    #[arg(long, global = true, env = "PELANGI_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Talk to the assistant as a guest from the terminal.
    Chat {
        /// Conversation key (normally the guest's phone number).
        #[arg(long, default_value = "cli-guest")]
        key: String,
        /// Declare the guest's language (en, ms, zh) instead of detecting it.
        #[arg(long)]
        language: Option<String>,
        /// Do not reload when the config file changes.
        #[arg(long)]
        no_watch: bool,
    },
    /// Classify one message and show the routing decision.
    Classify {
        text: String,
        #[arg(long)]
        language: Option<String>,
        /// Print JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
    /// Inspect configured workflows.
    Workflows {
        #[command(subcommand)]
        action: workflow_commands::WorkflowAction,
    },
    /// Conversation store management.
    Db {
        #[command(subcommand)]
        action: db_commands::DbAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Load the explicit config file, or discover one, or fall back to the
/// built-in defaults. Warnings are logged.
fn load_config(path: Option<&Path>) -> anyhow::Result<LoadedConfig> {
    let loaded = match path {
        Some(path) => pelangi_config::load_config(path)?,
        None => pelangi_config::discover_and_load()?,
    };
    for diagnostic in &loaded.diagnostics {
        warn!(%diagnostic, "config diagnostic");
    }
    Ok(loaded)
}

fn init_metrics(config: &pelangi_config::PelangiConfig) -> anyhow::Result<MetricsHandle> {
    pelangi_metrics::init_metrics(MetricsRecorderConfig {
        enabled: config.metrics.enabled,
        global_labels: config
            .metrics
            .labels
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    })
}

fn parse_language(code: Option<&str>) -> anyhow::Result<Option<Language>> {
    code.map(|c| {
        Language::from_code(c).ok_or_else(|| anyhow::anyhow!("unknown language '{c}' (en, ms, zh)"))
    })
    .transpose()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    if let Some(ref dir) = cli.config_dir {
        pelangi_config::set_config_dir(dir.clone());
    }
    info!(version = env!("CARGO_PKG_VERSION"), "pelangi starting");

    match cli.command {
        Commands::Chat {
            ref key,
            ref language,
            no_watch,
        } => {
            let loaded = load_config(cli.config.as_deref())?;
            let metrics = init_metrics(&loaded.config)?;
            let language = parse_language(language.as_deref())?;
            chat_commands::run(loaded, key, language, !no_watch, metrics).await
        },
        Commands::Classify {
            ref text,
            ref language,
            json,
        } => {
            let loaded = load_config(cli.config.as_deref())?;
            let language = parse_language(language.as_deref())?;
            classify(loaded, text, language, json).await
        },
        Commands::Config { action } => config_commands::handle_config(action, cli.config.as_deref()),
        Commands::Workflows { action } => {
            let loaded = load_config(cli.config.as_deref())?;
            workflow_commands::handle_workflows(action, &loaded.config)
        },
        Commands::Db { action } => {
            let loaded = load_config(cli.config.as_deref())?;
            db_commands::handle_db(action, &loaded.config).await
        },
    }
}

async fn classify(
    loaded: LoadedConfig,
    text: &str,
    language: Option<Language>,
    json: bool,
) -> anyhow::Result<()> {
    let collaborators = Collaborators::from_config(&loaded.config);
    let runtime = Runtime::build(loaded.config, collaborators)?;
    let context = ClassifyContext::new()
        .with_language(language.or_else(|| Language::detect(text)))
        .with_today(runtime.today(chrono::Utc::now()));

    let result = runtime.classifier().classify(text, &context).await;
    let decision = runtime
        .router()
        .route(&result, &ConversationState::default());

    if json {
        let out = serde_json::json!({ "classification": result, "decision": decision });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let tier = result.source_tier.map_or("none", |t| t.as_str());
    println!("intent:     {}", result.intent);
    println!("confidence: {:.2}", result.confidence);
    println!("tier:       {tier}");
    if let Some(ref evidence) = result.matched_evidence {
        println!("evidence:   {evidence}");
    }
    for (name, value) in &result.entities {
        println!("entity:     {name} = {value}");
    }
    println!("action:     {} → {}", decision.kind(), decision.target());
    Ok(())
}
