use std::path::{Path, PathBuf};

use {anyhow::Result, clap::Subcommand};

use pelangi_config::validate::{self, Severity};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
    /// Write the default configuration file.
    Init {
        /// Destination (defaults to pelangi.toml in the config dir).
        path: Option<PathBuf>,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration as JSON.
    Show,
}

pub fn handle_config(action: ConfigAction, config: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Check { verbose } => check(config, verbose),
        ConfigAction::Init { path, force } => init(path, force),
        ConfigAction::Show => show(config),
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn check(config: Option<&Path>, verbose: bool) -> Result<()> {
    let result = validate::validate(config);

    if let Some(ref path) = result.config_path {
        eprintln!("Checking {}\n", path.display());
    } else {
        eprintln!("No config file found; checking defaults.\n");
    }

    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }

        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
            Severity::Info => (CYAN, "info"),
        };

        if d.path.is_empty() {
            eprintln!("  {BOLD}{color}{label}{RESET} [{}] {}", d.category, d.message);
        } else {
            eprintln!(
                "  {BOLD}{color}{label}{RESET} [{}] {}: {}",
                d.category, d.path, d.message
            );
        }
        shown += 1;
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);

    if shown > 0 {
        eprintln!();
    }

    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn init(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => pelangi_config::config_dir()
            .ok_or_else(|| anyhow::anyhow!("no config directory; pass a path"))?
            .join("pelangi.toml"),
    };
    pelangi_config::write_default_config(&path, force)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn show(config: Option<&Path>) -> Result<()> {
    let loaded = match config {
        Some(path) => pelangi_config::load_config(path)?,
        None => pelangi_config::discover_and_load()?,
    };
    if let Some(ref path) = loaded.path {
        eprintln!("# {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(&loaded.config)?);
    Ok(())
}
