use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::{debug, info, warn};

use crate::{
    Error, Result,
    env_subst::substitute_env,
    schema::PelangiConfig,
    template::DEFAULT_CONFIG_TEMPLATE,
    validate::{self, Diagnostic, Severity},
    workflow::WorkflowDefinition,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "pelangi.toml",
    "pelangi.yaml",
    "pelangi.yml",
    "pelangi.json",
];

/// Environment variable overriding the user-global config directory.
pub const CONFIG_DIR_ENV: &str = "PELANGI_CONFIG_DIR";

/// Override for the config directory, set via `set_config_dir()`.
static CONFIG_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Set a custom config directory (tests, `--config-dir`).
pub fn set_config_dir(path: PathBuf) {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|e| e.into_inner()) = Some(path);
}

/// Clear the config directory override.
pub fn clear_config_dir() {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|e| e.into_inner()) = None;
}

/// A parsed, validated configuration together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: PelangiConfig,
    /// `None` when the built-in default configuration was used.
    pub path: Option<PathBuf>,
    /// Warnings and info diagnostics (errors reject the load).
    pub diagnostics: Vec<Diagnostic>,
}

/// Load and validate config from the given path (any supported format).
///
/// Rejects the config if validation finds any error.
pub fn load_config(path: &Path) -> Result<LoadedConfig> {
    let (config, diagnostics) = read_and_build(path)?;
    finish(config, Some(path.to_path_buf()), diagnostics)
}

/// Load and validate config from a string in the given format
/// (`toml`, `yaml`, `yml` or `json`).
pub fn load_config_str(raw: &str, format: &str) -> Result<LoadedConfig> {
    let source = PathBuf::from(format!("<inline>.{format}"));
    let value = parse_value(&substitute_env(raw), &source)?;
    let mut diagnostics = validate::check_unknown_fields(&value);
    let config = deserialize(value, &source)?;
    diagnostics.extend(validate::validate_config(&config).diagnostics);
    finish(config, None, diagnostics)
}

/// The built-in default configuration (the same document `pelangi init` writes).
pub fn default_config() -> Result<LoadedConfig> {
    load_config_str(DEFAULT_CONFIG_TEMPLATE, "toml")
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./pelangi.{toml,yaml,yml,json}` (project-local)
/// 2. `$PELANGI_CONFIG_DIR` or the user config dir (e.g. `~/.config/pelangi/`)
///
/// Falls back to the built-in default configuration if no file is found.
pub fn discover_and_load() -> Result<LoadedConfig> {
    match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path)
        },
        None => {
            info!("no config file found, using built-in defaults");
            default_config()
        },
    }
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(global).find(|p| p.exists())
}

/// Returns the user-global config directory.
///
/// Priority: `set_config_dir()` override, `PELANGI_CONFIG_DIR`, then the
/// platform config dir (`~/.config/pelangi/` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
    {
        return Some(dir);
    }
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    directories::ProjectDirs::from("", "", "pelangi").map(|d| d.config_dir().to_path_buf())
}

/// Returns the data directory (SQLite sessions database default location).
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "pelangi")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Write the default configuration to `path`.
///
/// Refuses to overwrite an existing file unless `force` is set.
pub fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::message(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
    debug!(path = %path.display(), "wrote default config");
    Ok(())
}

// ── Internals ───────────────────────────────────────────────────────────────

/// Read, substitute, parse and deserialize a config file, including its
/// `workflows_dir`. Returns the unknown-field diagnostics found on the way;
/// semantic validation is left to the caller.
pub(crate) fn read_and_build(path: &Path) -> Result<(PelangiConfig, Vec<Diagnostic>)> {
    let value = read_document(path)?;
    let mut diagnostics = validate::check_unknown_fields(&value);
    let mut config = deserialize(value, path)?;

    if let Some(dir) = config.workflows_dir.clone() {
        let dir = if dir.is_relative() {
            path.parent().unwrap_or_else(|| Path::new(".")).join(dir)
        } else {
            dir
        };
        let (workflows, mut found) = load_workflows_dir(&dir)?;
        diagnostics.append(&mut found);
        config.workflows.extend(workflows);
    }

    Ok((config, diagnostics))
}

/// Load every `*.toml|yaml|yml|json` file in `dir` as one workflow definition.
fn load_workflows_dir(dir: &Path) -> Result<(Vec<WorkflowDefinition>, Vec<Diagnostic>)> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|source| Error::Read {
            path: dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| matches!(e, "toml" | "yaml" | "yml" | "json"))
        })
        .collect();
    paths.sort();

    let mut workflows = Vec::with_capacity(paths.len());
    let mut diagnostics = Vec::new();
    for path in paths {
        let value = read_document(&path)?;
        let prefix = format!(
            "workflows_dir/{}",
            path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
        );
        diagnostics.extend(validate::check_unknown_workflow_fields(&value, &prefix));
        let def: WorkflowDefinition =
            serde_json::from_value(value).map_err(|e| Error::parse(&path, e))?;
        debug!(workflow = %def.id, path = %path.display(), "loaded workflow definition");
        workflows.push(def);
    }
    Ok((workflows, diagnostics))
}

fn read_document(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_value(&substitute_env(&raw), path)
}

fn parse_value(raw: &str, path: &Path) -> Result<serde_json::Value> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => {
            let v: toml::Value = toml::from_str(raw).map_err(|e| Error::parse(path, e))?;
            serde_json::to_value(v).map_err(|e| Error::parse(path, e))
        },
        "yaml" | "yml" => {
            let v: serde_yaml::Value =
                serde_yaml::from_str(raw).map_err(|e| Error::parse(path, e))?;
            serde_json::to_value(v).map_err(|e| Error::parse(path, e))
        },
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse(path, e)),
        other => Err(Error::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}

fn deserialize(value: serde_json::Value, path: &Path) -> Result<PelangiConfig> {
    serde_json::from_value(value).map_err(|e| Error::parse(path, e))
}

fn finish(
    config: PelangiConfig,
    path: Option<PathBuf>,
    diagnostics: Vec<Diagnostic>,
) -> Result<LoadedConfig> {
    let errors: Vec<String> = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .map(ToString::to_string)
        .collect();
    if !errors.is_empty() {
        return Err(Error::Invalid { errors });
    }
    for d in diagnostics.iter().filter(|d| d.severity == Severity::Warning) {
        warn!(path = %d.path, category = d.category, "{}", d.message);
    }
    Ok(LoadedConfig {
        config,
        path,
        diagnostics,
    })
}
