//! Configuration loading, validation and env substitution.
//!
//! Config files: `pelangi.toml`, `pelangi.yaml`, `pelangi.yml` or `pelangi.json`,
//! searched in `./` then the user config dir (`$PELANGI_CONFIG_DIR` overrides).
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in the raw
//! document. Every load is validated; configs with errors are rejected.

pub mod builtin;
pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod template;
pub mod validate;
#[cfg(feature = "file-watcher")]
pub mod watcher;
pub mod workflow;

pub use {
    error::{Context, Error, Result},
    loader::{
        LoadedConfig, clear_config_dir, config_dir, data_dir, default_config, discover_and_load,
        find_config_file, load_config, load_config_str, set_config_dir, write_default_config,
    },
    schema::{
        ActionsConfig, ClassifierConfig, EmbeddingEntry, EmbeddingsConfig, EmergencyPattern,
        EmergencyTierConfig, FuzzyTierConfig, GenerativeTierConfig, MetricsConfig,
        OrchestratorConfig, PelangiConfig, ProviderEntry, ProviderKind, ProvidersConfig,
        RouteEntry, RoutingConfig, SemanticTierConfig, SessionBackend, SessionsConfig,
        StaffConfig, SystemConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult},
    workflow::{
        ConditionOperator, DefinitionError, LocalizedText, Node, Step, WorkflowDefinition,
        WorkflowFormat, WorkflowGraph,
    },
};
