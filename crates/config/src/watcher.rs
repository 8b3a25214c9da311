//! Filesystem watcher for the config file and workflow directory.
//!
//! Sends a notification through a channel whenever the config file or a
//! workflow document changes so the runtime can reload its snapshot.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use {
    notify_debouncer_full::{
        DebounceEventResult, Debouncer, RecommendedCache, new_debouncer,
        notify::{EventKind, RecommendedWatcher, RecursiveMode},
    },
    tokio::sync::mpsc,
    tracing::{debug, info, warn},
};

use crate::{Context, Result};

const WORKFLOW_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Events emitted by the config watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWatchEvent {
    /// The config file or a workflow definition was created, modified, or deleted.
    Changed { path: PathBuf },
}

/// Watches the config file (and optional workflows directory) with debouncing.
pub struct ConfigWatcher {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

impl ConfigWatcher {
    /// Start watching. Returns the watcher and a receiver for events.
    ///
    /// The watcher must be kept alive (not dropped) for events to continue.
    pub fn start(
        config_file: &Path,
        workflows_dir: Option<&Path>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ConfigWatchEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();

        let config_name = config_file.file_name().map(ToOwned::to_owned);
        let workflows_root = workflows_dir.map(Path::to_path_buf);

        let debouncer = new_debouncer(
            Duration::from_millis(500),
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    let mut changed: Option<PathBuf> = None;
                    for event in events {
                        if !matches!(
                            event.kind,
                            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                        ) {
                            continue;
                        }
                        for path in &event.paths {
                            let is_config =
                                config_name.is_some() && path.file_name() == config_name.as_deref();
                            let is_workflow = workflows_root
                                .as_ref()
                                .is_some_and(|root| path.starts_with(root))
                                && path
                                    .extension()
                                    .and_then(|e| e.to_str())
                                    .is_some_and(|e| WORKFLOW_EXTENSIONS.contains(&e));
                            if is_config || is_workflow {
                                debug!(path = %path.display(), "config watcher event");
                                changed = Some(path.clone());
                            }
                        }
                    }
                    if let Some(path) = changed {
                        let _ = tx.send(ConfigWatchEvent::Changed { path });
                    }
                },
                Err(errors) => {
                    for e in errors {
                        warn!(error = %e, "config watcher error");
                    }
                },
            },
        )
        .context("failed to start config watcher")?;

        let mut watcher = Self {
            _debouncer: debouncer,
        };

        // Watch the parent: editors replace the file on save.
        let parent = config_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        watcher
            ._debouncer
            .watch(parent, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", parent.display()))?;
        info!(path = %config_file.display(), "config watcher: watching config file");

        if let Some(dir) = workflows_dir
            && dir.exists()
        {
            watcher
                ._debouncer
                .watch(dir, RecursiveMode::Recursive)
                .with_context(|| format!("failed to watch {}", dir.display()))?;
            info!(dir = %dir.display(), "config watcher: watching workflows directory");
        }

        Ok((watcher, rx))
    }
}
