//! Per-conversation state: the active workflow instance, language, recent
//! history, the duplicate-delivery window and any pending retry. Finished
//! instances are archived.

pub mod error;
pub mod memory;
pub mod record;
pub mod sqlite;
pub mod store;

use std::sync::Arc;

use {
    pelangi_config::{SessionBackend, SessionsConfig},
    tracing::info,
};

use crate::error::Context;

pub use {
    error::{Error, Result},
    memory::MemoryStore,
    record::{ConversationRecord, PendingRetry},
    sqlite::SqliteStore,
    store::ConversationStore,
};

/// Run database migrations for the sessions crate.
///
/// Creates the `conversations` and `workflow_archive` tables.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}

/// Open the configured backend. SQLite defaults to `sessions.db` in the
/// data dir.
pub async fn open_store(config: &SessionsConfig) -> Result<Arc<dyn ConversationStore>> {
    match config.backend {
        SessionBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        SessionBackend::Sqlite => {
            let path = config
                .path
                .clone()
                .unwrap_or_else(|| pelangi_config::data_dir().join("sessions.db"));
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            info!(path = %path.display(), "opening SQLite session store");
            let url = format!("sqlite:{}?mode=rwc", path.display());
            Ok(Arc::new(SqliteStore::new(&url).await?))
        },
    }
}
