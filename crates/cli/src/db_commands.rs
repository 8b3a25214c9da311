use std::path::{Path, PathBuf};

use {
    clap::Subcommand,
    pelangi_auto_reply::Orchestrator,
    pelangi_common::{ConversationKey, OutboundAction},
    pelangi_config::{PelangiConfig, SessionBackend},
};

#[derive(Subcommand)]
pub enum DbAction {
    /// Show one conversation record and its archived workflows.
    Show {
        key: String,
        /// How many archived instances to list.
        #[arg(long, default_value_t = 5)]
        archived: usize,
    },
    /// Forget one conversation.
    Clear { key: String },
    /// Re-run messages held after a processing timeout.
    Retry,
    /// Delete the SQLite session database completely.
    Reset,
}

pub async fn handle_db(action: DbAction, config: &PelangiConfig) -> anyhow::Result<()> {
    match action {
        DbAction::Show { key, archived } => show(config, &key, archived).await,
        DbAction::Clear { key } => clear(config, &key).await,
        DbAction::Retry => retry(config).await,
        DbAction::Reset => reset_database(&db_path(config)),
    }
}

/// Returns the SQLite database path the session store opens.
fn db_path(config: &PelangiConfig) -> PathBuf {
    config
        .sessions
        .path
        .clone()
        .unwrap_or_else(|| pelangi_config::data_dir().join("sessions.db"))
}

async fn show(config: &PelangiConfig, key: &str, limit: usize) -> anyhow::Result<()> {
    let store = pelangi_sessions::open_store(&config.sessions).await?;
    let key = ConversationKey::new(key);

    match store.load(&key).await? {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => println!("No conversation stored for {key}."),
    }

    let archived = store.archived(&key, limit).await?;
    if !archived.is_empty() {
        println!("\nArchived workflows (newest first):");
    }
    for instance in archived {
        let error = instance
            .error
            .as_deref()
            .map(|e| format!(" ({e})"))
            .unwrap_or_default();
        println!(
            "  {} v{}  {}  {} steps  {}{error}",
            instance.workflow_id,
            instance.workflow_version,
            instance.status.as_str(),
            instance.step_count,
            instance.updated_at.to_rfc3339(),
        );
    }
    Ok(())
}

async fn clear(config: &PelangiConfig, key: &str) -> anyhow::Result<()> {
    let store = pelangi_sessions::open_store(&config.sessions).await?;
    let key = ConversationKey::new(key);
    if store.delete(&key).await? {
        println!("Cleared {key}.");
    } else {
        println!("No conversation stored for {key}.");
    }
    Ok(())
}

async fn retry(config: &PelangiConfig) -> anyhow::Result<()> {
    if config.sessions.backend == SessionBackend::Memory {
        println!("The in-memory store holds nothing between runs.");
        return Ok(());
    }
    let orchestrator = Orchestrator::from_config(config.clone()).await?;
    let retried = orchestrator.sweep_retries().await?;
    if retried.is_empty() {
        println!("No held messages.");
    }
    for (key, actions) in retried {
        println!("{key}:");
        for action in actions {
            match action {
                OutboundAction::SendMessage { text, .. } => println!("  → guest: {text}"),
                OutboundAction::NotifyStaff { recipient, text } => {
                    println!("  → staff {recipient}: {text}");
                },
            }
        }
    }
    Ok(())
}

/// Delete the database file along with the WAL and SHM files SQLite may
/// have created.
fn reset_database(db: &Path) -> anyhow::Result<()> {
    let mut deleted = false;
    for path in sqlite_files(db) {
        if path.exists() {
            std::fs::remove_file(&path)?;
            println!("Deleted: {}", path.display());
            deleted = true;
        }
    }

    if deleted {
        println!("Session database deleted. It is recreated on the next run.");
    } else {
        println!("No database files found.");
    }
    Ok(())
}

fn sqlite_files(db: &Path) -> [PathBuf; 3] {
    let with_suffix = |suffix: &str| {
        let mut name = db.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    };
    [db.to_path_buf(), with_suffix("-wal"), with_suffix("-shm")]
}
