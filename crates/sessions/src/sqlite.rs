//! SQLite-backed store using sqlx. Records are kept as JSON documents.

use std::time::Duration;

use {
    async_trait::async_trait,
    chrono::Utc,
    sqlx::{Row, SqlitePool, sqlite::SqlitePoolOptions},
};

use {pelangi_common::ConversationKey, pelangi_workflow::WorkflowInstance};

use crate::{
    Result,
    record::ConversationRecord,
    store::ConversationStore,
};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `database_url` and run migrations.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode = WAL")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA busy_timeout = 5000")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;

        crate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Use an existing pool; [`crate::run_migrations`] must already have run.
    #[must_use]
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn load(&self, key: &ConversationKey) -> Result<Option<ConversationRecord>> {
        let data = sqlx::query_scalar::<_, String>(
            "SELECT data FROM conversations WHERE conversation_key = ?",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(data
            .map(|d| serde_json::from_str::<ConversationRecord>(&d))
            .transpose()?)
    }

    async fn save(&self, record: &ConversationRecord) -> Result<()> {
        let data = serde_json::to_string(record)?;
        sqlx::query(
            "INSERT INTO conversations (conversation_key, data, pending_retry, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(conversation_key) DO UPDATE SET
               data = excluded.data,
               pending_retry = excluded.pending_retry,
               updated_at = excluded.updated_at",
        )
        .bind(record.key.as_str())
        .bind(&data)
        .bind(record.pending_retry.is_some())
        .bind(record.updated_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &ConversationKey) -> Result<bool> {
        sqlx::query("DELETE FROM workflow_archive WHERE conversation_key = ?")
            .bind(key.as_str())
            .execute(&self.pool)
            .await?;
        let result = sqlx::query("DELETE FROM conversations WHERE conversation_key = ?")
            .bind(key.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn archive(&self, instance: &WorkflowInstance) -> Result<()> {
        let data = serde_json::to_string(instance)?;
        sqlx::query(
            "INSERT INTO workflow_archive (conversation_key, workflow_id, status, data, archived_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(instance.conversation_key.as_str())
        .bind(&instance.workflow_id)
        .bind(instance.status.as_str())
        .bind(&data)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn archived(&self, key: &ConversationKey, limit: usize) -> Result<Vec<WorkflowInstance>> {
        let rows = sqlx::query(
            "SELECT data FROM workflow_archive
             WHERE conversation_key = ?
             ORDER BY id DESC
             LIMIT ?",
        )
        .bind(key.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut instances = Vec::with_capacity(rows.len());
        for row in rows {
            let data: String = row.get("data");
            instances.push(serde_json::from_str(&data)?);
        }
        Ok(instances)
    }

    async fn pending_retries(&self) -> Result<Vec<ConversationKey>> {
        let keys = sqlx::query_scalar::<_, String>(
            "SELECT conversation_key FROM conversations
             WHERE pending_retry = 1
             ORDER BY conversation_key",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(keys.into_iter().map(ConversationKey::from).collect())
    }
}
