//! SQLite record store

use super::{RecordStore, SessionRecord};
use crate::{SessionError, SessionResult};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;

/// Record store backed by a `sessions` table
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Connect to `database_url` and create the schema if needed
    ///
    /// Accepts `sqlite:path/to/file.db` and `sqlite::memory:`.
    pub async fn connect(database_url: &str) -> SessionResult<Self> {
        tracing::info!("🔗 Connecting session store: {}", database_url);

        let pool = if database_url.contains(":memory:") {
            // Every connection to :memory: opens a separate database
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect(database_url)
                .await
                .map_err(|e| {
                    tracing::error!("❌ Session store connection failed: {}", e);
                    SessionError::storage_with_source("Failed to open in-memory database", e)
                })?
        } else {
            let db_path = database_url
                .strip_prefix("sqlite://")
                .or_else(|| database_url.strip_prefix("sqlite:"))
                .unwrap_or(database_url);

            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    tracing::info!("📁 Creating parent directory: {}", parent.display());
                    std::fs::create_dir_all(parent).map_err(|e| {
                        SessionError::storage_with_source(
                            format!("Failed to create directory {}", parent.display()),
                            e,
                        )
                    })?;
                }
            }

            let options = SqliteConnectOptions::new()
                .filename(db_path)
                .create_if_missing(true);

            SqlitePool::connect_with(options).await.map_err(|e| {
                tracing::error!("❌ Session store connection failed: {}", e);
                SessionError::storage_with_source(
                    format!("Failed to connect to database {}", database_url),
                    e,
                )
            })?
        };

        let store = Self { pool };
        store.create_tables().await?;
        tracing::debug!("✅ Session store ready");

        Ok(store)
    }

    /// Fresh private in-memory database
    pub async fn in_memory() -> SessionResult<Self> {
        Self::connect("sqlite::memory:").await
    }

    /// Wrap an existing pool; the caller is responsible for the schema
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn create_tables(&self) -> SessionResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                created INTEGER NOT NULL,
                max_age INTEGER NOT NULL,
                expires INTEGER NOT NULL,
                updated INTEGER NOT NULL,
                data TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("❌ Failed to create sessions table: {}", e);
            SessionError::storage_with_source("Failed to create sessions table", e)
        })?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_updated ON sessions(updated)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn get(&self, id: &str) -> SessionResult<Option<SessionRecord>> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, created, max_age, expires, updated, data FROM sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert(&self, record: &SessionRecord) -> SessionResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, created, max_age, expires, updated, data)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET data = excluded.data, updated = excluded.updated
            "#,
        )
        .bind(&record.id)
        .bind(record.created)
        .bind(record.max_age)
        .bind(record.expires)
        .bind(record.updated)
        .bind(&record.data)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_data(&self, id: &str, data: &str, updated: i64) -> SessionResult<bool> {
        let result = sqlx::query("UPDATE sessions SET data = ?, updated = ? WHERE id = ?")
            .bind(data)
            .bind(updated)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: &str) -> SessionResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired(&self, now: i64) -> SessionResult<u64> {
        // Matches SessionRecord::is_stale_at
        let result = sqlx::query("DELETE FROM sessions WHERE updated < ? - max_age")
            .bind(now)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            tracing::info!("🧹 Purged {} expired sessions", result.rows_affected());
        }
        Ok(result.rows_affected())
    }

    async fn count(&self) -> SessionResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }
}
