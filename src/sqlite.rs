//! SQLite-backed session store.
//!
//! This module is only available when the `sqlite` feature is enabled.
//! Sessions and messages survive restarts; deleting a session cascades
//! to its messages via a foreign key.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::error::{RagError, Result};
use crate::memory::{Message, Role, SessionStore, SessionSummary};

/// A [`SessionStore`] backed by SQLite via `sqlx`.
///
/// Uses WAL journaling for concurrent reads alongside writes. Message
/// ordering is the rowid insertion order, which keeps window pairing
/// well-defined as long as each session's turns are appended in
/// conversational order.
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Open (or create) the database at `path` and run the schema setup.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| RagError::Session(format!("failed to open session database: {e}")))?;

        let store = Self { pool };
        store.init_schema().await?;
        info!(path = %path.as_ref().display(), "session database ready");
        Ok(store)
    }

    /// Build a store from an existing pool (tests, shared pools).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id  TEXT PRIMARY KEY,
                title       TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id  TEXT NOT NULL REFERENCES sessions(session_id) ON DELETE CASCADE,
                role        TEXT NOT NULL,
                content     TEXT NOT NULL,
                timestamp   TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_session
                ON messages(session_id);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RagError::Session(format!("failed to create schema: {e}")))?;
        Ok(())
    }

    async fn ensure_session(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        session_id: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO sessions (session_id, title, created_at) VALUES (?, NULL, ?)",
        )
        .bind(session_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut **tx)
        .await
        .map_err(|e| RagError::Session(format!("failed to create session row: {e}")))?;
        Ok(())
    }
}

fn map_err(e: sqlx::Error) -> RagError {
    RagError::Session(e.to_string())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RagError::Session(format!("invalid timestamp '{raw}': {e}")))
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create_session(&self, session_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;
        self.ensure_session(&mut tx, session_id).await?;
        tx.commit().await.map_err(map_err)?;
        Ok(())
    }

    async fn append_message(&self, session_id: &str, role: Role, content: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;
        self.ensure_session(&mut tx, session_id).await?;

        if role == Role::User {
            let title: String = content.chars().take(80).collect();
            sqlx::query("UPDATE sessions SET title = ? WHERE session_id = ? AND title IS NULL")
                .bind(title)
                .bind(session_id)
                .execute(&mut *tx)
                .await
                .map_err(map_err)?;
        }

        sqlx::query(
            "INSERT INTO messages (session_id, role, content, timestamp) VALUES (?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(role.as_str())
        .bind(content)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(map_err)?;

        tx.commit().await.map_err(map_err)?;
        Ok(())
    }

    async fn history(&self, session_id: &str) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT role, content, timestamp FROM messages WHERE session_id = ? ORDER BY id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        rows.into_iter()
            .map(|row| {
                let role: String = row.try_get("role").map_err(map_err)?;
                let content: String = row.try_get("content").map_err(map_err)?;
                let timestamp: String = row.try_get("timestamp").map_err(map_err)?;
                Ok(Message {
                    session_id: session_id.to_string(),
                    role: Role::from_str(&role)?,
                    content,
                    timestamp: parse_timestamp(&timestamp)?,
                })
            })
            .collect()
    }

    async fn sessions(&self) -> Result<Vec<SessionSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT s.session_id,
                   COALESCE(s.title, 'New Chat') AS title,
                   s.created_at,
                   COUNT(m.id) AS message_count
            FROM sessions s
            LEFT JOIN messages m ON m.session_id = s.session_id
            GROUP BY s.session_id
            ORDER BY s.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        rows.into_iter()
            .map(|row| {
                let session_id: String = row.try_get("session_id").map_err(map_err)?;
                let title: String = row.try_get("title").map_err(map_err)?;
                let created_at: String = row.try_get("created_at").map_err(map_err)?;
                let message_count: i64 = row.try_get("message_count").map_err(map_err)?;
                Ok(SessionSummary {
                    session_id,
                    title,
                    created_at: parse_timestamp(&created_at)?,
                    message_count: message_count as usize,
                })
            })
            .collect()
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }
}
