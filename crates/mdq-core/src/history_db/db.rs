//! Pool setup and schema. Row reads/writes live in `tasks`.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    format TEXT NOT NULL,
    resolution TEXT NOT NULL,
    priority INTEGER NOT NULL,
    status TEXT NOT NULL,
    reason TEXT,
    progress REAL NOT NULL DEFAULT 0,
    title TEXT,
    result_path TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS tasks_status_priority ON tasks (status, priority, id);
"#;

/// Task history shared by the CLI commands and the `run` loop.
///
/// Lives at `$XDG_STATE_HOME/mdq/history.db` unless opened elsewhere.
#[derive(Clone)]
pub struct HistoryDb {
    pub(crate) pool: Pool<Sqlite>,
}

impl HistoryDb {
    pub async fn open_default() -> Result<Self> {
        let state = xdg::BaseDirectories::with_prefix("mdq")?;
        Self::open_at(state.get_state_home().join("history.db")).await
    }

    /// Opens `path`, creating the file and its parent directory on first use.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("open history db {}", path.display()))?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: Pool<Sqlite>) -> Result<Self> {
        // `priority` stores the rank (1 = high) so queued rows sort in SQL.
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .context("migrate history db")?;
        Ok(HistoryDb { pool })
    }
}

pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
pub(crate) async fn open_memory() -> Result<HistoryDb> {
    // One connection: every new in-memory connection is a fresh empty db.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    HistoryDb::from_pool(pool).await
}
