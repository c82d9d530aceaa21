//! Task read operations: list and get.

use anyhow::{anyhow, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::path::PathBuf;

use super::super::db::HistoryDb;
use super::super::types::HistoryRow;
use crate::task::{DownloadRequest, Priority, StatusKind, TaskId};

const COLUMNS: &str = "id, url, format, resolution, priority, status, reason, progress, \
                       title, result_path, created_at, updated_at";

impl HistoryDb {
    /// All tasks, oldest first.
    pub async fn list_tasks(&self) -> Result<Vec<HistoryRow>> {
        let rows = sqlx::query(&format!("SELECT {COLUMNS} FROM tasks ORDER BY id ASC"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_history).collect()
    }

    /// Queued tasks in admission order: priority rank, then id.
    pub async fn list_queued(&self) -> Result<Vec<HistoryRow>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM tasks WHERE status = 'queued' ORDER BY priority ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_history).collect()
    }

    pub async fn get_task(&self, id: TaskId) -> Result<Option<HistoryRow>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM tasks WHERE id = ?1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_history).transpose()
    }
}

fn row_to_history(row: &SqliteRow) -> Result<HistoryRow> {
    let id: i64 = row.get("id");
    let url: String = row.get("url");
    let format: String = row.get("format");
    let resolution: String = row.get("resolution");
    let priority: i64 = row.get("priority");
    let status: String = row.get("status");
    let result_path: Option<String> = row.get("result_path");

    let request = DownloadRequest::new(
        url,
        format.parse().map_err(|e: String| anyhow!("task {id}: {e}"))?,
        resolution.parse().map_err(|e: String| anyhow!("task {id}: {e}"))?,
    );
    Ok(HistoryRow {
        id: TaskId(id),
        request,
        priority: Priority::from_rank(priority)
            .ok_or_else(|| anyhow!("task {id}: bad priority rank {priority}"))?,
        status: StatusKind::from_str(&status),
        reason: row.get("reason"),
        progress: row.get("progress"),
        title: row.get("title"),
        result_path: result_path.map(PathBuf::from),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
