//! Task write operations: add, event mirroring, state changes, remove.

use anyhow::Result;

use super::super::db::{unix_timestamp, HistoryDb};
use crate::events::TaskEvent;
use crate::scheduler::ClearMode;
use crate::task::{DownloadRequest, Priority, StatusKind, TaskId};

impl HistoryDb {
    /// Insert a new queued task. The row id becomes the task id.
    pub async fn add_task(&self, request: &DownloadRequest, priority: Priority) -> Result<TaskId> {
        let now = unix_timestamp();
        let row_id = sqlx::query(
            r#"
            INSERT INTO tasks (
                url, format, resolution, priority, status,
                reason, progress, title, result_path, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, 'queued',
                      NULL, 0, NULL, NULL, ?5, ?6)
            "#,
        )
        .bind(&request.url)
        .bind(request.format.as_str())
        .bind(request.resolution.as_str())
        .bind(i64::from(priority.rank()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(TaskId(row_id))
    }

    /// Mirrors one scheduler event into the task's row.
    pub async fn record_event(&self, ev: &TaskEvent) -> Result<()> {
        let now = unix_timestamp();
        let result_path = ev
            .status
            .result_path()
            .map(|p| p.to_string_lossy().into_owned());
        sqlx::query(
            r#"
            UPDATE tasks
            SET status = ?1,
                reason = ?2,
                progress = ?3,
                title = COALESCE(?4, title),
                result_path = ?5,
                updated_at = ?6
            WHERE id = ?7
            "#,
        )
        .bind(ev.status.kind().as_str())
        .bind(ev.status.reason())
        .bind(ev.progress)
        .bind(ev.title.as_deref())
        .bind(result_path)
        .bind(now)
        .bind(ev.task_id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_status(&self, id: TaskId, status: StatusKind) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            UPDATE tasks
            SET status = ?1,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(status.as_str())
        .bind(now)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Failed → queued with progress and reason cleared. Returns false if the
    /// task is missing or not failed.
    pub async fn requeue_failed(&self, id: TaskId) -> Result<bool> {
        let now = unix_timestamp();
        let res = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'queued',
                reason = NULL,
                progress = 0,
                result_path = NULL,
                updated_at = ?1
            WHERE id = ?2 AND status = 'failed'
            "#,
        )
        .bind(now)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() > 0)
    }

    /// Queued → cancelled (for tasks no scheduler is running yet).
    pub async fn cancel_queued(&self, id: TaskId) -> Result<bool> {
        let now = unix_timestamp();
        let res = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'cancelled',
                updated_at = ?1
            WHERE id = ?2 AND status = 'queued'
            "#,
        )
        .bind(now)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() > 0)
    }

    /// Rows left downloading/processing by an interrupted run go back to
    /// queued. Returns how many were reset.
    pub async fn recover_running(&self) -> Result<u64> {
        let now = unix_timestamp();
        let res = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'queued',
                progress = 0,
                updated_at = ?1
            WHERE status IN ('downloading', 'processing')
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected())
    }

    /// Deletes a finished task row. Returns false if it is missing or still
    /// queued/running.
    pub async fn remove_task(&self, id: TaskId) -> Result<bool> {
        let res = sqlx::query(
            r#"
            DELETE FROM tasks
            WHERE id = ?1 AND status IN ('completed', 'failed', 'cancelled')
            "#,
        )
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() > 0)
    }

    /// Deletes finished rows selected by `mode`. Returns the number removed.
    pub async fn clear_finished(&self, mode: ClearMode) -> Result<u64> {
        let sql = match mode {
            ClearMode::AllTerminal => {
                "DELETE FROM tasks WHERE status IN ('completed', 'failed', 'cancelled')"
            }
            ClearMode::KeepFailed => "DELETE FROM tasks WHERE status IN ('completed', 'cancelled')",
        };
        let res = sqlx::query(sql).execute(&self.pool).await?;
        Ok(res.rows_affected())
    }
}
