//! Row type returned by history queries.

use serde::Serialize;
use std::path::PathBuf;

use crate::task::{DownloadRequest, DownloadTask, Priority, StatusKind, TaskId, TaskStatus};

/// One task as last recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    pub id: TaskId,
    pub request: DownloadRequest,
    pub priority: Priority,
    pub status: StatusKind,
    pub reason: Option<String>,
    pub progress: f64,
    pub title: Option<String>,
    pub result_path: Option<PathBuf>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl HistoryRow {
    /// Full status, rebuilt from the stored kind and payload columns.
    pub fn task_status(&self) -> TaskStatus {
        match self.status {
            StatusKind::Queued => TaskStatus::Queued,
            StatusKind::Downloading => TaskStatus::Downloading,
            StatusKind::Processing => TaskStatus::Processing,
            StatusKind::Completed => TaskStatus::Completed {
                path: self.result_path.clone().unwrap_or_default(),
            },
            StatusKind::Failed => {
                TaskStatus::failed(self.reason.clone().unwrap_or_else(|| "unknown error".to_string()))
            }
            StatusKind::Cancelled => TaskStatus::Cancelled,
        }
    }

    /// Task for the scheduler, keeping the row id as task id.
    pub fn to_task(&self) -> DownloadTask {
        DownloadTask::with_id(self.id, self.request.clone())
    }
}
