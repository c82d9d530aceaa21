//! Download task model: request parameters, priority, run-time status.
//!
//! A task keeps its identity for its whole life; a retry starts a new run of
//! the same task (progress and cancel flag cleared, status back to Queued).

mod request;
mod status;

pub use request::{DownloadRequest, MediaFormat, Priority, Resolution};
pub use status::{StatusKind, TaskStatus};

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::SystemTime;

/// Task identifier. The CLI uses history database row ids; library callers
/// can let `TaskId::generate` hand out process-unique ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

static NEXT_TASK_ID: AtomicI64 = AtomicI64::new(1);

impl TaskId {
    /// Next id from a process-wide monotonic counter.
    pub fn generate() -> Self {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(TaskId)
    }
}

/// One requested download, as handed to the scheduler.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub id: TaskId,
    pub request: DownloadRequest,
    /// Wall-clock creation time, for display only; ordering uses the
    /// scheduler's submission sequence.
    pub created_at: SystemTime,
}

impl DownloadTask {
    /// New task with a generated id.
    pub fn new(request: DownloadRequest) -> Self {
        Self::with_id(TaskId::generate(), request)
    }

    /// New task with a caller-chosen id (e.g. a history row id).
    pub fn with_id(id: TaskId, request: DownloadRequest) -> Self {
        Self {
            id,
            request,
            created_at: SystemTime::now(),
        }
    }
}

/// Read-only view of a tracked task.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub request: DownloadRequest,
    pub priority: Priority,
    pub status: TaskStatus,
    /// Percent in [0, 100].
    pub progress: f64,
    pub title: Option<String>,
    /// 1 for the first run, incremented on each retry.
    pub run: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_increasing() {
        let a = TaskId::generate();
        let b = TaskId::generate();
        assert!(b > a);
    }

    #[test]
    fn task_id_parse_and_display() {
        let id: TaskId = " 42 ".parse().unwrap();
        assert_eq!(id, TaskId(42));
        assert_eq!(id.to_string(), "42");
        assert!("abc".parse::<TaskId>().is_err());
    }
}
