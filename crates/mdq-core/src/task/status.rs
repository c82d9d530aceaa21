//! Task lifecycle status.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Status of a task's current run. Terminal variants carry their outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Downloading,
    /// Fetch finished; backend is finalizing (muxing, transcoding) or the
    /// output file is being collected.
    Processing,
    Completed { path: PathBuf },
    Failed { reason: String },
    Cancelled,
}

impl TaskStatus {
    pub fn failed(reason: impl Into<String>) -> Self {
        TaskStatus::Failed {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> StatusKind {
        match self {
            TaskStatus::Queued => StatusKind::Queued,
            TaskStatus::Downloading => StatusKind::Downloading,
            TaskStatus::Processing => StatusKind::Processing,
            TaskStatus::Completed { .. } => StatusKind::Completed,
            TaskStatus::Failed { .. } => StatusKind::Failed,
            TaskStatus::Cancelled => StatusKind::Cancelled,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }

    /// Downloading or Processing: the task holds a slot.
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Downloading | TaskStatus::Processing)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            TaskStatus::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn result_path(&self) -> Option<&PathBuf> {
        match self {
            TaskStatus::Completed { path } => Some(path),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Failed { reason } => write!(f, "failed: {reason}"),
            other => f.write_str(other.kind().as_str()),
        }
    }
}

/// Status without payload; stored as a string in the history database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Queued,
    Downloading,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl StatusKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusKind::Queued => "queued",
            StatusKind::Downloading => "downloading",
            StatusKind::Processing => "processing",
            StatusKind::Completed => "completed",
            StatusKind::Failed => "failed",
            StatusKind::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "queued" => StatusKind::Queued,
            "downloading" => StatusKind::Downloading,
            "processing" => StatusKind::Processing,
            "completed" => StatusKind::Completed,
            "cancelled" => StatusKind::Cancelled,
            _ => StatusKind::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StatusKind::Completed | StatusKind::Failed | StatusKind::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_and_active() {
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(TaskStatus::Downloading.is_active());
        assert!(TaskStatus::Processing.is_active());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(TaskStatus::failed("x").is_terminal());
        assert!(!TaskStatus::failed("x").is_active());
    }

    #[test]
    fn kind_string_roundtrip() {
        for kind in [
            StatusKind::Queued,
            StatusKind::Downloading,
            StatusKind::Processing,
            StatusKind::Completed,
            StatusKind::Failed,
            StatusKind::Cancelled,
        ] {
            assert_eq!(StatusKind::from_str(kind.as_str()), kind);
        }
    }

    #[test]
    fn display_includes_reason() {
        assert_eq!(TaskStatus::failed("output missing").to_string(), "failed: output missing");
        assert_eq!(TaskStatus::Cancelled.to_string(), "cancelled");
    }
}
