//! Fetch backend seam: the blocking service a worker slot drives for one task.
//!
//! The backend owns network retrieval, format negotiation and muxing; the
//! slot only sees progress callbacks and a final outcome.

mod progress;
mod ytdlp;

pub use progress::{parse_line, BackendLine};
pub use ytdlp::{format_selector, YtDlpBackend};

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::control::CancelToken;
use crate::task::{DownloadRequest, TaskId};

/// Everything the backend needs for one run of a task.
#[derive(Debug, Clone)]
pub struct FetchJob {
    pub task_id: TaskId,
    pub request: DownloadRequest,
    /// Directory the backend writes into before the file is moved to the
    /// download folder.
    pub staging_dir: PathBuf,
    /// Polled by backends between progress lines, so cancel also works while
    /// the backend is silent.
    pub cancel: CancelToken,
}

/// Progress reported by a backend while it runs.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchProgress {
    /// Media title, once known.
    Title(String),
    Bytes {
        downloaded: u64,
        total: Option<u64>,
    },
    /// Download done; backend is finalizing (merge, transcode).
    Finished,
    /// A transient failure; the backend will try again after `delay`.
    Retrying { attempt: u32, delay: Duration },
}

impl FetchProgress {
    /// Percent for a byte report, if the total is known.
    pub fn percent(&self) -> Option<f64> {
        match self {
            FetchProgress::Bytes {
                downloaded,
                total: Some(total),
            } if *total > 0 => Some((*downloaded as f64 / *total as f64 * 100.0).clamp(0.0, 100.0)),
            _ => None,
        }
    }
}

/// Returned from the progress callback; `Abort` asks the backend to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Abort,
}

/// A finished backend run.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    /// Where the artifact is expected to appear. The slot waits for it.
    pub output: PathBuf,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The backend could not be started at all.
    #[error("fetch backend unavailable: {0}")]
    Unavailable(String),
    /// Network or extraction hiccup; retried inside the backend.
    #[error("transient fetch error: {0}")]
    Transient(String),
    #[error("{0}")]
    Failed(String),
    /// Stopped because the progress callback returned `Flow::Abort`.
    #[error("fetch aborted")]
    Aborted,
}

/// A blocking fetch backend. Called from worker slot threads, never from the
/// scheduler's lock.
pub trait FetchService: Send + Sync {
    fn fetch(
        &self,
        job: &FetchJob,
        on_progress: &mut dyn FnMut(FetchProgress) -> Flow,
    ) -> Result<FetchOutcome, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_needs_known_total() {
        let p = FetchProgress::Bytes {
            downloaded: 50,
            total: Some(200),
        };
        assert_eq!(p.percent(), Some(25.0));
        let p = FetchProgress::Bytes {
            downloaded: 50,
            total: None,
        };
        assert_eq!(p.percent(), None);
        let p = FetchProgress::Bytes {
            downloaded: 50,
            total: Some(0),
        };
        assert_eq!(p.percent(), None);
        assert_eq!(FetchProgress::Finished.percent(), None);
    }

    #[test]
    fn percent_is_clamped() {
        let p = FetchProgress::Bytes {
            downloaded: 300,
            total: Some(200),
        };
        assert_eq!(p.percent(), Some(100.0));
    }
}
