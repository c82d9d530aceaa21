//! Worker slot: runs one admitted task to a terminal state.
//!
//! The slot translates backend callbacks into task transitions, waits for the
//! output file, moves it into the download directory, and releases its slot
//! exactly once through `SlotGuard`, including when the backend panics.

use std::path::Path;
use std::sync::Arc;

use super::shared::{Admission, Shared};
use crate::control::CancelToken;
use crate::fetch::{FetchError, FetchJob, FetchOutcome, FetchProgress, Flow};
use crate::storage::{move_into_dir, wait_for_output, WaitOutcome};
use crate::task::{TaskId, TaskStatus};
use crate::url_model::sanitize_title;

/// Releases the slot on drop.
struct SlotGuard<'a> {
    shared: &'a Arc<Shared>,
    slot: usize,
    task_id: TaskId,
    run: u32,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.shared.release_slot(self.slot, self.task_id, self.run);
    }
}

/// Suppresses progress regressions (e.g. when video and audio streams are
/// downloaded one after the other).
#[derive(Debug, Default)]
pub(crate) struct ProgressGate {
    last: Option<f64>,
}

impl ProgressGate {
    /// Returns `true` if `percent` is above the last admitted value.
    pub(crate) fn admit(&mut self, percent: f64) -> bool {
        match self.last {
            Some(last) if percent <= last => false,
            _ => {
                self.last = Some(percent);
                true
            }
        }
    }
}

pub(crate) fn run(shared: Arc<Shared>, adm: Admission) {
    let Admission {
        slot,
        task_id,
        run,
        request,
        cancel,
    } = adm;
    let _guard = SlotGuard {
        shared: &shared,
        slot,
        task_id,
        run,
    };

    let job = FetchJob {
        task_id,
        request,
        staging_dir: shared.opts.staging_dir.clone(),
        cancel: cancel.clone(),
    };

    let mut gate = ProgressGate::default();
    let mut on_progress = |p: FetchProgress| {
        if cancel.is_requested() {
            return Flow::Abort;
        }
        match &p {
            FetchProgress::Title(t) => shared.report_title(task_id, run, t),
            FetchProgress::Bytes { .. } => {
                if let Some(pct) = p.percent() {
                    if gate.admit(pct) {
                        shared.report_progress(task_id, run, pct);
                    }
                }
            }
            FetchProgress::Finished => shared.enter_processing(task_id, run),
            FetchProgress::Retrying { attempt, delay } => shared.report_message(
                task_id,
                run,
                format!("transient failure, retrying (attempt {}) in {:.1}s", attempt + 1, delay.as_secs_f64()),
            ),
        }
        Flow::Continue
    };

    let result = shared.fetch.fetch(&job, &mut on_progress);
    let status = match result {
        Ok(outcome) => finalize(&shared, &job, run, &cancel, outcome),
        Err(_) if cancel.is_requested() => TaskStatus::Cancelled,
        Err(FetchError::Aborted) => TaskStatus::Cancelled,
        Err(e) => TaskStatus::failed(e.to_string()),
    };
    shared.finish(task_id, run, status);
}

/// Success path: Processing at 100%, bounded wait for the file, then move it
/// into the download directory.
fn finalize(
    shared: &Shared,
    job: &FetchJob,
    run: u32,
    cancel: &CancelToken,
    outcome: FetchOutcome,
) -> TaskStatus {
    let task_id = job.task_id;
    if let Some(title) = &outcome.title {
        shared.report_title(task_id, run, title);
    }
    shared.enter_processing(task_id, run);

    match wait_for_output(&outcome.output, &shared.opts.output_wait, cancel) {
        WaitOutcome::Cancelled => TaskStatus::Cancelled,
        WaitOutcome::Missing => {
            tracing::warn!(task_id = %task_id, expected = %outcome.output.display(), "output never appeared");
            TaskStatus::failed("output missing")
        }
        WaitOutcome::Found => {
            let name = destination_name(&outcome.output, job);
            match move_into_dir(&outcome.output, &shared.opts.download_dir, &name) {
                Ok(path) => TaskStatus::Completed { path },
                Err(e) => TaskStatus::failed(format!("{e:#}")),
            }
        }
    }
}

/// Sanitized file name of the artifact; falls back to `task-<id>.<ext>`.
fn destination_name(output: &Path, job: &FetchJob) -> String {
    let name = output
        .file_name()
        .map(|n| sanitize_title(&n.to_string_lossy()))
        .unwrap_or_default();
    if name.is_empty() {
        format!("task-{}.{}", job.task_id, job.request.format.extension())
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_suppresses_regressions() {
        let mut gate = ProgressGate::default();
        assert!(gate.admit(0.0));
        assert!(gate.admit(40.0));
        assert!(!gate.admit(40.0));
        assert!(!gate.admit(10.0));
        assert!(gate.admit(55.5));
        assert!(gate.admit(100.0));
        assert!(!gate.admit(0.0));
    }
}
