//! Priority scheduler with bounded concurrency.
//!
//! Tasks wait in a backlog ordered by (priority, submission order) and are
//! admitted into at most `max_concurrent` worker slots. Admission is
//! re-evaluated on every submit, retry and slot release, so the backlog
//! drains as slots free up. Each admitted run gets its own named thread.
//!
//! Cancellation is cooperative: a waiting task is cancelled immediately; a
//! running task is cancelled at the backend's next progress callback (or the
//! next output poll).

mod backlog;
mod shared;
mod slot;


use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::{MdqConfig, OutputWaitConfig};
use crate::control::CancelToken;
use crate::events::TaskEvent;
use crate::fetch::FetchService;
use crate::task::{DownloadRequest, DownloadTask, Priority, TaskId, TaskSnapshot, TaskStatus};
use crate::url_model;

use shared::{Entry, Shared};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// Empty, malformed or unsupported URL; the task never entered the backlog.
    #[error("invalid task: {0}")]
    InvalidTask(String),
    #[error("task {0} is already tracked")]
    DuplicateTask(TaskId),
}

/// Which terminal tasks `clear_finished` drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearMode {
    /// Completed, failed and cancelled.
    #[default]
    AllTerminal,
    /// Completed and cancelled; failed tasks stay visible for retry.
    KeepFailed,
}

impl ClearMode {
    pub fn clears(self, status: &TaskStatus) -> bool {
        match self {
            ClearMode::AllTerminal => status.is_terminal(),
            ClearMode::KeepFailed => {
                matches!(status, TaskStatus::Completed { .. } | TaskStatus::Cancelled)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub max_concurrent: usize,
    /// Finished files are moved here.
    pub download_dir: PathBuf,
    /// Backend working directory.
    pub staging_dir: PathBuf,
    pub output_wait: OutputWaitConfig,
}

impl SchedulerOptions {
    pub fn from_config(cfg: &MdqConfig) -> Result<Self> {
        Ok(Self {
            max_concurrent: cfg.max_concurrent,
            download_dir: cfg.download_dir.clone(),
            staging_dir: cfg.staging_dir()?,
            output_wait: cfg.output_wait,
        })
    }
}

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub max_concurrent: usize,
    /// Slots currently running a task.
    pub busy: usize,
    /// Tasks in the backlog.
    pub waiting: usize,
    /// Slot releases since creation (one per admitted run).
    pub slots_freed: u64,
}

/// Cloneable handle; all clones drive the same scheduler.
#[derive(Clone)]
pub struct PriorityScheduler {
    shared: Arc<Shared>,
}

impl PriorityScheduler {
    pub fn new(fetch: Arc<dyn FetchService>, mut opts: SchedulerOptions) -> Self {
        opts.max_concurrent = opts.max_concurrent.max(1);
        Self {
            shared: Arc::new(Shared::new(fetch, opts)),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.shared.opts.max_concurrent
    }

    /// Queues `task` at `priority` and runs an admission pass.
    ///
    /// Surrounding whitespace is trimmed from the URL, which is then
    /// validated but not rewritten; use [`submit_request`](Self::submit_request)
    /// for user input.
    pub fn submit(&self, mut task: DownloadTask, priority: Priority) -> Result<TaskId, SchedulerError> {
        task.request.url = task.request.url.trim().to_string();
        url_model::validate(&task.request.url)
            .map_err(|e| SchedulerError::InvalidTask(e.to_string()))?;

        let id = task.id;
        let admitted = {
            let mut st = self.shared.lock();
            if st.entries.contains_key(&id) {
                return Err(SchedulerError::DuplicateTask(id));
            }
            let key = st.backlog.push(priority, id);
            let entry = Entry {
                request: task.request,
                priority,
                status: TaskStatus::Queued,
                progress: 0.0,
                title: None,
                run: 1,
                cancel: CancelToken::new(),
                queued_at: Some(key),
            };
            tracing::info!(task_id = %id, priority = priority.as_str(), url = %entry.request.url, "task queued");
            self.shared.publish(id, &entry, None);
            st.entries.insert(id, entry);
            self.shared.admit_locked(&mut st)
        };
        self.shared.spawn_slots(admitted);
        Ok(id)
    }

    /// Normalizes the URL (Instagram post → reel), then submits a new task.
    pub fn submit_request(
        &self,
        mut request: DownloadRequest,
        priority: Priority,
    ) -> Result<TaskId, SchedulerError> {
        request.url = url_model::normalize_for_submission(&request.url);
        self.submit(DownloadTask::new(request), priority)
    }

    /// Cancels a waiting or running task.
    ///
    /// A waiting task leaves the backlog and becomes Cancelled now. A running
    /// task is signalled and becomes Cancelled when its worker observes the
    /// flag. Returns `false` for unknown or terminal tasks.
    pub fn cancel(&self, id: TaskId) -> bool {
        let mut st = self.shared.lock();
        let state = &mut *st;
        let Some(entry) = state.entries.get_mut(&id) else {
            return false;
        };
        match entry.status {
            TaskStatus::Queued => {
                entry.cancel.request();
                if let Some(key) = entry.queued_at.take() {
                    state.backlog.remove(key);
                }
                entry.status = TaskStatus::Cancelled;
                tracing::info!(task_id = %id, "waiting task cancelled");
                self.shared.publish(id, entry, None);
                self.shared.notify_if_idle(state);
                true
            }
            TaskStatus::Downloading | TaskStatus::Processing => {
                entry.cancel.request();
                tracing::info!(task_id = %id, "cancel requested for running task");
                true
            }
            _ => false,
        }
    }

    /// Cancels every waiting and running task. Returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<TaskId> = {
            let st = self.shared.lock();
            st.entries
                .iter()
                .filter(|(_, e)| !e.status.is_terminal())
                .map(|(id, _)| *id)
                .collect()
        };
        ids.into_iter().filter(|id| self.cancel(*id)).count()
    }

    /// Starts a new run of a Failed task at its original priority: progress 0,
    /// fresh cancel flag, status Queued. Returns `false` for any other state.
    pub fn retry(&self, id: TaskId) -> bool {
        let admitted = {
            let mut st = self.shared.lock();
            let state = &mut *st;
            let Some(entry) = state.entries.get_mut(&id) else {
                return false;
            };
            if !matches!(entry.status, TaskStatus::Failed { .. }) {
                return false;
            }
            entry.run += 1;
            entry.progress = 0.0;
            entry.cancel = CancelToken::new();
            entry.status = TaskStatus::Queued;
            entry.queued_at = Some(state.backlog.push(entry.priority, id));
            tracing::info!(task_id = %id, run = entry.run, "task requeued for retry");
            self.shared.publish(id, entry, Some("retry".to_string()));
            self.shared.admit_locked(state)
        };
        self.shared.spawn_slots(admitted);
        true
    }

    /// Stops tracking a terminal task.
    pub fn remove(&self, id: TaskId) -> bool {
        let mut st = self.shared.lock();
        match st.entries.get(&id) {
            Some(e) if e.status.is_terminal() => {
                st.entries.remove(&id);
                true
            }
            _ => false,
        }
    }

    /// Drops terminal tasks selected by `mode`; returns their ids in ascending order.
    pub fn clear_finished(&self, mode: ClearMode) -> Vec<TaskId> {
        let mut st = self.shared.lock();
        let mut cleared: Vec<TaskId> = st
            .entries
            .iter()
            .filter(|(_, e)| mode.clears(&e.status))
            .map(|(id, _)| *id)
            .collect();
        cleared.sort();
        for id in &cleared {
            st.entries.remove(id);
        }
        cleared
    }

    /// All tracked tasks, ordered by id.
    pub fn snapshot(&self) -> Vec<TaskSnapshot> {
        let st = self.shared.lock();
        let mut out: Vec<TaskSnapshot> = st.entries.iter().map(|(id, e)| e.snapshot(*id)).collect();
        out.sort_by_key(|s| s.id);
        out
    }

    pub fn get(&self, id: TaskId) -> Option<TaskSnapshot> {
        self.shared.lock().entries.get(&id).map(|e| e.snapshot(id))
    }

    pub fn stats(&self) -> SchedulerStats {
        let st = self.shared.lock();
        SchedulerStats {
            max_concurrent: self.shared.opts.max_concurrent,
            busy: st.busy,
            waiting: st.backlog.len(),
            slots_freed: st.slots_freed,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.shared.lock().is_idle()
    }

    /// Blocks until the backlog is empty and no slot is busy.
    pub fn wait_idle(&self) {
        let st = self.shared.lock();
        drop(self.shared.wait_idle(st));
    }

    /// Like [`wait_idle`](Self::wait_idle) with a deadline; returns `false` on timeout.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let st = self.shared.lock();
        let (_st, idle) = self.shared.wait_idle_timeout(st, timeout);
        idle
    }

    /// New event stream. Every subscriber receives every event published
    /// after it subscribed.
    pub fn subscribe(&self) -> UnboundedReceiver<TaskEvent> {
        self.shared.events.subscribe()
    }

    /// Ends all event streams once they are drained.
    pub fn close_events(&self) {
        self.shared.events.close();
    }
}
