//! State shared between the scheduler handle and its worker slot threads.
//!
//! All backlog, slot and per-task mutations happen under `Shared::state`.
//! Events are published while the lock is held so subscribers see state
//! changes in the order they were applied.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;

use super::backlog::{Backlog, BacklogKey};
use super::slot;
use super::SchedulerOptions;
use crate::control::CancelToken;
use crate::events::{EventHub, TaskEvent};
use crate::fetch::FetchService;
use crate::task::{DownloadRequest, Priority, TaskId, TaskSnapshot, TaskStatus};
use crate::url_model::sanitize_title;

pub(crate) struct Entry {
    pub(crate) request: DownloadRequest,
    pub(crate) priority: Priority,
    pub(crate) status: TaskStatus,
    pub(crate) progress: f64,
    pub(crate) title: Option<String>,
    pub(crate) run: u32,
    pub(crate) cancel: CancelToken,
    /// Set while the task waits in the backlog.
    pub(crate) queued_at: Option<BacklogKey>,
}

impl Entry {
    pub(crate) fn snapshot(&self, id: TaskId) -> TaskSnapshot {
        TaskSnapshot {
            id,
            request: self.request.clone(),
            priority: self.priority,
            status: self.status.clone(),
            progress: self.progress,
            title: self.title.clone(),
            run: self.run,
        }
    }

    pub(crate) fn event(&self, id: TaskId, message: Option<String>) -> TaskEvent {
        TaskEvent {
            task_id: id,
            progress: self.progress,
            status: self.status.clone(),
            title: self.title.clone(),
            message,
        }
    }
}

#[derive(Default)]
pub(crate) struct State {
    pub(crate) entries: HashMap<TaskId, Entry>,
    pub(crate) backlog: Backlog,
    pub(crate) free_slots: Vec<usize>,
    pub(crate) busy: usize,
    pub(crate) slots_freed: u64,
}

impl State {
    pub(crate) fn is_idle(&self) -> bool {
        self.busy == 0 && self.backlog.is_empty()
    }
}

/// A task handed to a slot by the admission pass.
pub(crate) struct Admission {
    pub(crate) slot: usize,
    pub(crate) task_id: TaskId,
    pub(crate) run: u32,
    pub(crate) request: DownloadRequest,
    pub(crate) cancel: CancelToken,
}

pub(crate) struct Shared {
    state: Mutex<State>,
    idle: Condvar,
    pub(crate) events: EventHub,
    pub(crate) fetch: Arc<dyn FetchService>,
    pub(crate) opts: SchedulerOptions,
}

impl Shared {
    pub(crate) fn new(fetch: Arc<dyn FetchService>, opts: SchedulerOptions) -> Self {
        let state = State {
            // Popped from the end; reversed so slot 0 is used first.
            free_slots: (0..opts.max_concurrent).rev().collect(),
            ..State::default()
        };
        Self {
            state: Mutex::new(state),
            idle: Condvar::new(),
            events: EventHub::new(),
            fetch,
            opts,
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn publish(&self, id: TaskId, entry: &Entry, message: Option<String>) {
        self.events.publish(entry.event(id, message));
    }

    /// Wakes `wait_idle` callers if nothing is waiting or running.
    pub(crate) fn notify_if_idle(&self, st: &State) {
        if st.is_idle() {
            self.idle.notify_all();
        }
    }

    pub(crate) fn wait_idle<'a>(&self, guard: MutexGuard<'a, State>) -> MutexGuard<'a, State> {
        self.idle
            .wait_while(guard, |st| !st.is_idle())
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn wait_idle_timeout<'a>(
        &self,
        guard: MutexGuard<'a, State>,
        timeout: std::time::Duration,
    ) -> (MutexGuard<'a, State>, bool) {
        match self.idle.wait_timeout_while(guard, timeout, |st| !st.is_idle()) {
            Ok((g, res)) => (g, !res.timed_out()),
            Err(poisoned) => {
                let (g, res) = poisoned.into_inner();
                (g, !res.timed_out())
            }
        }
    }

    /// Admission pass: fills free slots from the backlog in (priority, seq)
    /// order. Each admitted task is marked Downloading at 0% here, so the
    /// number of active tasks never exceeds the slot count.
    pub(crate) fn admit_locked(&self, st: &mut State) -> Vec<Admission> {
        let mut admitted = Vec::new();
        while st.busy < self.opts.max_concurrent {
            let Some(id) = st.backlog.pop() else {
                break;
            };
            let Some(slot) = st.free_slots.pop() else {
                break;
            };
            let Some(entry) = st.entries.get_mut(&id) else {
                st.free_slots.push(slot);
                continue;
            };
            entry.queued_at = None;
            entry.status = TaskStatus::Downloading;
            entry.progress = 0.0;
            st.busy += 1;
            tracing::info!(task_id = %id, slot, priority = entry.priority.as_str(), run = entry.run, "task admitted");
            self.publish(id, entry, None);
            admitted.push(Admission {
                slot,
                task_id: id,
                run: entry.run,
                request: entry.request.clone(),
                cancel: entry.cancel.clone(),
            });
        }
        admitted
    }

    /// Starts one worker thread per admission. Must be called without the
    /// state lock held.
    pub(crate) fn spawn_slots(self: &Arc<Self>, admitted: Vec<Admission>) {
        for adm in admitted {
            let (slot, id, run) = (adm.slot, adm.task_id, adm.run);
            let shared = Arc::clone(self);
            let spawned = thread::Builder::new()
                .name(format!("mdq-slot-{slot}"))
                .spawn(move || slot::run(shared, adm));
            if let Err(e) = spawned {
                tracing::warn!(task_id = %id, slot, "cannot start worker thread: {}", e);
                self.finish(id, run, TaskStatus::failed(format!("cannot start worker: {e}")));
                self.release_slot(slot, id, run);
            }
        }
    }

    /// Progress for the current run; ignored unless Downloading and higher
    /// than what was last recorded.
    pub(crate) fn report_progress(&self, id: TaskId, run: u32, percent: f64) {
        let mut st = self.lock();
        let Some(entry) = current_run(&mut st, id, run) else {
            return;
        };
        let percent = percent.clamp(0.0, 100.0);
        if entry.status != TaskStatus::Downloading || percent <= entry.progress {
            return;
        }
        entry.progress = percent;
        self.publish(id, entry, None);
    }

    pub(crate) fn report_title(&self, id: TaskId, run: u32, title: &str) {
        let title = sanitize_title(title);
        if title.is_empty() {
            return;
        }
        let mut st = self.lock();
        let Some(entry) = current_run(&mut st, id, run) else {
            return;
        };
        if entry.title.as_deref() == Some(title.as_str()) || entry.status.is_terminal() {
            return;
        }
        tracing::debug!(task_id = %id, title = %title, "title reported");
        entry.title = Some(title);
        self.publish(id, entry, None);
    }

    /// Informational event (e.g. a backend retry) without a state change.
    pub(crate) fn report_message(&self, id: TaskId, run: u32, message: String) {
        let mut st = self.lock();
        if let Some(entry) = current_run(&mut st, id, run) {
            if entry.status.is_active() {
                self.publish(id, entry, Some(message));
            }
        }
    }

    /// Downloading → Processing at 100%. Processing is never left for
    /// Downloading again.
    pub(crate) fn enter_processing(&self, id: TaskId, run: u32) {
        let mut st = self.lock();
        let Some(entry) = current_run(&mut st, id, run) else {
            return;
        };
        if entry.status != TaskStatus::Downloading {
            return;
        }
        entry.status = TaskStatus::Processing;
        entry.progress = 100.0;
        tracing::debug!(task_id = %id, "finalizing");
        self.publish(id, entry, None);
    }

    /// Records the terminal outcome of a run. No-op if already terminal.
    pub(crate) fn finish(&self, id: TaskId, run: u32, status: TaskStatus) {
        let mut st = self.lock();
        let Some(entry) = current_run(&mut st, id, run) else {
            return;
        };
        if entry.status.is_terminal() {
            return;
        }
        match &status {
            TaskStatus::Completed { path } => {
                entry.progress = 100.0;
                tracing::info!(task_id = %id, path = %path.display(), "task completed");
            }
            TaskStatus::Failed { reason } => {
                tracing::warn!(task_id = %id, reason = %reason, "task failed");
            }
            TaskStatus::Cancelled => tracing::info!(task_id = %id, "task cancelled"),
            _ => {}
        }
        entry.status = status;
        self.publish(id, entry, None);
    }

    /// Called exactly once per admitted run when its slot goes idle.
    /// A run that is still active here died without an outcome and is
    /// marked failed. Then the admission pass runs again.
    pub(crate) fn release_slot(self: &Arc<Self>, slot: usize, id: TaskId, run: u32) {
        let admitted = {
            let mut st = self.lock();
            if let Some(entry) = current_run(&mut st, id, run) {
                if !entry.status.is_terminal() {
                    entry.status = TaskStatus::failed("worker panicked");
                    tracing::warn!(task_id = %id, slot, "worker exited without an outcome");
                    self.publish(id, entry, None);
                }
            }
            st.busy = st.busy.saturating_sub(1);
            st.free_slots.push(slot);
            st.slots_freed += 1;
            tracing::debug!(slot, busy = st.busy, waiting = st.backlog.len(), "slot freed");
            let admitted = self.admit_locked(&mut st);
            self.notify_if_idle(&st);
            admitted
        };
        self.spawn_slots(admitted);
    }
}

fn current_run(st: &mut State, id: TaskId, run: u32) -> Option<&mut Entry> {
    st.entries.get_mut(&id).filter(|e| e.run == run)
}
