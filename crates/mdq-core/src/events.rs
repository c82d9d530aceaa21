//! Progress/status events delivered to subscribers (CLI, history writer, logs).
//!
//! Every subscriber gets its own unbounded channel so no event is dropped
//! because a consumer is slow.

use serde::Serialize;
use std::sync::Mutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::task::{TaskId, TaskStatus};

/// One meaningful change of a task's progress or status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskEvent {
    pub task_id: TaskId,
    /// Percent in [0, 100].
    pub progress: f64,
    pub status: TaskStatus,
    /// Display title, once the backend has reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Fan-out of task events to all live subscribers.
#[derive(Default)]
pub struct EventHub {
    subscribers: Mutex<Vec<UnboundedSender<TaskEvent>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> UnboundedReceiver<TaskEvent> {
        let (tx, rx) = unbounded_channel();
        lock(&self.subscribers).push(tx);
        rx
    }

    /// Deliver to every subscriber; subscribers whose receiver was dropped are pruned.
    pub fn publish(&self, event: TaskEvent) {
        let mut subs = lock(&self.subscribers);
        subs.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Drop all senders so receivers end once they have drained what was sent.
    pub fn close(&self) {
        lock(&self.subscribers).clear();
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
