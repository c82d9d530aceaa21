//! Waiting area ordered by (priority, submission sequence).

use std::collections::BTreeMap;

use crate::task::{Priority, TaskId};

/// Position of a waiting task. Lower sorts first: priority rank, then the
/// order in which tasks were (re)submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct BacklogKey {
    priority: Priority,
    seq: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Backlog {
    waiting: BTreeMap<BacklogKey, TaskId>,
    next_seq: u64,
}

impl Backlog {
    pub(crate) fn push(&mut self, priority: Priority, id: TaskId) -> BacklogKey {
        let key = BacklogKey {
            priority,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.waiting.insert(key, id);
        key
    }

    /// Highest priority, earliest submitted.
    pub(crate) fn pop(&mut self) -> Option<TaskId> {
        self.waiting.pop_first().map(|(_, id)| id)
    }

    pub(crate) fn remove(&mut self, key: BacklogKey) -> Option<TaskId> {
        self.waiting.remove(&key)
    }

    pub(crate) fn len(&self) -> usize {
        self.waiting.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_within_priority() {
        let mut b = Backlog::default();
        b.push(Priority::Normal, TaskId(3));
        b.push(Priority::Normal, TaskId(1));
        b.push(Priority::Normal, TaskId(2));
        assert_eq!(b.pop(), Some(TaskId(3)));
        assert_eq!(b.pop(), Some(TaskId(1)));
        assert_eq!(b.pop(), Some(TaskId(2)));
        assert_eq!(b.pop(), None);
    }

    #[test]
    fn priority_beats_arrival() {
        let mut b = Backlog::default();
        b.push(Priority::Low, TaskId(1));
        b.push(Priority::Normal, TaskId(2));
        b.push(Priority::High, TaskId(3));
        b.push(Priority::Normal, TaskId(4));
        let order: Vec<_> = std::iter::from_fn(|| b.pop()).collect();
        assert_eq!(order, vec![TaskId(3), TaskId(2), TaskId(4), TaskId(1)]);
    }

    #[test]
    fn removed_entry_is_never_popped() {
        let mut b = Backlog::default();
        let k1 = b.push(Priority::Normal, TaskId(1));
        b.push(Priority::Normal, TaskId(2));
        assert_eq!(b.remove(k1), Some(TaskId(1)));
        assert_eq!(b.remove(k1), None);
        assert_eq!(b.len(), 1);
        assert_eq!(b.pop(), Some(TaskId(2)));
        assert!(b.is_empty());
    }
}
