//! Global overflow queue shared by all workers.
//!
//! Holds tasks the dispatcher could not hand to an idle worker. Workers
//! with nothing local pull from it most urgent first, and in arrival order
//! within a level, so a task dispatched while every worker was busy cannot
//! jump ahead of a more urgent one that arrives later.

use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::task::{Priority, TaskRef};

struct Entry {
    priority: Priority,
    seq: u64,
    task: TaskRef,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// The heap pops the greatest entry: most urgent level, then oldest.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct Inner {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

/// Priority-ordered queue of tasks waiting for any free worker.
#[derive(Default)]
pub struct OverflowQueue {
    inner: Mutex<Inner>,
}

impl OverflowQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `task` under its current priority.
    pub fn push(&self, task: TaskRef) {
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.heap.push(Entry {
            priority: task.priority(),
            seq,
            task,
        });
    }

    /// Take the most urgent, oldest task.
    pub fn pop(&self) -> Option<TaskRef> {
        self.inner.lock().heap.pop().map(|entry| entry.task)
    }

    /// Number of waiting tasks.
    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    /// Whether nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().heap.is_empty()
    }

    /// Discard every waiting task, returning the count.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let dropped = inner.heap.len();
        inner.heap.clear();
        dropped
    }
}

impl std::fmt::Debug for OverflowQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverflowQueue")
            .field("len", &self.len())
            .finish()
    }
}
