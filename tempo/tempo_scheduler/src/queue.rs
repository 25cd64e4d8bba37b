//! Blocking FIFO of control messages owned by one worker.
//!
//! Many producers (the dispatcher, `post_message`, stealing siblings) and a
//! single consumer (the owning worker). Strict arrival order; the only
//! out-of-order removals are `pop_control`, used while the worker is
//! paused, and `steal_task`, used by siblings.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::message::{ControlMessage, MessageKind};
use crate::task::TaskRef;

/// A thread-safe blocking message queue.
#[derive(Debug, Default)]
pub struct WorkerQueue {
    items: Mutex<VecDeque<ControlMessage>>,
    available: Condvar,
}

impl WorkerQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and wake one waiter.
    pub fn push(&self, message: ControlMessage) {
        self.items.lock().push_back(message);
        self.available.notify_one();
    }

    /// Block until a message is available and dequeue it.
    pub fn pop(&self) -> ControlMessage {
        let mut items = self.items.lock();
        loop {
            if let Some(message) = items.pop_front() {
                return message;
            }
            self.available.wait(&mut items);
        }
    }

    /// Dequeue the front message, waiting at most `timeout` for one.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<ControlMessage> {
        let deadline = Instant::now() + timeout;
        let mut items = self.items.lock();
        loop {
            if let Some(message) = items.pop_front() {
                return Some(message);
            }
            if self.available.wait_until(&mut items, deadline).timed_out() {
                return items.pop_front();
            }
        }
    }

    /// Dequeue the front message without blocking.
    pub fn try_pop(&self) -> Option<ControlMessage> {
        self.items.lock().pop_front()
    }

    /// Wait at most `timeout` for the oldest message that is not a task,
    /// leaving queued tasks in place.
    pub fn pop_control(&self, timeout: Duration) -> Option<ControlMessage> {
        let deadline = Instant::now() + timeout;
        let mut items = self.items.lock();
        loop {
            if let Some(pos) = items.iter().position(|m| !m.is_task()) {
                return items.remove(pos);
            }
            if self.available.wait_until(&mut items, deadline).timed_out() {
                let pos = items.iter().position(|m| !m.is_task())?;
                return items.remove(pos);
            }
        }
    }

    /// Remove the oldest queued task, if any. Never blocks on an empty
    /// queue; one call removes at most one task.
    pub fn steal_task(&self) -> Option<TaskRef> {
        let mut items = self.items.lock();
        let pos = items.iter().position(ControlMessage::is_task)?;
        items.remove(pos).and_then(ControlMessage::into_task)
    }

    /// Kind of the front message without removing it.
    pub fn try_peek(&self) -> Option<MessageKind> {
        self.items.lock().front().map(ControlMessage::kind)
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Number of queued task messages.
    pub fn task_count(&self) -> usize {
        self.items.lock().iter().filter(|m| m.is_task()).count()
    }

    /// Discard every queued message, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let dropped = items.len();
        items.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use std::sync::Arc;
    use std::thread;

    fn run(id: &str) -> ControlMessage {
        ControlMessage::Run(Arc::new(Task::with_id(id, || Ok(()))))
    }

    fn task_id(message: ControlMessage) -> String {
        message.into_task().unwrap().id().to_string()
    }

    #[test]
    fn test_fifo_order() {
        let queue = WorkerQueue::new();
        queue.push(run("a"));
        queue.push(ControlMessage::Pause);
        queue.push(run("b"));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.try_peek(), Some(MessageKind::Run));
        assert_eq!(task_id(queue.pop()), "a");
        assert_eq!(queue.pop().kind(), MessageKind::Pause);
        assert_eq!(task_id(queue.pop()), "b");
        assert!(queue.is_empty());
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn test_pop_blocks_until_push() {
        let queue = Arc::new(WorkerQueue::new());
        let producer = queue.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.push(ControlMessage::Stop);
        });

        assert_eq!(queue.pop().kind(), MessageKind::Stop);
        handle.join().unwrap();
    }

    #[test]
    fn test_pop_timeout_expires() {
        let queue = WorkerQueue::new();
        let start = Instant::now();
        assert!(queue.pop_timeout(Duration::from_millis(20)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_pop_control_skips_tasks() {
        let queue = WorkerQueue::new();
        queue.push(run("queued"));
        queue.push(ControlMessage::Resume);

        let msg = queue.pop_control(Duration::from_millis(10)).unwrap();
        assert_eq!(msg.kind(), MessageKind::Resume);

        // The task is still queued
        assert_eq!(queue.task_count(), 1);
        assert!(queue.pop_control(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn test_steal_takes_one_task() {
        let queue = WorkerQueue::new();
        queue.push(ControlMessage::Pause);
        queue.push(run("first"));
        queue.push(run("second"));

        let stolen = queue.steal_task().unwrap();
        assert_eq!(stolen.id().as_str(), "first");
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.try_peek(), Some(MessageKind::Pause));

        assert_eq!(queue.steal_task().unwrap().id().as_str(), "second");
        assert!(queue.steal_task().is_none());
    }

    #[test]
    fn test_clear() {
        let queue = WorkerQueue::new();
        queue.push(run("a"));
        queue.push(run("b"));
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }
}
