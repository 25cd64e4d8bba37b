//! Per-priority FIFO bins of tasks not yet assigned to a worker.

use std::collections::VecDeque;

use crate::task::{Priority, TaskRef};

/// One FIFO per priority level.
///
/// Not synchronized on its own; the scheduler keeps it behind its dispatch
/// lock. Insertion order within a bin is preserved.
#[derive(Debug)]
pub struct PriorityBins {
    bins: [VecDeque<TaskRef>; Priority::COUNT],
}

impl PriorityBins {
    /// Create empty bins.
    pub fn new() -> Self {
        Self {
            bins: std::array::from_fn(|_| VecDeque::new()),
        }
    }

    /// Append a task to the bin of its current priority.
    pub fn push(&mut self, task: TaskRef) -> Priority {
        let priority = task.priority();
        self.bins[priority.index()].push_back(task);
        priority
    }

    /// Pop the oldest task of the most urgent non-empty dispatchable bin.
    /// The blocked bin is never popped here.
    pub fn pop_next(&mut self) -> Option<TaskRef> {
        Priority::ALL
            .iter()
            .filter(|p| p.is_dispatchable())
            .find_map(|p| self.bins[p.index()].pop_front())
    }

    /// Whether any dispatchable bin holds a task.
    pub fn has_dispatchable(&self) -> bool {
        Priority::ALL
            .iter()
            .filter(|p| p.is_dispatchable())
            .any(|p| !self.bins[p.index()].is_empty())
    }

    /// Remove a task parked in the blocked bin.
    pub fn take_blocked(&mut self, id: &str) -> Option<TaskRef> {
        let bin = &mut self.bins[Priority::Blocked.index()];
        let pos = bin.iter().position(|task| task.id().as_str() == id)?;
        bin.remove(pos)
    }

    /// Whether a task with `id` sits in any bin.
    pub fn contains(&self, id: &str) -> bool {
        self.bins
            .iter()
            .flatten()
            .any(|task| task.id().as_str() == id)
    }

    /// Number of tasks across all bins.
    pub fn len(&self) -> usize {
        self.bins.iter().map(VecDeque::len).sum()
    }

    /// Whether every bin is empty.
    pub fn is_empty(&self) -> bool {
        self.bins.iter().all(VecDeque::is_empty)
    }

    /// Drop every queued task, returning how many were discarded.
    pub fn clear(&mut self) -> usize {
        let dropped = self.len();
        for bin in &mut self.bins {
            bin.clear();
        }
        dropped
    }
}

impl Default for PriorityBins {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use std::sync::Arc;

    fn task(id: &str, priority: Priority) -> TaskRef {
        Arc::new(Task::with_id(id, || Ok(())).with_priority(priority))
    }

    fn drain_ids(bins: &mut PriorityBins) -> Vec<String> {
        std::iter::from_fn(|| bins.pop_next())
            .map(|t| t.id().to_string())
            .collect()
    }

    #[test]
    fn test_pop_in_priority_then_fifo_order() {
        let mut bins = PriorityBins::new();
        bins.push(task("low", Priority::Low));
        bins.push(task("very-high", Priority::VeryHigh));
        bins.push(task("normal-1", Priority::Normal));
        bins.push(task("normal-2", Priority::Normal));
        bins.push(task("scheduled", Priority::Scheduled));

        assert_eq!(bins.len(), 5);
        assert_eq!(
            drain_ids(&mut bins),
            vec!["scheduled", "very-high", "normal-1", "normal-2", "low"]
        );
        assert!(bins.is_empty());
    }

    #[test]
    fn test_blocked_bin_is_parked() {
        let mut bins = PriorityBins::new();
        bins.push(task("parked", Priority::Blocked));

        assert!(!bins.is_empty());
        assert!(!bins.has_dispatchable());
        assert!(bins.pop_next().is_none());
        assert!(bins.contains("parked"));

        assert!(bins.take_blocked("missing").is_none());
        let parked = bins.take_blocked("parked").unwrap();
        assert_eq!(parked.id().as_str(), "parked");
        assert!(bins.is_empty());
    }

    #[test]
    fn test_clear_reports_dropped() {
        let mut bins = PriorityBins::new();
        bins.push(task("a", Priority::High));
        bins.push(task("b", Priority::Blocked));
        assert_eq!(bins.clear(), 2);
        assert!(bins.is_empty());
    }
}
