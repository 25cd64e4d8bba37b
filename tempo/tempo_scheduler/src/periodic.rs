//! Registry of tasks that fire at a fixed interval.
//!
//! Due times are expressed in the scheduler clock's total elapsed time.
//! Each firing moves an entry's next execution time forward by exactly one
//! interval, never to "now", so a dispatcher that falls behind keeps its
//! lag instead of silently skipping firings. At most one firing per entry
//! happens per dispatch pass.

use log::debug;
use std::collections::BTreeMap;
use std::time::Duration;
use tempo_core::TaskId;

use crate::task::TaskRef;

/// A periodic task and its timing.
#[derive(Debug, Clone)]
pub struct PeriodicEntry {
    task: TaskRef,
    interval: Duration,
    next_execution: Duration,
}

impl PeriodicEntry {
    /// Create an entry registered at clock time `now`; the first firing is
    /// due one interval later.
    pub fn new(task: TaskRef, interval: Duration, now: Duration) -> Self {
        Self {
            task,
            interval,
            next_execution: now + interval,
        }
    }

    /// The periodic task.
    pub fn task(&self) -> &TaskRef {
        &self.task
    }

    /// Firing interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Clock time of the next firing.
    pub fn next_execution(&self) -> Duration {
        self.next_execution
    }

    /// Whether the next firing time has been reached.
    pub fn is_due(&self, now: Duration) -> bool {
        now >= self.next_execution
    }

    /// Move the next firing forward by one interval.
    pub fn advance(&mut self) {
        self.next_execution += self.interval;
    }
}

/// Periodic entries keyed by task identifier.
#[derive(Debug, Default)]
pub struct PeriodicRegistry {
    entries: BTreeMap<TaskId, PeriodicEntry>,
}

impl PeriodicRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `task`, replacing any entry with the same identifier.
    pub fn insert(&mut self, task: TaskRef, interval: Duration, now: Duration) -> Option<PeriodicEntry> {
        let id = task.id().clone();
        self.entries
            .insert(id, PeriodicEntry::new(task, interval, now))
    }

    /// Remove an entry.
    pub fn remove(&mut self, id: &str) -> Option<PeriodicEntry> {
        self.entries.remove(id)
    }

    /// Look up an entry.
    pub fn get(&self, id: &str) -> Option<&PeriodicEntry> {
        self.entries.get(id)
    }

    /// Hand every due, unpaused task to `fire` and advance its entry by one
    /// interval. Paused entries are skipped without advancing. Returns the
    /// number of firings.
    pub fn fire_due(&mut self, now: Duration, mut fire: impl FnMut(&TaskRef)) -> usize {
        let mut fired = 0;
        for (id, entry) in self.entries.iter_mut() {
            if !entry.is_due(now) {
                continue;
            }
            if entry.task.is_paused() {
                debug!("Skipping paused task: {}", id);
                continue;
            }
            fire(&entry.task);
            entry.advance();
            fired += 1;
        }
        fired
    }

    /// Earliest next execution time among unpaused entries.
    pub fn next_due(&self) -> Option<Duration> {
        self.entries
            .values()
            .filter(|entry| !entry.task.is_paused())
            .map(PeriodicEntry::next_execution)
            .min()
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry, returning how many were registered.
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use std::sync::Arc;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn task(id: &str) -> TaskRef {
        Arc::new(Task::with_id(id, || Ok(())))
    }

    #[test]
    fn test_first_firing_one_interval_after_registration() {
        let entry = PeriodicEntry::new(task("tick"), ms(250), ms(100));
        assert_eq!(entry.next_execution(), ms(350));
        assert!(!entry.is_due(ms(349)));
        assert!(entry.is_due(ms(350)));
    }

    #[test]
    fn test_late_firing_advances_by_interval_only() {
        let mut registry = PeriodicRegistry::new();
        registry.insert(task("tick"), ms(250), ms(0));

        // Dispatcher is 400ms late: only one firing per pass
        let fired = registry.fire_due(ms(650), |_| {});
        assert_eq!(fired, 1);
        assert_eq!(registry.get("tick").unwrap().next_execution(), ms(500));

        // Still behind, so the next pass fires again
        assert_eq!(registry.fire_due(ms(650), |_| {}), 1);
        assert_eq!(registry.get("tick").unwrap().next_execution(), ms(750));

        // Caught up
        assert_eq!(registry.fire_due(ms(650), |_| {}), 0);
    }

    #[test]
    fn test_paused_entries_do_not_fire_or_advance() {
        let mut registry = PeriodicRegistry::new();
        let paused = task("paused");
        paused.pause();
        registry.insert(paused.clone(), ms(100), ms(0));
        registry.insert(task("active"), ms(100), ms(0));

        let mut fired_ids = Vec::new();
        registry.fire_due(ms(100), |t| fired_ids.push(t.id().to_string()));
        assert_eq!(fired_ids, vec!["active"]);
        assert_eq!(registry.get("paused").unwrap().next_execution(), ms(100));
        assert_eq!(registry.next_due(), Some(ms(200)));

        paused.resume();
        assert_eq!(registry.next_due(), Some(ms(100)));
    }

    #[test]
    fn test_reregistration_replaces_entry() {
        let mut registry = PeriodicRegistry::new();
        assert!(registry.insert(task("job"), ms(100), ms(0)).is_none());
        let previous = registry.insert(task("job"), ms(500), ms(0)).unwrap();

        assert_eq!(previous.interval(), ms(100));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("job").unwrap().interval(), ms(500));

        assert!(registry.remove("job").is_some());
        assert!(registry.remove("job").is_none());
        assert!(registry.is_empty());
    }
}
