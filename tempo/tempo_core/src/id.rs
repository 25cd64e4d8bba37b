//! Strongly-typed identifiers.
//!
//! Task identifiers are opaque strings. Callers may pick a meaningful name
//! (`"physics-step"`) or let Tempo generate a random UUID. Worker
//! identifiers are the worker's index in the pool.
//!
//! # Examples
//!
//! ```
//! use tempo_core::id::{TaskId, WorkerId};
//!
//! let named = TaskId::from("heartbeat");
//! assert_eq!(named.as_str(), "heartbeat");
//!
//! // Generated identifiers are unique
//! assert_ne!(TaskId::new(), TaskId::new());
//!
//! assert_eq!(WorkerId::new(3).to_string(), "worker-3");
//! ```

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

/// Identifier of a task, assigned at creation and never changed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Create a new random identifier backed by a UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&TaskId> for TaskId {
    fn from(value: &TaskId) -> Self {
        value.clone()
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Lets registries keyed by `TaskId` be queried with a plain `&str`.
impl Borrow<str> for TaskId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Identifier of a worker thread: its index within the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(usize);

impl WorkerId {
    /// Create a worker identifier from a pool index.
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// The worker's index within the pool.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}
