//! Priority levels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tempo_core::SchedulerError;

/// Urgency of a task, ordered from most to least urgent.
///
/// The derived ordering follows declaration order, so
/// `Priority::Scheduled < Priority::Blocked` means "more urgent".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    /// Reserved for periodic tasks promoted by due time
    Scheduled,
    /// Must run ahead of everything else
    Exclusive,
    /// Very high urgency
    VeryHigh,
    /// High urgency
    High,
    /// Medium urgency
    Medium,
    /// The default level
    Normal,
    /// Background work
    Low,
    /// Parked; never dispatched until explicitly unblocked
    Blocked,
}

impl Priority {
    /// Number of priority levels, and therefore of priority bins.
    pub const COUNT: usize = 8;

    /// Every level in dispatch scan order.
    pub const ALL: [Priority; Priority::COUNT] = [
        Priority::Scheduled,
        Priority::Exclusive,
        Priority::VeryHigh,
        Priority::High,
        Priority::Medium,
        Priority::Normal,
        Priority::Low,
        Priority::Blocked,
    ];

    /// Bin index of this level.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether the dispatcher picks tasks from this level on its own.
    pub fn is_dispatchable(self) -> bool {
        self != Priority::Blocked
    }

    /// Kebab-case name of the level.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Exclusive => "exclusive",
            Self::VeryHigh => "very-high",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Normal => "normal",
            Self::Low => "low",
            Self::Blocked => "blocked",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<usize> for Priority {
    type Error = SchedulerError;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(SchedulerError::InvalidPriority(index))
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| format!("unknown priority level: {}", s))
    }
}
