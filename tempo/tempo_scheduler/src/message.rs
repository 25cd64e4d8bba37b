//! Control messages delivered to workers.
//!
//! Workers are driven entirely through their message queue: the dispatcher
//! hands them work as `Run` messages and lifecycle changes arrive as
//! `Pool`, `Pause`, `Resume` or `Stop`.

use std::fmt;
use std::str::FromStr;

use crate::task::TaskRef;

/// An instruction for a worker, optionally carrying a task.
#[derive(Clone)]
pub enum ControlMessage {
    /// Return to the idle pool, clearing any pause
    Pool,
    /// Stop pulling new work until resumed
    Pause,
    /// Leave the paused state
    Resume,
    /// Exit the worker loop
    Stop,
    /// Execute the carried task
    Run(TaskRef),
}

impl ControlMessage {
    /// The tag of this message without its payload.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Pool => MessageKind::Pool,
            Self::Pause => MessageKind::Pause,
            Self::Resume => MessageKind::Resume,
            Self::Stop => MessageKind::Stop,
            Self::Run(_) => MessageKind::Run,
        }
    }

    /// Whether this message carries a task.
    pub fn is_task(&self) -> bool {
        matches!(self, Self::Run(_))
    }

    /// Take the carried task, if any.
    pub fn into_task(self) -> Option<TaskRef> {
        match self {
            Self::Run(task) => Some(task),
            _ => None,
        }
    }
}

impl From<TaskRef> for ControlMessage {
    fn from(task: TaskRef) -> Self {
        Self::Run(task)
    }
}

impl fmt::Debug for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run(task) => f.debug_tuple("Run").field(task.id()).finish(),
            other => write!(f, "{}", other.kind()),
        }
    }
}

/// Payload-free tag of a [`ControlMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// See [`ControlMessage::Pool`]
    Pool,
    /// See [`ControlMessage::Pause`]
    Pause,
    /// See [`ControlMessage::Resume`]
    Resume,
    /// See [`ControlMessage::Stop`]
    Stop,
    /// See [`ControlMessage::Run`]
    Run,
}

impl MessageKind {
    /// Name of the message kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pool => "Pool",
            Self::Pause => "Pause",
            Self::Resume => "Resume",
            Self::Stop => "Stop",
            Self::Run => "Run",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pool" => Ok(Self::Pool),
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            "stop" => Ok(Self::Stop),
            "run" => Ok(Self::Run),
            _ => Err(format!("unknown message kind: {}", s)),
        }
    }
}
