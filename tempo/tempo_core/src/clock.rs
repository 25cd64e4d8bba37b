//! Clock collaborator for periodic due-time calculations.
//!
//! The scheduler never reads wall-clock time directly. It asks a `Clock`
//! for the total elapsed time and compares that against each periodic
//! entry's next execution time. `Stopwatch` measures real monotonic time;
//! `ManualClock` is advanced explicitly and makes periodic behaviour
//! deterministic in tests and demos.

use log::trace;
use parking_lot::Mutex;
use std::fmt;
use std::time::{Duration, Instant};

/// A monotonic time source.
pub trait Clock: Send + Sync {
    /// Total time accumulated while the clock was running.
    fn total_elapsed(&self) -> Duration;

    /// Begin (or continue) measuring time.
    fn start(&self) {}

    /// Stop measuring time, keeping what was accumulated so far.
    fn stop(&self) {}

    /// Clear accumulated time and stop measuring.
    fn reset(&self) {}
}

#[derive(Debug)]
struct StopwatchState {
    started_at: Instant,
    accumulated: Duration,
    paused: bool,
}

/// A pausable stopwatch over `Instant`.
///
/// A new stopwatch is paused and reports zero until `start` is called.
#[derive(Debug)]
pub struct Stopwatch {
    state: Mutex<StopwatchState>,
}

impl Stopwatch {
    /// Create a paused stopwatch with no accumulated time.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StopwatchState {
                started_at: Instant::now(),
                accumulated: Duration::ZERO,
                paused: true,
            }),
        }
    }

    /// Whether the stopwatch is currently measuring.
    pub fn is_running(&self) -> bool {
        !self.state.lock().paused
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for Stopwatch {
    fn total_elapsed(&self) -> Duration {
        let state = self.state.lock();
        if state.paused {
            state.accumulated
        } else {
            state.accumulated + state.started_at.elapsed()
        }
    }

    fn start(&self) {
        let mut state = self.state.lock();
        if state.paused {
            state.started_at = Instant::now();
            state.paused = false;
            trace!("Stopwatch started at {:?}", state.accumulated);
        }
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        if !state.paused {
            let elapsed = state.started_at.elapsed();
            state.accumulated += elapsed;
            state.paused = true;
            trace!("Stopwatch stopped at {:?}", state.accumulated);
        }
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        state.started_at = Instant::now();
        state.accumulated = Duration::ZERO;
        state.paused = true;
        trace!("Stopwatch reset");
    }
}

/// Renders the elapsed time as `HH:MM:SS.mmm`.
impl fmt::Display for Stopwatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hms(f, self.total_elapsed())
    }
}

/// A clock whose time only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    /// Create a manual clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        *self.now.lock() += delta;
    }

    /// Jump the clock to an absolute elapsed time.
    pub fn set(&self, elapsed: Duration) {
        *self.now.lock() = elapsed;
    }
}

impl Clock for ManualClock {
    fn total_elapsed(&self) -> Duration {
        *self.now.lock()
    }

    fn reset(&self) {
        *self.now.lock() = Duration::ZERO;
    }
}

impl fmt::Display for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hms(f, self.total_elapsed())
    }
}

fn write_hms(f: &mut fmt::Formatter<'_>, elapsed: Duration) -> fmt::Result {
    let total_secs = elapsed.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let millis = elapsed.subsec_millis();
    write!(f, "{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}
