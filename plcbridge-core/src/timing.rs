//! The shared poll interval.

use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

/// The two cadences the watchdog switches between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Slow polling while the monitored process is stopped.
    Normal,
    /// Fast polling while the monitored process runs.
    Fast,
}

#[derive(Debug)]
struct Intervals {
    current: Duration,
    normal: Duration,
    fast: Duration,
}

/// Poll interval shared by the cycle, the watchdog and the command handler.
///
/// All reads and writes go through one lock, so the cycle never sees a
/// half-updated interval. The most recent writer wins.
#[derive(Debug)]
pub struct PollTiming {
    inner: Mutex<Intervals>,
}

impl PollTiming {
    /// Create timing that starts on the normal cadence.
    pub fn new(normal: Duration, fast: Duration) -> Self {
        Self {
            inner: Mutex::new(Intervals {
                current: normal,
                normal,
                fast,
            }),
        }
    }

    /// The interval the next sleep will use.
    pub fn current(&self) -> Duration {
        self.inner.lock().current
    }

    pub fn normal(&self) -> Duration {
        self.inner.lock().normal
    }

    pub fn fast(&self) -> Duration {
        self.inner.lock().fast
    }

    /// Switch to one of the configured cadences and return the new interval.
    pub fn switch_to(&self, cadence: Cadence) -> Duration {
        let mut intervals = self.inner.lock();
        let next = match cadence {
            Cadence::Normal => intervals.normal,
            Cadence::Fast => intervals.fast,
        };
        if intervals.current != next {
            debug!(?cadence, interval = ?next, "poll interval switched");
        }
        intervals.current = next;
        next
    }

    /// Explicit override of the current interval.
    ///
    /// The override holds until the next cadence switch.
    pub fn set_interval(&self, interval: Duration) {
        let mut intervals = self.inner.lock();
        debug!(from = ?intervals.current, to = ?interval, "poll interval overridden");
        intervals.current = interval;
    }
}
