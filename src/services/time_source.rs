//! Clock abstraction for request deadlines.
//!
//! Production code reads the system monotonic clock; tests drive a manual
//! clock so timeout behavior can be checked without sleeping.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Source of the current instant.
pub trait TimeSource: std::fmt::Debug {
    fn now(&self) -> Instant;

    /// Time elapsed since an earlier instant, saturating at zero.
    fn elapsed_since(&self, earlier: Instant) -> Duration {
        self.now().saturating_duration_since(earlier)
    }
}

/// Shared clock handle. The engine is single-threaded so `Rc` suffices.
pub type SharedTimeSource = Rc<dyn TimeSource>;

#[derive(Debug, Clone, Copy, Default)]
pub struct RealTimeSource;

impl RealTimeSource {
    pub fn new() -> Self {
        Self
    }

    pub fn shared() -> SharedTimeSource {
        Rc::new(Self)
    }
}

impl TimeSource for RealTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests.
///
/// `now()` is the instant of creation plus the logical time accumulated by
/// [`ManualTimeSource::advance`].
#[derive(Debug)]
pub struct ManualTimeSource {
    base_instant: Instant,
    logical_nanos: Cell<u64>,
}

impl Default for ManualTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualTimeSource {
    pub fn new() -> Self {
        Self {
            base_instant: Instant::now(),
            logical_nanos: Cell::new(0),
        }
    }

    pub fn shared() -> Rc<Self> {
        Rc::new(Self::new())
    }

    pub fn advance(&self, duration: Duration) {
        self.logical_nanos
            .set(self.logical_nanos.get() + duration.as_nanos() as u64);
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.logical_nanos.get())
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Instant {
        self.base_instant + self.elapsed()
    }
}
