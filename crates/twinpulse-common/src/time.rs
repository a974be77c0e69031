//! Millisecond time base for edge timestamps.
//!
//! Edge timestamps come from a free-running millisecond counter that wraps
//! at `u32::MAX`. All interval arithmetic is modular: an interval is
//! `later - earlier` computed with wrapping subtraction, so a wrap between
//! two edges still yields the true (short) interval.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// Monotonic millisecond timestamp in a wrapping `u32` space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u32);

impl Timestamp {
    /// The zero timestamp, used as the initial "unset" value.
    pub const ZERO: Self = Self(0);

    /// Create a timestamp from a raw millisecond count.
    #[must_use]
    pub const fn from_millis(ms: u32) -> Self {
        Self(ms)
    }

    /// Raw millisecond count.
    #[must_use]
    pub const fn as_millis(self) -> u32 {
        self.0
    }

    /// Milliseconds elapsed from `earlier` to `self`, modulo 2^32.
    ///
    /// A timestamp that is actually older than `earlier` yields a large
    /// wrapped value rather than a negative one.
    #[must_use]
    pub const fn elapsed_since(self, earlier: Timestamp) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// Advance the timestamp by `ms`, wrapping at `u32::MAX`.
    #[must_use]
    pub const fn wrapping_add(self, ms: u32) -> Self {
        Self(self.0.wrapping_add(ms))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

impl From<u32> for Timestamp {
    fn from(ms: u32) -> Self {
        Self(ms)
    }
}

/// Convert a duration to whole milliseconds, saturating at `u32::MAX`.
#[must_use]
pub fn duration_to_millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

/// Source of edge timestamps.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> Timestamp;
}

/// Clock counting milliseconds since its creation, truncated to `u32`.
///
/// Wraps after roughly 49.7 days, like a hardware millisecond counter.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Start a clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[allow(clippy::cast_possible_truncation)] // truncation is the wrap
    fn now(&self) -> Timestamp {
        Timestamp(self.origin.elapsed().as_millis() as u32)
    }
}

/// Manually driven clock for replay and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU32,
}

impl ManualClock {
    /// Create a clock reading `start`.
    #[must_use]
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicU32::new(start.0),
        }
    }

    /// Set the current time.
    pub fn set(&self, now: Timestamp) {
        self.now.store(now.0, Ordering::Release);
    }

    /// Advance the current time by `ms`, wrapping.
    pub fn advance(&self, ms: u32) {
        // fetch_add on atomics wraps on overflow
        self.now.fetch_add(ms, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.now.load(Ordering::Acquire))
    }
}
