//! Per-direction rotation accumulators and aggregation helpers.
//!
//! A [`Measurement`] counts rotations in one direction together with the
//! summed duration of those rotations. [`Values`] pairs the two directions
//! and is what a pulse state machine hands out on each poll.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Rotation direction.
///
/// The labels are arbitrary: a rotation is "left" when the secondary edge
/// fell closer to the closing primary edge than to the opening one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Primary→secondary stretch strictly longer than secondary→primary.
    Left,
    /// Primary→secondary stretch not longer than secondary→primary.
    Right,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
        }
    }
}

/// Rotations counted in one direction since the last reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Measurement {
    /// Number of completed rotations.
    pub counter: u32,
    /// Sum of the counted rotations' durations in milliseconds.
    pub elapsed_time: u64,
}

impl Measurement {
    /// Record one rotation that took `pulse_time` milliseconds.
    pub fn record(&mut self, pulse_time: u32) {
        self.counter = self.counter.saturating_add(1);
        self.elapsed_time = self.elapsed_time.saturating_add(u64::from(pulse_time));
    }

    /// Average milliseconds per rotation, or 0 when nothing was counted.
    #[must_use]
    pub fn time_per_rotation(&self) -> u64 {
        time_per_rotation(self)
    }

    /// Returns true if no rotation has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counter == 0 && self.elapsed_time == 0
    }
}

/// Accumulated measurements for both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Values {
    /// Rotations classified as left.
    pub left: Measurement,
    /// Rotations classified as right.
    pub right: Measurement,
}

impl Values {
    /// Measurement for one direction.
    #[must_use]
    pub fn get(&self, direction: Direction) -> &Measurement {
        match direction {
            Direction::Left => &self.left,
            Direction::Right => &self.right,
        }
    }

    /// Mutable measurement for one direction.
    pub fn get_mut(&mut self, direction: Direction) -> &mut Measurement {
        match direction {
            Direction::Left => &mut self.left,
            Direction::Right => &mut self.right,
        }
    }

    /// Total rotations in both directions.
    #[must_use]
    pub fn total_rotations(&self) -> u64 {
        u64::from(self.left.counter) + u64::from(self.right.counter)
    }

    /// Returns true if neither direction has recorded anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.right.is_empty()
    }
}

/// Divide `elapsed_time` by `counter`, returning 0 for a zero counter.
#[must_use]
pub fn safe_average(elapsed_time: u64, counter: u32) -> u64 {
    if counter == 0 {
        0
    } else {
        elapsed_time / u64::from(counter)
    }
}

/// Average milliseconds per rotation of a measurement.
#[must_use]
pub fn time_per_rotation(measurement: &Measurement) -> u64 {
    safe_average(measurement.elapsed_time, measurement.counter)
}
