//! Dual-channel pulse timing state machine.
//!
//! A rotating mechanism carries two sensors placed asymmetrically around
//! its circumference. Each revolution produces one edge on the *primary*
//! channel and one on the *secondary* channel. Rotations are measured
//! primary-to-primary; where the secondary edge falls inside that interval
//! tells the direction.
//!
//! # Timing Diagram
//!
//! ```text
//! primary    |                   |                   |
//!            +-------------------+-------------------+----
//! secondary        |                         |
//!            ------+-------------------------+-----------
//!            |first| second      |  first    |second |
//!            |<--->|<----------->|<--------->|<----->|
//!                  => right            => left
//! ```
//!
//! The state machine keeps only the last primary and secondary timestamps.
//! Equal timestamps mean "no secondary edge seen since the primary
//! baseline"; an interval without a secondary edge is dropped.

use crate::measurement::{Direction, Values};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use twinpulse_common::config::PulseConfig;
use twinpulse_common::time::Timestamp;

/// Result of feeding a primary edge to [`PulseState::on_primary_edge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryEdge {
    /// Edge arrived within the debounce window and was ignored entirely.
    Debounced,
    /// First accepted edge; it only establishes the baseline.
    Seeded,
    /// A rotation was counted.
    Counted {
        /// Classified direction.
        direction: Direction,
        /// Primary-to-primary interval in milliseconds.
        pulse_time: u32,
    },
    /// No secondary edge since the baseline; the interval was dropped.
    Ambiguous,
    /// Interval exceeded the inactivity timeout; baseline restarted.
    Stale,
}

/// Result of feeding a secondary edge to [`PulseState::on_secondary_edge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondaryEdge {
    /// First secondary edge of the interval; timestamp recorded.
    Recorded,
    /// A secondary edge was already recorded in this interval, so the
    /// mechanism is assumed to have reversed. The primary baseline moved to
    /// this edge.
    Rebaselined,
}

/// An edge on either channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "at", rename_all = "snake_case")]
pub enum EdgeEvent {
    /// Primary channel edge.
    Primary(Timestamp),
    /// Secondary channel edge.
    Secondary(Timestamp),
}

impl EdgeEvent {
    /// Timestamp of the edge.
    #[must_use]
    pub fn at(&self) -> Timestamp {
        match self {
            Self::Primary(at) | Self::Secondary(at) => *at,
        }
    }
}

/// Result of [`PulseState::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    /// Outcome of a primary edge.
    Primary(PrimaryEdge),
    /// Outcome of a secondary edge.
    Secondary(SecondaryEdge),
}

/// Diagnostic edge counters.
///
/// Unlike [`Values`], these are not cleared when values are polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EdgeStats {
    /// Primary edges that passed the debounce filter.
    pub primary_accepted: u64,
    /// Primary edges discarded by the debounce filter.
    pub primary_debounced: u64,
    /// Accepted primary edges that only seeded the baseline.
    pub seeded: u64,
    /// Accepted primary edges that counted a rotation.
    pub counted: u64,
    /// Accepted primary edges dropped for lack of a secondary edge.
    pub ambiguous: u64,
    /// Accepted primary edges that arrived after the inactivity timeout.
    pub stale: u64,
    /// Secondary edges seen.
    pub secondary: u64,
    /// Secondary edges that moved the primary baseline.
    pub rebaselined: u64,
}

impl EdgeStats {
    fn record_primary(&mut self, outcome: PrimaryEdge) {
        let slot = match outcome {
            PrimaryEdge::Debounced => {
                self.primary_debounced = self.primary_debounced.saturating_add(1);
                return;
            }
            PrimaryEdge::Seeded => &mut self.seeded,
            PrimaryEdge::Counted { .. } => &mut self.counted,
            PrimaryEdge::Ambiguous => &mut self.ambiguous,
            PrimaryEdge::Stale => &mut self.stale,
        };
        *slot = slot.saturating_add(1);
        self.primary_accepted = self.primary_accepted.saturating_add(1);
    }

    fn record_secondary(&mut self, outcome: SecondaryEdge) {
        self.secondary = self.secondary.saturating_add(1);
        if outcome == SecondaryEdge::Rebaselined {
            self.rebaselined = self.rebaselined.saturating_add(1);
        }
    }
}

/// Rotation direction and rate tracker for one mechanism.
///
/// Both timestamps start at zero, so with the default 10 ms debounce a
/// primary edge stamped below 10 ms is discarded, and one stamped after the
/// inactivity timeout neither counts nor activates the tracker.
///
/// # Example
///
/// ```
/// use twinpulse_common::time::Timestamp;
/// use twinpulse_core::measurement::Direction;
/// use twinpulse_core::pulse::{PrimaryEdge, PulseState};
///
/// let mut state = PulseState::new();
///
/// // First primary edge only seeds the baseline
/// assert_eq!(state.on_primary_edge(Timestamp(1_000)), PrimaryEdge::Seeded);
///
/// // Secondary early in the interval, closing primary far away: right
/// state.on_secondary_edge(Timestamp(1_030));
/// assert_eq!(
///     state.on_primary_edge(Timestamp(1_100)),
///     PrimaryEdge::Counted { direction: Direction::Right, pulse_time: 100 }
/// );
///
/// // Secondary late in the interval: left
/// state.on_secondary_edge(Timestamp(1_180));
/// state.on_primary_edge(Timestamp(1_200));
///
/// let values = state.take_values();
/// assert_eq!(values.right.counter, 1);
/// assert_eq!(values.left.counter, 1);
/// assert!(state.peek_values().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct PulseState {
    config: PulseConfig,
    debounce_ms: u32,
    inactivity_timeout_ms: u32,
    running_values: Values,
    last_primary_time: Timestamp,
    last_secondary_time: Timestamp,
    active: bool,
    stats: EdgeStats,
}

impl Default for PulseState {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseState {
    /// Create a tracker with the default thresholds.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(PulseConfig::default())
    }

    /// Create a tracker with the given thresholds.
    ///
    /// The configuration is expected to have passed
    /// [`PulseConfig::validate`]; out-of-range durations saturate.
    #[must_use]
    pub fn with_config(config: PulseConfig) -> Self {
        Self {
            config,
            debounce_ms: config.debounce_ms(),
            inactivity_timeout_ms: config.inactivity_timeout_ms(),
            running_values: Values::default(),
            last_primary_time: Timestamp::ZERO,
            last_secondary_time: Timestamp::ZERO,
            active: false,
            stats: EdgeStats::default(),
        }
    }

    /// Handle an edge on the primary channel at `now`.
    pub fn on_primary_edge(&mut self, now: Timestamp) -> PrimaryEdge {
        let pulse_time = now.elapsed_since(self.last_primary_time);

        let outcome = if pulse_time < self.debounce_ms {
            PrimaryEdge::Debounced
        } else if pulse_time <= self.inactivity_timeout_ms {
            if !self.active {
                self.active = true;
                PrimaryEdge::Seeded
            } else if self.last_primary_time != self.last_secondary_time {
                let direction = self.classify(now);
                self.running_values.get_mut(direction).record(pulse_time);
                PrimaryEdge::Counted {
                    direction,
                    pulse_time,
                }
            } else {
                PrimaryEdge::Ambiguous
            }
        } else {
            debug!(%now, pulse_time, "primary edge after inactivity timeout, restarting baseline");
            PrimaryEdge::Stale
        };

        if outcome != PrimaryEdge::Debounced {
            self.last_primary_time = now;
            self.last_secondary_time = now;
        }

        self.stats.record_primary(outcome);
        trace!(%now, ?outcome, "primary edge");
        outcome
    }

    /// Handle an edge on the secondary channel at `now`.
    pub fn on_secondary_edge(&mut self, now: Timestamp) -> SecondaryEdge {
        let outcome = if self.last_secondary_time == self.last_primary_time {
            SecondaryEdge::Recorded
        } else {
            // Second secondary edge before any primary: treat as a reversal
            debug!(%now, previous = %self.last_secondary_time, "repeated secondary edge, moving primary baseline");
            self.last_primary_time = now;
            SecondaryEdge::Rebaselined
        };
        self.last_secondary_time = now;

        self.stats.record_secondary(outcome);
        trace!(%now, ?outcome, "secondary edge");
        outcome
    }

    /// Dispatch an edge event to the matching handler.
    pub fn apply(&mut self, event: EdgeEvent) -> EdgeOutcome {
        match event {
            EdgeEvent::Primary(at) => EdgeOutcome::Primary(self.on_primary_edge(at)),
            EdgeEvent::Secondary(at) => EdgeOutcome::Secondary(self.on_secondary_edge(at)),
        }
    }

    /// Copy of the accumulated values, zeroing them when `reset` is true.
    ///
    /// Timing state is left untouched either way.
    pub fn values(&mut self, reset: bool) -> Values {
        if reset {
            self.take_values()
        } else {
            self.running_values
        }
    }

    /// Copy of the accumulated values without resetting them.
    #[must_use]
    pub fn peek_values(&self) -> Values {
        self.running_values
    }

    /// Accumulated values, leaving zeroed accumulators behind.
    pub fn take_values(&mut self) -> Values {
        std::mem::take(&mut self.running_values)
    }

    /// Return to the freshly created state, keeping the configuration.
    pub fn reset(&mut self) {
        *self = Self::with_config(self.config);
    }

    /// Replace the thresholds and reset.
    pub fn reconfigure(&mut self, config: PulseConfig) {
        *self = Self::with_config(config);
    }

    /// Current thresholds.
    #[must_use]
    pub fn config(&self) -> &PulseConfig {
        &self.config
    }

    /// Diagnostic edge counters.
    #[must_use]
    pub fn stats(&self) -> EdgeStats {
        self.stats
    }

    /// True once a primary edge has seeded the baseline.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Start of the current primary interval.
    #[must_use]
    pub fn last_primary_time(&self) -> Timestamp {
        self.last_primary_time
    }

    /// Time of the last secondary edge, or the primary baseline if none
    /// was seen this interval.
    #[must_use]
    pub fn last_secondary_time(&self) -> Timestamp {
        self.last_secondary_time
    }

    /// Direction of the interval closing at `now`.
    ///
    /// Ties go right.
    fn classify(&self, now: Timestamp) -> Direction {
        let first_stretch = self.last_secondary_time.elapsed_since(self.last_primary_time);
        let second_stretch = now.elapsed_since(self.last_secondary_time);
        if first_stretch > second_stretch {
            Direction::Left
        } else {
            Direction::Right
        }
    }
}
