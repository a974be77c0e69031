//! Mutually exclusive access to a pulse state machine.
//!
//! Edge handlers for both channels and the polling reader run from
//! unrelated contexts (interrupt callbacks, GPIO threads, a periodic
//! reporter). [`SharedPulseState`] serializes them behind a mutex so exactly
//! one of them touches the state at a time. Every critical section is a
//! handful of integer operations.

use crate::measurement::Values;
use crate::pulse::{EdgeEvent, EdgeOutcome, EdgeStats, PrimaryEdge, PulseState, SecondaryEdge};
use std::sync::{Mutex, MutexGuard, PoisonError};
use twinpulse_common::config::PulseConfig;
use twinpulse_common::time::{Clock, Timestamp};

/// A [`PulseState`] that can be driven from several threads.
#[derive(Debug, Default)]
pub struct SharedPulseState {
    inner: Mutex<PulseState>,
}

impl SharedPulseState {
    /// Wrap a tracker with the given thresholds.
    #[must_use]
    pub fn new(config: PulseConfig) -> Self {
        Self::from_state(PulseState::with_config(config))
    }

    /// Wrap an existing tracker.
    #[must_use]
    pub fn from_state(state: PulseState) -> Self {
        Self {
            inner: Mutex::new(state),
        }
    }

    /// See [`PulseState::on_primary_edge`].
    pub fn on_primary_edge(&self, now: Timestamp) -> PrimaryEdge {
        self.lock().on_primary_edge(now)
    }

    /// See [`PulseState::on_secondary_edge`].
    pub fn on_secondary_edge(&self, now: Timestamp) -> SecondaryEdge {
        self.lock().on_secondary_edge(now)
    }

    /// Primary edge stamped with the clock's current time.
    ///
    /// The clock is read inside the critical section so timestamps reach
    /// the state machine in order.
    pub fn on_primary_edge_now(&self, clock: &dyn Clock) -> PrimaryEdge {
        let mut state = self.lock();
        state.on_primary_edge(clock.now())
    }

    /// Secondary edge stamped with the clock's current time.
    pub fn on_secondary_edge_now(&self, clock: &dyn Clock) -> SecondaryEdge {
        let mut state = self.lock();
        state.on_secondary_edge(clock.now())
    }

    /// See [`PulseState::apply`].
    pub fn apply(&self, event: EdgeEvent) -> EdgeOutcome {
        self.lock().apply(event)
    }

    /// Snapshot of the accumulated values, reset atomically with the read
    /// when `reset` is true.
    pub fn values(&self, reset: bool) -> Values {
        self.lock().values(reset)
    }

    /// Snapshot without reset.
    pub fn peek_values(&self) -> Values {
        self.lock().peek_values()
    }

    /// Snapshot and reset.
    pub fn take_values(&self) -> Values {
        self.lock().take_values()
    }

    /// Diagnostic edge counters.
    pub fn stats(&self) -> EdgeStats {
        self.lock().stats()
    }

    /// Current thresholds.
    pub fn config(&self) -> PulseConfig {
        *self.lock().config()
    }

    /// Return the tracker to its freshly created state.
    pub fn reset(&self) {
        self.lock().reset();
    }

    /// Replace the thresholds and reset.
    pub fn reconfigure(&self, config: PulseConfig) {
        self.lock().reconfigure(config);
    }

    /// Copy of the whole tracker, for diagnostics.
    pub fn snapshot(&self) -> PulseState {
        self.lock().clone()
    }

    // No operation can panic between field updates, so a poisoned guard
    // still holds a consistent state.
    fn lock(&self) -> MutexGuard<'_, PulseState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::Direction;
    use std::sync::Arc;
    use std::thread;
    use twinpulse_common::time::ManualClock;

    #[test]
    fn test_shared_rotation() {
        let shared = SharedPulseState::new(PulseConfig::default());
        assert_eq!(shared.on_primary_edge(Timestamp(1_000)), PrimaryEdge::Seeded);
        shared.on_secondary_edge(Timestamp(1_080));
        assert_eq!(
            shared.on_primary_edge(Timestamp(1_100)),
            PrimaryEdge::Counted {
                direction: Direction::Left,
                pulse_time: 100
            }
        );

        assert_eq!(shared.peek_values().left.counter, 1);
        assert_eq!(shared.values(true).left.counter, 1);
        assert!(shared.values(false).is_empty());
    }

    #[test]
    fn test_clock_stamped_edges() {
        let clock = ManualClock::new(Timestamp(2_000));
        let shared = SharedPulseState::default();

        shared.on_primary_edge_now(&clock);
        clock.advance(25);
        shared.on_secondary_edge_now(&clock);
        clock.advance(75);
        assert_eq!(
            shared.on_primary_edge_now(&clock),
            PrimaryEdge::Counted {
                direction: Direction::Right,
                pulse_time: 100
            }
        );
    }

    #[test]
    fn test_reset_and_reconfigure() {
        let shared = SharedPulseState::default();
        shared.on_primary_edge(Timestamp(1_000));
        assert!(shared.snapshot().is_active());

        shared.reset();
        assert!(!shared.snapshot().is_active());

        let config = PulseConfig {
            debounce: std::time::Duration::from_millis(3),
            ..PulseConfig::default()
        };
        shared.reconfigure(config);
        assert_eq!(shared.config(), config);
        assert_eq!(shared.stats(), EdgeStats::default());
    }

    #[test]
    fn test_survives_poisoned_lock() {
        let shared = Arc::new(SharedPulseState::default());
        shared.on_primary_edge(Timestamp(1_000));

        let poisoner = Arc::clone(&shared);
        let result = thread::spawn(move || {
            let _guard = poisoner.inner.lock().unwrap();
            panic!("poison the lock");
        })
        .join();
        assert!(result.is_err());

        shared.on_secondary_edge(Timestamp(1_030));
        assert!(matches!(
            shared.on_primary_edge(Timestamp(1_100)),
            PrimaryEdge::Counted { .. }
        ));
    }

    #[test]
    fn test_poll_while_edges_arrive() {
        let shared = Arc::new(SharedPulseState::default());
        shared.on_primary_edge(Timestamp(100));

        let writer = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                let mut t = 100u32;
                for _ in 0..1_000 {
                    shared.on_secondary_edge(Timestamp(t + 20));
                    t += 100;
                    shared.on_primary_edge(Timestamp(t));
                }
            })
        };

        let mut polled = 0u64;
        while !writer.is_finished() {
            polled += shared.take_values().total_rotations();
        }
        writer.join().unwrap();
        polled += shared.take_values().total_rotations();

        // Every rotation is seen by exactly one poll
        assert_eq!(polled, 1_000);
    }
}
