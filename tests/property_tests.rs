//! Property tests for the pulse state machine.
//!
//! Edge sequences are generated as (channel, delay) pairs starting from a
//! fixed origin, so intervals cover the debounce window, normal rotation
//! and occasional inactivity gaps.

use proptest::prelude::*;
use twinpulse_common::time::Timestamp;
use twinpulse_core::{
    safe_average, time_per_rotation, Direction, EdgeEvent, EdgeOutcome, Measurement, PrimaryEdge,
    PulseState,
};

const DEBOUNCE_MS: u32 = 10;
const INACTIVITY_TIMEOUT_MS: u32 = 50_000;

fn delay() -> impl Strategy<Value = u32> {
    prop_oneof![
        8 => 0u32..=40,
        8 => 40u32..=400,
        1 => 49_990u32..=50_010,
        1 => 50_001u32..=200_000,
    ]
}

fn edges() -> impl Strategy<Value = Vec<(bool, u32)>> {
    prop::collection::vec((any::<bool>(), delay()), 0..200)
}

fn to_events(origin: u32, edges: &[(bool, u32)]) -> Vec<EdgeEvent> {
    let mut t = Timestamp(origin);
    edges
        .iter()
        .map(|&(primary, delay)| {
            t = t.wrapping_add(delay);
            if primary {
                EdgeEvent::Primary(t)
            } else {
                EdgeEvent::Secondary(t)
            }
        })
        .collect()
}

fn run(state: &mut PulseState, events: &[EdgeEvent]) -> Vec<EdgeOutcome> {
    events.iter().map(|&event| state.apply(event)).collect()
}

proptest! {
    #[test]
    fn counted_never_exceeds_accepted_minus_one(edges in edges()) {
        let mut state = PulseState::new();
        let outcomes = run(&mut state, &to_events(1_000, &edges));

        let accepted = outcomes
            .iter()
            .filter(|o| matches!(o, EdgeOutcome::Primary(p) if *p != PrimaryEdge::Debounced))
            .count() as u64;
        let counted = state.peek_values().total_rotations();

        prop_assert!(counted <= accepted.saturating_sub(1));
        prop_assert_eq!(counted, state.stats().counted);
    }

    #[test]
    fn polling_without_reset_is_idempotent(edges in edges()) {
        let mut state = PulseState::new();
        run(&mut state, &to_events(1_000, &edges));

        let first = state.values(false);
        prop_assert_eq!(state.values(false), first);
        prop_assert_eq!(state.values(false), first);
    }

    #[test]
    fn reset_then_peek_is_zero(edges in edges()) {
        let mut state = PulseState::new();
        run(&mut state, &to_events(1_000, &edges));

        let before = state.peek_values();
        prop_assert_eq!(state.values(true), before);
        prop_assert!(state.values(false).is_empty());
    }

    #[test]
    fn bounce_changes_nothing(edges in edges(), bounce in 0u32..DEBOUNCE_MS) {
        let mut state = PulseState::new();
        run(&mut state, &to_events(1_000, &edges));

        let values = state.peek_values();
        let primary = state.last_primary_time();
        let secondary = state.last_secondary_time();
        let active = state.is_active();

        let outcome = state.on_primary_edge(primary.wrapping_add(bounce));
        prop_assert_eq!(outcome, PrimaryEdge::Debounced);
        prop_assert_eq!(state.peek_values(), values);
        prop_assert_eq!(state.last_primary_time(), primary);
        prop_assert_eq!(state.last_secondary_time(), secondary);
        prop_assert_eq!(state.is_active(), active);
    }

    #[test]
    fn late_edge_never_counts_and_reseeds(
        edges in edges(),
        gap in (INACTIVITY_TIMEOUT_MS + 1)..=u32::MAX - DEBOUNCE_MS,
    ) {
        let mut state = PulseState::new();
        run(&mut state, &to_events(1_000, &edges));

        let values = state.peek_values();
        let now = state.last_primary_time().wrapping_add(gap);

        prop_assert_eq!(state.on_primary_edge(now), PrimaryEdge::Stale);
        prop_assert_eq!(state.peek_values(), values);
        prop_assert_eq!(state.last_primary_time(), now);
        prop_assert_eq!(state.last_secondary_time(), now);
    }

    #[test]
    fn direction_follows_nearer_primary(
        start in 1_000u32..2_000_000,
        first in 1u32..25_000,
        second in 0u32..25_000,
    ) {
        prop_assume!(first + second >= DEBOUNCE_MS);

        let mut state = PulseState::new();
        state.on_primary_edge(Timestamp(start - 500));
        state.on_primary_edge(Timestamp(start));
        state.on_secondary_edge(Timestamp(start + first));
        let outcome = state.on_primary_edge(Timestamp(start + first + second));

        let expected = if first > second { Direction::Left } else { Direction::Right };
        prop_assert_eq!(
            outcome,
            PrimaryEdge::Counted { direction: expected, pulse_time: first + second }
        );
    }

    #[test]
    fn behaviour_is_invariant_under_wrap(edges in edges(), offset in any::<u32>()) {
        // Two leading primaries 100 ms apart leave both trackers active with
        // equal relative baselines, whatever the absolute origin
        let mut prefixed = vec![(true, 0), (true, 100)];
        prefixed.extend(edges);

        let mut plain = PulseState::new();
        let mut shifted = PulseState::new();
        let plain_out = run(&mut plain, &to_events(1_000, &prefixed));
        let shifted_out = run(&mut shifted, &to_events(1_000u32.wrapping_add(offset), &prefixed));

        prop_assert_eq!(&plain_out[2..], &shifted_out[2..]);
        prop_assert_eq!(plain.peek_values(), shifted.peek_values());
    }

    #[test]
    fn average_is_bounded(elapsed in any::<u64>(), counter in any::<u32>()) {
        let average = safe_average(elapsed, counter);
        prop_assert!(average <= elapsed);
        if counter == 0 {
            prop_assert_eq!(average, 0);
        }
        let m = Measurement { counter, elapsed_time: elapsed };
        prop_assert_eq!(time_per_rotation(&m), average);
    }
}
