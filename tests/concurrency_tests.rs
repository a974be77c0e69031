//! Concurrency tests: edge handlers and a poller on separate threads.
//!
//! Each mechanism gets one thread per channel plus a shared poller, the way
//! interrupt callbacks and a periodic reader would drive a live monitor.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use twinpulse_common::config::MonitorConfig;
use twinpulse_common::time::Timestamp;
use twinpulse_core::{PrimaryEdge, PulseRegistry, SharedPulseState};

const ROTATIONS: u32 = 2_000;
const PERIOD_MS: u32 = 100;

/// Drive one monitor with strictly alternating edges from two threads.
///
/// A shared step counter hands the turn back and forth so timestamps stay
/// monotonic while still crossing threads on every edge.
fn drive(state: &Arc<SharedPulseState>, secondary_offset: u32) {
    let step = Arc::new(AtomicU32::new(0));
    let start = Arc::new(Barrier::new(2));

    let primary = {
        let state = Arc::clone(state);
        let step = Arc::clone(&step);
        let start = Arc::clone(&start);
        thread::spawn(move || {
            start.wait();
            // Seeding edge plus one closing edge per rotation
            for i in 0..=ROTATIONS {
                while step.load(Ordering::Acquire) != 2 * i {
                    std::hint::spin_loop();
                }
                state.on_primary_edge(Timestamp(1_000 + i * PERIOD_MS));
                step.fetch_add(1, Ordering::AcqRel);
            }
        })
    };

    let secondary = {
        let state = Arc::clone(state);
        let step = Arc::clone(&step);
        thread::spawn(move || {
            start.wait();
            for i in 0..ROTATIONS {
                while step.load(Ordering::Acquire) != 2 * i + 1 {
                    std::hint::spin_loop();
                }
                state.on_secondary_edge(Timestamp(1_000 + i * PERIOD_MS + secondary_offset));
                step.fetch_add(1, Ordering::AcqRel);
            }
        })
    };

    primary.join().unwrap();
    secondary.join().unwrap();
}

#[test]
fn test_alternating_threads_count_every_rotation() {
    let state = Arc::new(SharedPulseState::default());
    drive(&state, 20);

    let values = state.take_values();
    assert_eq!(values.right.counter, ROTATIONS);
    assert_eq!(values.left.counter, 0);
    assert_eq!(values.right.elapsed_time, u64::from(ROTATIONS * PERIOD_MS));
}

#[test]
fn test_concurrent_poller_sees_each_rotation_once() {
    let state = Arc::new(SharedPulseState::default());
    let done = Arc::new(AtomicBool::new(false));

    let poller = {
        let state = Arc::clone(&state);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut left = 0u64;
            let mut elapsed = 0u64;
            while !done.load(Ordering::Acquire) {
                let values = state.values(true);
                left += u64::from(values.left.counter);
                elapsed += values.left.elapsed_time;
                thread::yield_now();
            }
            let values = state.values(true);
            (
                left + u64::from(values.left.counter),
                elapsed + values.left.elapsed_time,
            )
        })
    };

    drive(&state, 80);
    done.store(true, Ordering::Release);
    let (left, elapsed) = poller.join().unwrap();

    assert_eq!(left, u64::from(ROTATIONS));
    assert_eq!(elapsed, u64::from(ROTATIONS * PERIOD_MS));
}

#[test]
fn test_independent_monitors_in_parallel() {
    let mut registry = PulseRegistry::new();
    let handles: Vec<_> = (0..4)
        .map(|i| registry.register(MonitorConfig::named(format!("rotor-{i}"))).unwrap())
        .collect();

    let workers: Vec<_> = handles
        .iter()
        .enumerate()
        .map(|(i, &handle)| {
            let state = registry.get(handle).unwrap();
            // Even monitors turn right, odd ones left
            let offset = if i % 2 == 0 { 10 } else { 90 };
            thread::spawn(move || drive(&state, offset))
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    for (i, &handle) in handles.iter().enumerate() {
        let values = registry.values(handle, false).unwrap();
        if i % 2 == 0 {
            assert_eq!(values.right.counter, ROTATIONS, "monitor {i}");
            assert_eq!(values.left.counter, 0, "monitor {i}");
        } else {
            assert_eq!(values.left.counter, ROTATIONS, "monitor {i}");
            assert_eq!(values.right.counter, 0, "monitor {i}");
        }
    }
}

#[test]
fn test_racing_primaries_are_serialized() {
    // Many threads firing primary edges at the same instant: exactly one can
    // be accepted, the rest fall inside its debounce window
    let state = Arc::new(SharedPulseState::default());
    state.on_primary_edge(Timestamp(1_000));

    let barrier = Arc::new(Barrier::new(8));
    let workers: Vec<_> = (0..8)
        .map(|_| {
            let state = Arc::clone(&state);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                state.on_primary_edge(Timestamp(1_100))
            })
        })
        .collect();

    let outcomes: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    let debounced = outcomes
        .iter()
        .filter(|o| **o == PrimaryEdge::Debounced)
        .count();
    assert_eq!(debounced, 7);
    assert_eq!(state.stats().primary_accepted, 2);
}
