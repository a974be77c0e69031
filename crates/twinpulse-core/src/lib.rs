//! Rotation direction and rate from two asynchronous pulse streams.
//!
//! This crate provides:
//!
//! - **State machine** ([`pulse`]): [`PulseState`] classifies each
//!   primary-to-primary interval as left or right from where the secondary
//!   edge fell
//! - **Measurements** ([`measurement`]): per-direction counters and the
//!   [`safe_average`] / [`time_per_rotation`] helpers
//! - **Shared access** ([`shared`]): [`SharedPulseState`], a mutex-guarded
//!   tracker for edge handlers and pollers on different threads
//! - **Registry** ([`registry`]): [`PulseRegistry`], an arena of monitors
//!   addressed by [`MonitorHandle`]
//!
//! # Example
//!
//! ```
//! use twinpulse_common::config::MonitorConfig;
//! use twinpulse_common::time::Timestamp;
//! use twinpulse_core::{time_per_rotation, PulseRegistry};
//!
//! let mut registry = PulseRegistry::new();
//! let wheel = registry.register(MonitorConfig::named("wheel")).unwrap();
//!
//! registry.on_primary_edge(wheel, Timestamp(1_000)).unwrap();
//! registry.on_secondary_edge(wheel, Timestamp(1_020)).unwrap();
//! registry.on_primary_edge(wheel, Timestamp(1_120)).unwrap();
//!
//! let values = registry.values(wheel, true).unwrap();
//! assert_eq!(values.right.counter, 1);
//! assert_eq!(time_per_rotation(&values.right), 120);
//! ```

pub mod measurement;
pub mod pulse;
pub mod registry;
pub mod shared;

// Re-export main types for convenience
pub use measurement::{safe_average, time_per_rotation, Direction, Measurement, Values};
pub use pulse::{EdgeEvent, EdgeOutcome, EdgeStats, PrimaryEdge, PulseState, SecondaryEdge};
pub use registry::{MonitorHandle, PulseRegistry};
pub use shared::SharedPulseState;
