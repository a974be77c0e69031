//! Trace replay through the monitor registry with periodic reports.
//!
//! Stands in for the interrupt router and the periodic poller of a live
//! deployment: trace events are routed to their monitor by name, and every
//! `report_interval` of trace time all monitors are polled.

use crate::trace::{Channel, TraceEvent};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, info, warn};
use twinpulse_common::config::DaemonConfig;
use twinpulse_common::error::TwinpulseResult;
use twinpulse_common::time::{duration_to_millis, Timestamp};
use twinpulse_core::{time_per_rotation, Measurement, MonitorHandle, PulseRegistry};

/// One direction of a monitor report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectionReport {
    /// Configured display label.
    pub label: String,
    /// Rotations in this direction since the previous report.
    pub count: u32,
    /// Average milliseconds per rotation, 0 when nothing was counted.
    pub ms_per_rotation: u64,
}

impl DirectionReport {
    fn new(label: &str, measurement: &Measurement) -> Self {
        Self {
            label: label.to_string(),
            count: measurement.counter,
            ms_per_rotation: time_per_rotation(measurement),
        }
    }
}

/// Polled values of one monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorReport {
    /// Monitor name.
    pub name: String,
    /// Left direction.
    pub left: DirectionReport,
    /// Right direction.
    pub right: DirectionReport,
}

/// All monitors polled at one instant of trace time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    /// Trace time of the poll.
    pub at: Timestamp,
    /// Per-monitor values.
    pub monitors: Vec<MonitorReport>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, m) in self.monitors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "[{}] {}: {} {} ({} ms/rot), {} {} ({} ms/rot)",
                self.at,
                m.name,
                m.left.label,
                m.left.count,
                m.left.ms_per_rotation,
                m.right.label,
                m.right.count,
                m.right.ms_per_rotation
            )?;
        }
        Ok(())
    }
}

/// Totals over a whole replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Events routed to a monitor.
    pub events: u64,
    /// Events naming an unknown monitor.
    pub skipped: u64,
    /// Reports produced.
    pub reports: u64,
}

/// Drives a registry from trace events.
pub struct Replayer {
    registry: PulseRegistry,
    handles: HashMap<String, MonitorHandle>,
    report_interval_ms: u32,
    reset_on_report: bool,
    last_report: Option<Timestamp>,
    last_event: Option<Timestamp>,
    unknown: HashSet<String>,
    summary: ReplaySummary,
}

impl Replayer {
    /// Register every configured monitor.
    ///
    /// # Errors
    ///
    /// Returns an error if a monitor configuration is invalid or duplicated.
    pub fn new(config: &DaemonConfig) -> TwinpulseResult<Self> {
        let mut registry = PulseRegistry::new();
        let mut handles = HashMap::new();
        for monitor in &config.monitors {
            let handle = registry.register(monitor.clone())?;
            handles.insert(monitor.name.clone(), handle);
        }

        Ok(Self {
            registry,
            handles,
            report_interval_ms: duration_to_millis(config.report_interval).max(1),
            reset_on_report: config.reset_on_report,
            last_report: None,
            last_event: None,
            unknown: HashSet::new(),
            summary: ReplaySummary::default(),
        })
    }

    /// Route one event, first emitting a report if an interval has passed.
    pub fn feed(&mut self, event: &TraceEvent) -> Option<Report> {
        let report = match self.last_report {
            None => {
                self.last_report = Some(event.at);
                None
            }
            Some(last) => {
                let elapsed = event.at.elapsed_since(last);
                if elapsed >= self.report_interval_ms {
                    // Align to the interval grid even when the trace skips several
                    let due = last.wrapping_add(elapsed - elapsed % self.report_interval_ms);
                    Some(self.report(due))
                } else {
                    None
                }
            }
        };

        self.route(event);
        self.last_event = Some(event.at);
        report
    }

    /// Final report at the time of the last event.
    pub fn finish(&mut self) -> Report {
        let at = self.last_event.unwrap_or(Timestamp::ZERO);
        let report = self.report(at);

        for (handle, config, state) in self.registry.iter() {
            let stats = state.stats();
            info!(
                %handle,
                monitor = %config.name,
                accepted = stats.primary_accepted,
                debounced = stats.primary_debounced,
                counted = stats.counted,
                ambiguous = stats.ambiguous,
                stale = stats.stale,
                rebaselined = stats.rebaselined,
                "monitor edge statistics"
            );
        }
        report
    }

    /// Replay totals so far.
    #[must_use]
    pub fn summary(&self) -> ReplaySummary {
        self.summary
    }

    fn route(&mut self, event: &TraceEvent) {
        let Some(&handle) = self.handles.get(&event.monitor) else {
            if self.unknown.insert(event.monitor.clone()) {
                warn!(line = event.line, monitor = %event.monitor, "edge for unknown monitor skipped");
            }
            self.summary.skipped += 1;
            return;
        };

        let routed = match event.channel {
            Channel::Primary => self
                .registry
                .on_primary_edge(handle, event.at)
                .map(|outcome| debug!(line = event.line, ?outcome, "primary")),
            Channel::Secondary => self
                .registry
                .on_secondary_edge(handle, event.at)
                .map(|outcome| debug!(line = event.line, ?outcome, "secondary")),
        };
        match routed {
            Ok(()) => self.summary.events += 1,
            Err(e) => {
                warn!(line = event.line, error = %e, "edge routing failed");
                self.summary.skipped += 1;
            }
        }
    }

    fn report(&mut self, at: Timestamp) -> Report {
        let monitors = self
            .registry
            .iter()
            .map(|(_, config, state)| {
                let values = state.values(self.reset_on_report);
                MonitorReport {
                    name: config.name.clone(),
                    left: DirectionReport::new(&config.left_label, &values.left),
                    right: DirectionReport::new(&config.right_label, &values.right),
                }
            })
            .collect();

        self.last_report = Some(at);
        self.summary.reports += 1;
        Report { at, monitors }
    }
}
