//! Arena of pulse monitors addressed by generational handles.
//!
//! Edge routing looks up the monitor for an incoming edge by
//! [`MonitorHandle`] and calls it directly. Any number of monitors can be
//! live at once. Removing a monitor bumps its slot generation, so handles
//! held by a router that missed the removal resolve to nothing instead of
//! to whichever monitor reuses the slot.

use crate::measurement::Values;
use crate::pulse::{PrimaryEdge, SecondaryEdge};
use crate::shared::SharedPulseState;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use twinpulse_common::config::{MonitorConfig, PulseConfig};
use twinpulse_common::error::{TwinpulseError, TwinpulseResult};
use twinpulse_common::time::Timestamp;

/// Stable identifier of a registered monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonitorHandle {
    index: u32,
    generation: u32,
}

impl MonitorHandle {
    /// Slot index.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Slot generation this handle was issued for.
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    fn unknown(self) -> TwinpulseError {
        TwinpulseError::UnknownMonitor {
            index: self.index,
            generation: self.generation,
        }
    }
}

impl fmt::Display for MonitorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Monitor {
    config: MonitorConfig,
    state: Arc<SharedPulseState>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    monitor: Option<Monitor>,
}

/// Owner of all monitors.
#[derive(Debug, Default)]
pub struct PulseRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl PulseRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a monitor and return its handle.
    ///
    /// # Errors
    ///
    /// Returns [`TwinpulseError::Config`] for an invalid configuration and
    /// [`TwinpulseError::DuplicateMonitor`] if the name is taken.
    pub fn register(&mut self, config: MonitorConfig) -> TwinpulseResult<MonitorHandle> {
        config.validate()?;
        if self.find(&config.name).is_some() {
            return Err(TwinpulseError::DuplicateMonitor(config.name));
        }

        let name = config.name.clone();
        let monitor = Monitor {
            state: Arc::new(SharedPulseState::new(config.pulse)),
            config,
        };

        let handle = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.monitor = Some(monitor);
            MonitorHandle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = u32::try_from(self.slots.len())
                .map_err(|_| TwinpulseError::Config("monitor registry is full".into()))?;
            self.slots.push(Slot {
                generation: 0,
                monitor: Some(monitor),
            });
            MonitorHandle {
                index,
                generation: 0,
            }
        };

        info!(%handle, %name, "monitor registered");
        Ok(handle)
    }

    /// Remove a monitor, returning its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TwinpulseError::UnknownMonitor`] for a stale handle.
    pub fn remove(&mut self, handle: MonitorHandle) -> TwinpulseResult<MonitorConfig> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .ok_or_else(|| handle.unknown())?;
        let monitor = slot.monitor.take().ok_or_else(|| handle.unknown())?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);

        info!(%handle, name = %monitor.config.name, "monitor removed");
        Ok(monitor.config)
    }

    /// Shared state of a live monitor.
    #[must_use]
    pub fn get(&self, handle: MonitorHandle) -> Option<Arc<SharedPulseState>> {
        self.monitor(handle).map(|m| Arc::clone(&m.state))
    }

    /// Configuration of a live monitor.
    #[must_use]
    pub fn config(&self, handle: MonitorHandle) -> Option<&MonitorConfig> {
        self.monitor(handle).map(|m| &m.config)
    }

    /// Handle of the monitor with the given name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<MonitorHandle> {
        self.iter()
            .find(|(_, config, _)| config.name == name)
            .map(|(handle, _, _)| handle)
    }

    /// Replace a monitor's thresholds, resetting its state.
    ///
    /// # Errors
    ///
    /// Returns [`TwinpulseError::UnknownMonitor`] for a stale handle and
    /// [`TwinpulseError::Config`] for invalid thresholds.
    pub fn reconfigure(&mut self, handle: MonitorHandle, pulse: PulseConfig) -> TwinpulseResult<()> {
        pulse.validate()?;
        let monitor = self.monitor_mut(handle).ok_or_else(|| handle.unknown())?;
        monitor.config.pulse = pulse;
        monitor.state.reconfigure(pulse);
        debug!(%handle, name = %monitor.config.name, ?pulse, "monitor reconfigured");
        Ok(())
    }

    /// Route a primary edge.
    ///
    /// # Errors
    ///
    /// Returns [`TwinpulseError::UnknownMonitor`] for a stale handle.
    pub fn on_primary_edge(
        &self,
        handle: MonitorHandle,
        now: Timestamp,
    ) -> TwinpulseResult<PrimaryEdge> {
        let monitor = self.monitor(handle).ok_or_else(|| handle.unknown())?;
        Ok(monitor.state.on_primary_edge(now))
    }

    /// Route a secondary edge.
    ///
    /// # Errors
    ///
    /// Returns [`TwinpulseError::UnknownMonitor`] for a stale handle.
    pub fn on_secondary_edge(
        &self,
        handle: MonitorHandle,
        now: Timestamp,
    ) -> TwinpulseResult<SecondaryEdge> {
        let monitor = self.monitor(handle).ok_or_else(|| handle.unknown())?;
        Ok(monitor.state.on_secondary_edge(now))
    }

    /// Poll a monitor's values.
    ///
    /// # Errors
    ///
    /// Returns [`TwinpulseError::UnknownMonitor`] for a stale handle.
    pub fn values(&self, handle: MonitorHandle, reset: bool) -> TwinpulseResult<Values> {
        let monitor = self.monitor(handle).ok_or_else(|| handle.unknown())?;
        Ok(monitor.state.values(reset))
    }

    /// Live monitors in slot order.
    // Slot count never exceeds u32::MAX, see `register`
    #[allow(clippy::cast_possible_truncation)]
    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (MonitorHandle, &MonitorConfig, &Arc<SharedPulseState>)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.monitor.as_ref().map(|m| {
                (
                    MonitorHandle {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    &m.config,
                    &m.state,
                )
            })
        })
    }

    /// Number of live monitors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Returns true if no monitor is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn monitor(&self, handle: MonitorHandle) -> Option<&Monitor> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.monitor.as_ref())
    }

    fn monitor_mut(&mut self, handle: MonitorHandle) -> Option<&mut Monitor> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.monitor.as_mut())
    }
}
