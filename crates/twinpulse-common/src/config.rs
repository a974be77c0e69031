//! Configuration structures for pulse monitors and the replay daemon.
//!
//! Supports TOML deserialization with defaults matching the reference
//! deployment (10 ms debounce, 50 s inactivity timeout). Durations are
//! written in humantime format, e.g. `"10ms"` or `"50s"`.

use crate::error::{TwinpulseError, TwinpulseResult};
use crate::time::duration_to_millis;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Default primary-edge debounce time.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(10);

/// Default gap between primary edges after which an interval is discarded.
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_millis(50_000);

/// Thresholds for one pulse state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    /// Primary edges closer than this to the previous primary edge are
    /// discarded as contact bounce.
    #[serde(with = "humantime_serde")]
    pub debounce: Duration,

    /// Primary intervals longer than this are treated as a stale restart
    /// and never counted.
    #[serde(with = "humantime_serde")]
    pub inactivity_timeout: Duration,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
        }
    }
}

impl PulseConfig {
    /// Debounce threshold in milliseconds.
    #[must_use]
    pub fn debounce_ms(&self) -> u32 {
        duration_to_millis(self.debounce)
    }

    /// Inactivity timeout in milliseconds.
    #[must_use]
    pub fn inactivity_timeout_ms(&self) -> u32 {
        duration_to_millis(self.inactivity_timeout)
    }

    /// Check that the thresholds fit the millisecond time base and are
    /// ordered.
    ///
    /// # Errors
    ///
    /// Returns [`TwinpulseError::Config`] if the inactivity timeout is zero
    /// or does not fit in `u32` milliseconds, or if the debounce time is not
    /// shorter than the inactivity timeout.
    pub fn validate(&self) -> TwinpulseResult<()> {
        if self.inactivity_timeout.is_zero() {
            return Err(TwinpulseError::Config(
                "inactivity_timeout must be greater than zero".into(),
            ));
        }
        if self.inactivity_timeout.as_millis() >= u128::from(u32::MAX) {
            return Err(TwinpulseError::Config(format!(
                "inactivity_timeout {} exceeds the millisecond time base",
                humantime::format_duration(self.inactivity_timeout)
            )));
        }
        if self.debounce >= self.inactivity_timeout {
            return Err(TwinpulseError::Config(format!(
                "debounce {} must be shorter than inactivity_timeout {}",
                humantime::format_duration(self.debounce),
                humantime::format_duration(self.inactivity_timeout)
            )));
        }
        Ok(())
    }
}

/// One monitored rotating mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Unique monitor name, used to route trace events.
    pub name: String,

    /// Display label for the "left" direction.
    pub left_label: String,

    /// Display label for the "right" direction.
    pub right_label: String,

    /// State machine thresholds.
    #[serde(flatten)]
    pub pulse: PulseConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            name: String::from("rotor"),
            left_label: String::from("left"),
            right_label: String::from("right"),
            pulse: PulseConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Create a monitor configuration with default labels and thresholds.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Validate the name and thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`TwinpulseError::Config`] for an empty or whitespace-bearing
    /// name, or invalid thresholds.
    pub fn validate(&self) -> TwinpulseResult<()> {
        if self.name.is_empty() {
            return Err(TwinpulseError::Config("monitor name must not be empty".into()));
        }
        if self.name.chars().any(char::is_whitespace) {
            return Err(TwinpulseError::Config(format!(
                "monitor name {:?} must not contain whitespace",
                self.name
            )));
        }
        self.pulse.validate()
    }
}

/// Top-level replay daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Trace time between periodic reports.
    #[serde(with = "humantime_serde")]
    pub report_interval: Duration,

    /// Whether each report resets the accumulated values.
    pub reset_on_report: bool,

    /// Monitored mechanisms.
    #[serde(rename = "monitor")]
    pub monitors: Vec<MonitorConfig>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            report_interval: Duration::from_secs(1),
            reset_on_report: true,
            monitors: vec![MonitorConfig::default()],
        }
    }
}

impl DaemonConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate the report interval and every monitor.
    ///
    /// # Errors
    ///
    /// Returns [`TwinpulseError::Config`] for a zero report interval or an
    /// invalid monitor, and [`TwinpulseError::DuplicateMonitor`] when two
    /// monitors share a name.
    pub fn validate(&self) -> TwinpulseResult<()> {
        if self.report_interval.as_millis() == 0 {
            return Err(TwinpulseError::Config(
                "report_interval must be at least 1ms".into(),
            ));
        }
        let mut seen = HashSet::new();
        for monitor in &self.monitors {
            monitor.validate()?;
            if !seen.insert(monitor.name.as_str()) {
                return Err(TwinpulseError::DuplicateMonitor(monitor.name.clone()));
            }
        }
        if self.monitors.is_empty() {
            tracing::warn!("no monitors configured; every trace event will be rejected");
        }
        Ok(())
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Parsed configuration is not usable.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] TwinpulseError),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
