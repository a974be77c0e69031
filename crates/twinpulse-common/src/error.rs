use thiserror::Error;

/// twinpulse error types covering configuration and monitor routing.
///
/// The pulse state machine itself never fails; these errors come from the
/// layers that configure instances and route edges to them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TwinpulseError {
    /// Configuration rejected during validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// A monitor with this name is already registered.
    #[error("monitor already registered: {0}")]
    DuplicateMonitor(String),

    /// The handle does not refer to a live monitor (removed or never issued).
    #[error("unknown monitor handle {index}:{generation}")]
    UnknownMonitor {
        /// Slot index of the handle.
        index: u32,
        /// Slot generation the handle was issued for.
        generation: u32,
    },
}

/// Convenience type alias for twinpulse operations.
pub type TwinpulseResult<T> = Result<T, TwinpulseError>;
