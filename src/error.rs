//! Error types for the knob state core

use std::time::Duration;

/// Errors raised by the state store and the event dispatcher
#[derive(Debug, thiserror::Error)]
pub enum KnobError {
    /// The state lock could not be acquired before the deadline.
    #[error("Timed out after {timeout:?} waiting for state lock ({operation})")]
    LockTimeout {
        /// Store operation that gave up.
        operation: &'static str,
        /// Acquisition bound that was exceeded.
        timeout: Duration,
    },

    /// The inbound payload is not well-formed JSON.
    #[error("Invalid JSON payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// `operation_mode` was missing or not one of `command` / `event`.
    #[error("Unknown operation mode: {}", .0.as_deref().unwrap_or("<missing>"))]
    UnknownOperationMode(Option<String>),

    /// The mode was recognized but the action has no handler.
    #[error("Unhandled {mode} action: {}", .action.as_deref().unwrap_or("<missing>"))]
    UnhandledAction {
        /// Operation mode the action arrived under.
        mode: &'static str,
        /// Raw action string, if present.
        action: Option<String>,
    },
}

impl KnobError {
    /// Whether this error was caused by lock contention rather than bad input
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, KnobError::LockTimeout { .. })
    }
}

/// Result alias for core operations
pub type Result<T> = std::result::Result<T, KnobError>;
