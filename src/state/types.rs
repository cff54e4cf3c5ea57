//! Device state type definitions
//!
//! Defines the dimmer state held by the store and the snapshot it reports.

use serde::{Deserialize, Serialize};

/// Lowest brightness the dimmer accepts
pub const MIN_BRIGHTNESS: i64 = 0;
/// Highest brightness the dimmer accepts
pub const MAX_BRIGHTNESS: i64 = 100;

/// Constrain a brightness value to `[MIN_BRIGHTNESS, MAX_BRIGHTNESS]`
pub fn clamp_brightness(value: i64) -> i64 {
    value.clamp(MIN_BRIGHTNESS, MAX_BRIGHTNESS)
}

/// Mutable dimmer state guarded by the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceState {
    /// Brightness level, always within bounds
    pub brightness: i64,
    /// Whether the light output is on
    pub output: bool,
    /// Set by every mutation, cleared only by a report
    pub dirty: bool,
}

impl DeviceState {
    /// Observable part of the state, without the dirty flag
    pub fn report(&self) -> StateReport {
        StateReport {
            brightness: self.brightness,
            output: self.output,
        }
    }
}

/// Snapshot returned by a report, ready to publish downstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateReport {
    pub brightness: i64,
    pub output: bool,
}

impl std::fmt::Display for StateReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = if self.output { "ON" } else { "OFF" };
        write!(f, "Status: {} | Brightness: {}", status, self.brightness)
    }
}
