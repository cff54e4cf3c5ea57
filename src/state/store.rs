//! StateStore - Timeout-bounded dimmer state shared by all handlers
//!
//! Every read and write of brightness, output and the dirty flag goes
//! through one mutex. Acquisition is bounded by a deadline so a stalled
//! holder turns into a `LockTimeout` error instead of a wedged caller.

use super::types::{clamp_brightness, DeviceState, StateReport};
use crate::error::{KnobError, Result};
use parking_lot::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::trace;

/// Default bound on lock acquisition
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// Stores the knob's dimmer state behind a timed mutex
///
/// The store is constructed once at startup and shared by `Arc` handle
/// between the dispatcher and the report scheduler.
pub struct StateStore {
    state: Mutex<DeviceState>,
    lock_timeout: Duration,
}

impl StateStore {
    /// Create a store with the default 2 second lock timeout
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Create a store with a custom lock timeout
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(DeviceState::default()),
            lock_timeout,
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Enter the critical section or fail once the deadline passes.
    /// The guard releases the lock on every exit path.
    fn lock(&self, operation: &'static str) -> Result<MutexGuard<'_, DeviceState>> {
        self.state
            .try_lock_for(self.lock_timeout)
            .ok_or(KnobError::LockTimeout {
                operation,
                timeout: self.lock_timeout,
            })
    }

    /// Current brightness
    pub fn get_brightness(&self) -> Result<i64> {
        Ok(self.lock("get_brightness")?.brightness)
    }

    /// Clamp and store a brightness value, marking the state dirty.
    ///
    /// Returns the value actually stored.
    pub fn set_brightness(&self, value: i64) -> Result<i64> {
        let mut state = self.lock("set_brightness")?;
        state.brightness = clamp_brightness(value);
        state.dirty = true;
        trace!(requested = value, stored = state.brightness, "brightness set");
        Ok(state.brightness)
    }

    /// Add `delta` to the brightness inside a single critical section.
    ///
    /// Concurrent step commands cannot lose updates through this path,
    /// unlike a separate get followed by a set. Returns the stored value.
    pub fn adjust_brightness(&self, delta: i64) -> Result<i64> {
        let mut state = self.lock("adjust_brightness")?;
        state.brightness = clamp_brightness(state.brightness.saturating_add(delta));
        state.dirty = true;
        trace!(delta, stored = state.brightness, "brightness adjusted");
        Ok(state.brightness)
    }

    /// Current output state
    pub fn get_output(&self) -> Result<bool> {
        Ok(self.lock("get_output")?.output)
    }

    /// Store the output state, marking the state dirty
    pub fn set_output(&self, output: bool) -> Result<()> {
        let mut state = self.lock("set_output")?;
        state.output = output;
        state.dirty = true;
        trace!(output, "output set");
        Ok(())
    }

    /// Flip the output state atomically and return the new value
    pub fn toggle_output(&self) -> Result<bool> {
        let mut state = self.lock("toggle_output")?;
        state.output = !state.output;
        state.dirty = true;
        trace!(output = state.output, "output toggled");
        Ok(state.output)
    }

    /// Whether anything changed since the last report. Does not clear the flag.
    pub fn is_dirty(&self) -> Result<bool> {
        Ok(self.lock("is_dirty")?.dirty)
    }

    /// Snapshot brightness and output and clear the dirty flag.
    ///
    /// Both fields and the flag are handled in one critical section, so the
    /// snapshot always describes exactly the state that was marked clean.
    pub fn report(&self) -> Result<StateReport> {
        let mut state = self.lock("report")?;
        state.dirty = false;
        Ok(state.report())
    }

    /// Like [`report`](Self::report), but returns `None` and leaves the
    /// state untouched when nothing changed since the last report.
    pub fn report_if_dirty(&self) -> Result<Option<StateReport>> {
        let mut state = self.lock("report_if_dirty")?;
        if !state.dirty {
            return Ok(None);
        }
        state.dirty = false;
        Ok(Some(state.report()))
    }

    /// Hold the state lock so tests can simulate a stalled caller
    #[cfg(test)]
    pub(crate) fn hold_lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}
