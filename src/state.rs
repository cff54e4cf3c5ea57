//! State management module - dimmer state shared by the knob handlers
//!
//! This module provides the timeout-bounded store holding brightness, output
//! and the dirty flag, plus the snapshot type emitted when state is reported.

mod store;
mod types;

pub use store::{StateStore, DEFAULT_LOCK_TIMEOUT};
pub use types::{clamp_brightness, DeviceState, StateReport, MAX_BRIGHTNESS, MIN_BRIGHTNESS};
