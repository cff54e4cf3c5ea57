//! Dispatcher module - maps knob messages onto dimmer state mutations
//!
//! The dispatcher is stateless apart from the shared [`StateStore`]: it
//! decodes a payload, classifies it through the action table and applies
//! the matching handler. Malformed or unmapped messages are logged and
//! dropped; they never surface as errors to the transport.

mod event;

#[cfg(test)]
mod tests;

pub use event::{ControlEvent, KnobAction, OperationMode, DEFAULT_COMMAND_STEP, DEFAULT_ROTATE_STEP};

use crate::error::{KnobError, Result};
use crate::state::StateStore;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Why a message was dropped without a state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Decode,
    UnknownOperationMode,
    UnhandledAction,
    LockTimeout,
}

impl From<&KnobError> for DropReason {
    fn from(err: &KnobError) -> Self {
        match err {
            KnobError::Decode(_) => DropReason::Decode,
            KnobError::UnknownOperationMode(_) => DropReason::UnknownOperationMode,
            KnobError::UnhandledAction { .. } => DropReason::UnhandledAction,
            KnobError::LockTimeout { .. } => DropReason::LockTimeout,
        }
    }
}

/// Result of a single dispatch, for callers that want to audit decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Brightness changed by `step` in the action's direction
    Brightness {
        action: KnobAction,
        step: i64,
        brightness: i64,
    },
    /// Output was toggled
    Output { action: KnobAction, output: bool },
    /// Recognized action that has no state effect
    LogOnly { action: KnobAction, step: i64 },
    /// Message dropped, nothing changed
    Dropped(DropReason),
}

impl DispatchOutcome {
    pub fn is_dropped(&self) -> bool {
        matches!(self, DispatchOutcome::Dropped(_))
    }
}

/// Routes decoded knob events to their handlers
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<StateStore>,
}

impl Dispatcher {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Handle one raw payload.
    ///
    /// Never fails: every error is logged and turned into
    /// [`DispatchOutcome::Dropped`].
    pub fn dispatch(&self, payload: &[u8]) -> DispatchOutcome {
        match self.try_dispatch(payload) {
            Ok(outcome) => outcome,
            Err(err) => {
                match &err {
                    KnobError::Decode(_) => error!("{}", err),
                    KnobError::LockTimeout { .. } => warn!("Dropping knob event: {}", err),
                    _ => warn!("{}", err),
                }
                DispatchOutcome::Dropped(DropReason::from(&err))
            }
        }
    }

    /// Handle one raw payload, returning the error instead of logging it
    pub fn try_dispatch(&self, payload: &[u8]) -> Result<DispatchOutcome> {
        debug!("Parsing knob payload: {}", String::from_utf8_lossy(payload));

        let event = ControlEvent::decode(payload)?;
        let action = event.classify()?;
        debug!("Handling {} action: {}", event.operation_mode, action);

        self.apply(action, event.step_size(action))
    }

    /// Apply a classified action with an already resolved step size
    pub fn apply(&self, action: KnobAction, step: i64) -> Result<DispatchOutcome> {
        let outcome = match action {
            KnobAction::BrightnessStepUp | KnobAction::RotateRight => {
                let brightness = self.store.adjust_brightness(step)?;
                DispatchOutcome::Brightness {
                    action,
                    step,
                    brightness,
                }
            }
            KnobAction::BrightnessStepDown | KnobAction::RotateLeft => {
                let brightness = self.store.adjust_brightness(step.saturating_neg())?;
                DispatchOutcome::Brightness {
                    action,
                    step,
                    brightness,
                }
            }
            KnobAction::Toggle | KnobAction::SinglePress => {
                let output = self.store.toggle_output()?;
                DispatchOutcome::Output { action, output }
            }
            KnobAction::ColorTemperatureStepUp
            | KnobAction::ColorTemperatureStepDown
            | KnobAction::DoublePress => DispatchOutcome::LogOnly { action, step },
        };

        log_outcome(&outcome);
        Ok(outcome)
    }
}

fn log_outcome(outcome: &DispatchOutcome) {
    match *outcome {
        DispatchOutcome::Brightness {
            action,
            step,
            brightness,
        } => match action {
            KnobAction::BrightnessStepUp => {
                info!("Increasing brightness by {}. New brightness: {}", step, brightness)
            }
            KnobAction::BrightnessStepDown => {
                info!("Decreasing brightness by {}. New brightness: {}", step, brightness)
            }
            KnobAction::RotateLeft => {
                info!("Knob rotated left by {}. New brightness: {}", step, brightness)
            }
            _ => info!("Knob rotated right by {}. New brightness: {}", step, brightness),
        },
        DispatchOutcome::Output { action, output } => match action {
            KnobAction::SinglePress => info!("Single press detected. New output: {}", output),
            _ => info!("Toggling state. New output: {}", output),
        },
        DispatchOutcome::LogOnly { action, step } => match action {
            KnobAction::ColorTemperatureStepUp => {
                info!("Increasing color temperature by {}", step)
            }
            KnobAction::ColorTemperatureStepDown => {
                info!("Decreasing color temperature by {}", step)
            }
            _ => info!("Double press detected"),
        },
        DispatchOutcome::Dropped(_) => {}
    }
}
