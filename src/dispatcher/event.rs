//! Control event decoding and classification
//!
//! Turns a raw transport payload into a [`ControlEvent`] and resolves the
//! `(operation_mode, action)` pair against the static action table.

use crate::error::{KnobError, Result};
use serde::de::Error as _;
use serde_json::Value;

/// Rotation detent used when a rotate event carries no step size
pub const DEFAULT_ROTATE_STEP: i64 = 10;
/// Step used when an explicit brightness step command omits its size
pub const DEFAULT_COMMAND_STEP: i64 = 0;

/// Operation mode reported by the knob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationMode {
    /// Knob bound to a group, emits Zigbee-style step commands
    Command,
    /// Knob emits raw rotation and press events
    Event,
}

impl OperationMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "command" => Some(OperationMode::Command),
            "event" => Some(OperationMode::Event),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationMode::Command => "command",
            OperationMode::Event => "event",
        }
    }
}

impl std::fmt::Display for OperationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every action the dispatcher knows how to handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnobAction {
    BrightnessStepUp,
    BrightnessStepDown,
    ColorTemperatureStepUp,
    ColorTemperatureStepDown,
    Toggle,
    RotateLeft,
    RotateRight,
    SinglePress,
    DoublePress,
}

/// Lookup table keyed by `(operation_mode, action)`
const ACTION_TABLE: &[(OperationMode, &str, KnobAction)] = &[
    (OperationMode::Command, "brightness_step_up", KnobAction::BrightnessStepUp),
    (OperationMode::Command, "brightness_step_down", KnobAction::BrightnessStepDown),
    (OperationMode::Command, "color_temperature_step_up", KnobAction::ColorTemperatureStepUp),
    (OperationMode::Command, "color_temperature_step_down", KnobAction::ColorTemperatureStepDown),
    (OperationMode::Command, "toggle", KnobAction::Toggle),
    (OperationMode::Event, "rotate_left", KnobAction::RotateLeft),
    (OperationMode::Event, "rotate_right", KnobAction::RotateRight),
    (OperationMode::Event, "single", KnobAction::SinglePress),
    (OperationMode::Event, "double", KnobAction::DoublePress),
];

impl KnobAction {
    /// Resolve an action name under the given mode
    pub fn lookup(mode: OperationMode, action: &str) -> Option<Self> {
        ACTION_TABLE
            .iter()
            .find(|(m, name, _)| *m == mode && *name == action)
            .map(|(_, _, knob_action)| *knob_action)
    }

    /// Wire name of the action
    pub fn name(&self) -> &'static str {
        ACTION_TABLE
            .iter()
            .find(|(_, _, knob_action)| knob_action == self)
            .map(|(_, name, _)| *name)
            .unwrap_or("unknown")
    }

    /// Step applied when the event has no `action_step_size`
    ///
    /// Explicit step commands are expected to carry their magnitude, so a
    /// missing size means no change. Raw rotations fall back to one detent.
    pub fn default_step(&self) -> i64 {
        match self {
            KnobAction::RotateLeft | KnobAction::RotateRight => DEFAULT_ROTATE_STEP,
            _ => DEFAULT_COMMAND_STEP,
        }
    }
}

impl std::fmt::Display for KnobAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded knob message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlEvent {
    pub operation_mode: OperationMode,
    pub action: Option<String>,
    pub action_step_size: Option<i64>,
}

impl ControlEvent {
    /// Decode a raw payload.
    ///
    /// Fails with `Decode` when the payload is not a JSON object and with
    /// `UnknownOperationMode` when `operation_mode` is missing or unknown.
    /// A step size that is not an integer is treated as absent.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(payload)?;
        let fields = value
            .as_object()
            .ok_or_else(|| KnobError::Decode(serde_json::Error::custom("expected a JSON object")))?;

        let raw_mode = fields.get("operation_mode");
        let operation_mode = raw_mode
            .and_then(Value::as_str)
            .and_then(OperationMode::parse)
            .ok_or_else(|| KnobError::UnknownOperationMode(raw_mode.map(describe_value)))?;

        Ok(Self {
            operation_mode,
            action: fields
                .get("action")
                .and_then(Value::as_str)
                .map(str::to_string),
            action_step_size: fields.get("action_step_size").and_then(Value::as_i64),
        })
    }

    /// Resolve the event against the action table
    pub fn classify(&self) -> Result<KnobAction> {
        self.action
            .as_deref()
            .and_then(|action| KnobAction::lookup(self.operation_mode, action))
            .ok_or_else(|| KnobError::UnhandledAction {
                mode: self.operation_mode.as_str(),
                action: self.action.clone(),
            })
    }

    /// Step size for this event, falling back to the action's default
    pub fn step_size(&self, action: KnobAction) -> i64 {
        self.action_step_size.unwrap_or_else(|| action.default_step())
    }
}

fn describe_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
