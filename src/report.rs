//! Report encoding - turns a state snapshot into a dimmer light command
//!
//! The dimmer speaks a JSON-RPC style protocol: `Light.Set` with the light
//! channel id, on/off flag and brightness percentage.

use crate::state::StateReport;
use anyhow::{Context, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// RPC method used to drive the dimmer
pub const LIGHT_SET_METHOD: &str = "Light.Set";

/// Parameters of a `Light.Set` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightSetParams {
    pub id: u32,
    pub on: bool,
    pub brightness: i64,
}

/// Full `Light.Set` request as published to the dimmer's RPC topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightCommand {
    pub id: u64,
    pub src: String,
    pub method: String,
    pub params: LightSetParams,
}

impl LightCommand {
    pub fn light_set(request_id: u64, src: &str, light_id: u32, report: StateReport) -> Self {
        Self {
            id: request_id,
            src: src.to_string(),
            method: LIGHT_SET_METHOD.to_string(),
            params: LightSetParams {
                id: light_id,
                on: report.output,
                brightness: report.brightness,
            },
        }
    }

    pub fn to_payload(&self) -> Result<Bytes> {
        let json = serde_json::to_vec(self).context("Failed to encode light command")?;
        Ok(Bytes::from(json))
    }
}

/// Builds light commands with monotonically increasing request ids
pub struct LightCommandEncoder {
    src: String,
    light_id: u32,
    next_id: AtomicU64,
}

impl LightCommandEncoder {
    pub fn new(src: impl Into<String>, light_id: u32) -> Self {
        Self {
            src: src.into(),
            light_id,
            next_id: AtomicU64::new(1),
        }
    }

    /// Point subsequent commands at a new source or light channel.
    ///
    /// The request id sequence carries on from where it was.
    pub fn reconfigure(&mut self, src: impl Into<String>, light_id: u32) {
        self.src = src.into();
        self.light_id = light_id;
    }

    pub fn encode(&self, report: StateReport) -> Result<Bytes> {
        let request_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        LightCommand::light_set(request_id, &self.src, self.light_id, report).to_payload()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_light_set_payload() {
        let payload = LightCommand::light_set(
            124,
            "timtw",
            0,
            StateReport {
                brightness: 60,
                output: true,
            },
        )
        .to_payload()
        .unwrap();

        let value: Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 124,
                "src": "timtw",
                "method": "Light.Set",
                "params": {"id": 0, "on": true, "brightness": 60}
            })
        );
    }

    #[test]
    fn test_encoder_increments_request_id() {
        let encoder = LightCommandEncoder::new("knob-bridge", 1);
        let report = StateReport {
            brightness: 0,
            output: false,
        };

        let first: LightCommand = serde_json::from_slice(&encoder.encode(report).unwrap()).unwrap();
        let second: LightCommand =
            serde_json::from_slice(&encoder.encode(report).unwrap()).unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(second.src, "knob-bridge");
        assert_eq!(second.params.id, 1);
        assert!(!second.params.on);
    }

    #[test]
    fn test_reconfigure_keeps_request_ids_increasing() {
        let mut encoder = LightCommandEncoder::new("knob-bridge", 0);
        let report = StateReport {
            brightness: 30,
            output: true,
        };

        encoder.encode(report).unwrap();
        encoder.encode(report).unwrap();
        encoder.reconfigure("hallway", 2);

        let next: LightCommand = serde_json::from_slice(&encoder.encode(report).unwrap()).unwrap();
        assert_eq!(next.id, 3);
        assert_eq!(next.src, "hallway");
        assert_eq!(next.params.id, 2);
    }
}
