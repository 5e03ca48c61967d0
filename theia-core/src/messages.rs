//! Bus message model.
//!
//! Every installation-wide event travels as JSON of the shape
//! `{"type": <kind>, "data": <payload>}` on one well-known channel.
//! The kinds form a closed set: a message whose `type` is not listed
//! here fails to decode and is rejected by the relay, never silently
//! passed through.

use serde::{Deserialize, Serialize};

/// Well-known channel carrying all installation events.
pub const EVENTS_CHANNEL: &str = "theia-events";

/// Tagged union of installation events.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum BusMessage {
    /// A camera saw motion at a camera-local angle
    MotionDetected(MotionDetected),
    /// A head completed one physical step
    HeadPositioned(HeadPositioned),
    /// Liveness signal, re-broadcast to observers untouched
    Active(serde_json::Value),
}

/// Motion detection reported by a camera process.
///
/// `position` is an angle in the camera's local frame, in degrees.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MotionDetected {
    pub camera_name: String,
    pub position: f32,
    /// Microseconds since epoch at detection time, when the sensor
    /// provides it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

/// Telemetry for one physical step taken by a head.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeadPositioned {
    pub head_name: String,
    /// Step index in [0, num_steps)
    pub step_position: i64,
    /// Equivalent rotation in degrees
    pub rotation: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation: Option<String>,
}

impl BusMessage {
    /// Wire name of this message's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            BusMessage::MotionDetected(_) => "motion-detected",
            BusMessage::HeadPositioned(_) => "head-positioned",
            BusMessage::Active(_) => "active",
        }
    }

    /// Identity of the process that emitted this message, for metrics.
    pub fn source(&self) -> Option<&str> {
        match self {
            BusMessage::MotionDetected(m) => Some(&m.camera_name),
            BusMessage::HeadPositioned(h) => Some(&h.head_name),
            BusMessage::Active(v) => v.get("name").and_then(|n| n.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motion_detected_wire_shape() {
        let msg = BusMessage::MotionDetected(MotionDetected {
            camera_name: "camera-01".to_string(),
            position: 12.5,
            timestamp: None,
        });

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "motion-detected");
        assert_eq!(json["data"]["cameraName"], "camera-01");
        assert_eq!(json["data"]["position"], 12.5);
        assert!(json["data"].get("timestamp").is_none());
    }

    #[test]
    fn head_positioned_round_trip() {
        let raw = r#"{
            "type": "head-positioned",
            "data": {"headName": "head-02", "stepPosition": 42, "rotation": 75.6}
        }"#;

        let msg: BusMessage = serde_json::from_str(raw).unwrap();
        match &msg {
            BusMessage::HeadPositioned(h) => {
                assert_eq!(h.head_name, "head-02");
                assert_eq!(h.step_position, 42);
                assert!(h.installation.is_none());
            }
            other => panic!("wrong kind: {:?}", other),
        }
        assert_eq!(msg.kind(), "head-positioned");
        assert_eq!(msg.source(), Some("head-02"));
    }

    #[test]
    fn active_keeps_arbitrary_payload() {
        let raw = r#"{"type": "active", "data": {"name": "camera-01", "extra": [1, 2]}}"#;
        let msg: BusMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.source(), Some("camera-01"));

        let back = serde_json::to_string(&msg).unwrap();
        let reparsed: BusMessage = serde_json::from_str(&back).unwrap();
        assert_eq!(msg, reparsed);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let raw = r#"{"type": "self-destruct", "data": {}}"#;
        assert!(serde_json::from_str::<BusMessage>(raw).is_err());
    }
}
