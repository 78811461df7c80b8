//! Push-channel frame types and parser.
//!
//! Every frame is a JSON text message tagged by its `"type"` field. The
//! client sends `init` and `poll`; the server answers with `snapshot` and
//! `update` frames carrying optional `crowd` and `sensor` record arrays.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use floodwatch_core::normalize::Normalizer;
use floodwatch_core::types::{FloodPoint, SourceKind};

/// Frames sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutgoingMessage {
    /// First frame after connecting: where the viewer is and how far to look.
    Init { lat: f64, lng: f64, radius: f64 },
    /// Ask for anything new since the last frame.
    Poll,
}

impl OutgoingMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Frames sent by the server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IncomingMessage {
    /// Full state for the requested area.
    Snapshot(PointsFrame),
    /// Changes since the last frame.
    Update(PointsFrame),
    /// Any other `type`. Ignored.
    #[serde(other)]
    Other,
}

/// Payload of `snapshot` and `update` frames.
///
/// Both arrays are optional and independent. A field that is present but
/// not an array is treated as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PointsFrame {
    #[serde(default)]
    pub crowd: Value,
    #[serde(default)]
    pub sensor: Value,
}

impl PointsFrame {
    pub fn crowd_records(&self) -> &[Value] {
        records(&self.crowd)
    }

    pub fn sensor_records(&self) -> &[Value] {
        records(&self.sensor)
    }

    /// Normalize crowd records, then sensor records, into one batch.
    pub fn to_points(&self, normalizer: &Normalizer) -> Vec<FloodPoint> {
        let mut points = normalizer.normalize_batch(self.crowd_records(), SourceKind::Crowd);
        points.extend(normalizer.normalize_batch(self.sensor_records(), SourceKind::Sensor));
        points
    }
}

fn records(value: &Value) -> &[Value] {
    value.as_array().map(Vec::as_slice).unwrap_or(&[])
}

/// Parse a text frame.
///
/// Returns `Err` for malformed JSON or a frame without a `type`. Unknown
/// types parse as [`IncomingMessage::Other`].
pub fn parse_message(text: &str) -> Result<IncomingMessage, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn init_serializes_with_type_tag() {
        let msg = OutgoingMessage::Init {
            lat: 10.762622,
            lng: 106.660172,
            radius: 20.0,
        };
        let v: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(v, json!({"type": "init", "lat": 10.762622, "lng": 106.660172, "radius": 20.0}));
    }

    #[test]
    fn poll_is_bare_type() {
        assert_eq!(OutgoingMessage::Poll.to_json().unwrap(), r#"{"type":"poll"}"#);
    }

    #[test]
    fn parse_snapshot_with_both_arrays() {
        let text = r#"{"type":"snapshot","crowd":[{"id":"c1"}],"sensor":[{"zoneid":"z1"},{"zoneid":"z2"}]}"#;
        match parse_message(text).unwrap() {
            IncomingMessage::Snapshot(frame) => {
                assert_eq!(frame.crowd_records().len(), 1);
                assert_eq!(frame.sensor_records().len(), 2);
            }
            other => panic!("Expected Snapshot, got {other:?}"),
        }
    }

    #[test]
    fn parse_update_with_only_sensor() {
        let text = r#"{"type":"update","sensor":[{"zoneid":"z1","waterlevel":0.2}]}"#;
        match parse_message(text).unwrap() {
            IncomingMessage::Update(frame) => {
                assert!(frame.crowd_records().is_empty());
                let points = frame.to_points(&Normalizer::default());
                assert_eq!(points.len(), 1);
                assert_eq!(points[0].id, "z1");
            }
            other => panic!("Expected Update, got {other:?}"),
        }
    }

    #[test]
    fn non_array_field_is_treated_as_absent() {
        let text = r#"{"type":"update","crowd":"oops","sensor":null}"#;
        match parse_message(text).unwrap() {
            IncomingMessage::Update(frame) => {
                assert!(frame.to_points(&Normalizer::default()).is_empty());
            }
            other => panic!("Expected Update, got {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_other() {
        let msg = parse_message(r#"{"type":"pong","ts":1}"#).unwrap();
        assert!(matches!(msg, IncomingMessage::Other));
    }

    #[test]
    fn invalid_json_is_error() {
        assert!(parse_message("not json at all").is_err());
        assert!(parse_message(r#"{"crowd":[]}"#).is_err());
    }
}
