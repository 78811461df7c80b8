//! Point normalizer: raw backend records into [`FloodPoint`]s.
//!
//! Backend payloads are loosely typed: the same quantity shows up under
//! several spellings (`waterlevel` / `waterLevel`, `zoneid` / `zoneId`, ...)
//! and numbers sometimes arrive as strings. Everything is resolved here, at
//! the boundary, so nothing downstream ever sees a raw payload.
//!
//! Normalization never fails. Missing coordinates fall back to the
//! configured reference center, missing timestamps to the ingestion time,
//! and missing severity to a depth-derived value (which is `Low` when the
//! depth is missing as well).

use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use crate::types::{FloodPoint, GeoPoint, Severity, SourceKind};
use crate::zones::REFERENCE_CENTER;

/// Meters to centimeters for raw water levels.
const CM_PER_METER: f64 = 100.0;

const CROWD_ID_KEYS: &[&str] = &["entity_id", "id"];
const CROWD_LEVEL_KEYS: &[&str] = &["waterlevel", "waterLevel"];
const CROWD_LABEL_KEYS: &[&str] = &["risklevel", "riskLevel"];
const CROWD_NAME_KEYS: &[&str] = &["address", "locationName"];
const CROWD_TIME_KEYS: &[&str] = &["calculatedat", "timestamp", "reportedAt"];

const SENSOR_ID_KEYS: &[&str] = &["zoneid", "zoneId", "entity_id"];
const SENSOR_LEVEL_KEYS: &[&str] = &["waterlevel", "waterLevel"];
const SENSOR_LABEL_KEYS: &[&str] = &["severity"];
const SENSOR_NAME_KEYS: &[&str] = &["zonename", "zoneName", "zone_name"];
const SENSOR_ZONE_KEYS: &[&str] = &["zoneid", "zoneId"];
const SENSOR_TIME_KEYS: &[&str] = &["time_index", "updatedat", "timestamp", "observedAt"];

const LOCAL_ID_KEYS: &[&str] = &["id"];
const LOCAL_LAT_KEYS: &[&str] = &["lat", "latitude"];
const LOCAL_LNG_KEYS: &[&str] = &["lng", "longitude"];
const LOCAL_DEPTH_KEYS: &[&str] = &["depth"];
const LOCAL_LEVEL_KEYS: &[&str] = &["waterLevel", "waterlevel"];
const LOCAL_LABEL_KEYS: &[&str] = &["severity", "riskLevel"];
const LOCAL_NAME_KEYS: &[&str] = &["locationName", "address"];
const LOCAL_TIME_KEYS: &[&str] = &["timestamp", "reportedAt"];

pub const CROWD_PLACEHOLDER_NAME: &str = "Community report";
pub const LOCAL_PLACEHOLDER_NAME: &str = "Local report";

/// Converts raw records of any [`SourceKind`] into canonical points.
#[derive(Debug, Clone)]
pub struct Normalizer {
    fallback_center: GeoPoint,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(REFERENCE_CENTER)
    }
}

impl Normalizer {
    /// `fallback_center` is used for any record without usable coordinates.
    pub fn new(fallback_center: GeoPoint) -> Self {
        Self { fallback_center }
    }

    pub fn fallback_center(&self) -> GeoPoint {
        self.fallback_center
    }

    /// Normalize a single record. Never fails.
    pub fn normalize(&self, record: &Value, kind: SourceKind) -> FloodPoint {
        match kind {
            SourceKind::Crowd => self.normalize_crowd(record),
            SourceKind::Sensor => self.normalize_sensor(record),
            SourceKind::Local | SourceKind::Synthetic => self.normalize_local(record, kind),
        }
    }

    /// Normalize every record of a batch with the same source kind.
    pub fn normalize_batch(&self, records: &[Value], kind: SourceKind) -> Vec<FloodPoint> {
        records.iter().map(|r| self.normalize(r, kind)).collect()
    }

    fn normalize_crowd(&self, record: &Value) -> FloodPoint {
        let depth = first_f64(record, CROWD_LEVEL_KEYS).unwrap_or(0.0) * CM_PER_METER;
        let severity = match first_str(record, CROWD_LABEL_KEYS) {
            Some(label) => Severity::from_label(&label),
            None => Severity::from_depth_cm(depth),
        };

        FloodPoint {
            id: first_str(record, CROWD_ID_KEYS).unwrap_or_else(|| synthesize_id(SourceKind::Crowd)),
            lat: first_f64(record, &["lat"]).unwrap_or(self.fallback_center.lat),
            lng: first_f64(record, &["lng"]).unwrap_or(self.fallback_center.lng),
            depth,
            location_name: first_str(record, CROWD_NAME_KEYS)
                .unwrap_or_else(|| CROWD_PLACEHOLDER_NAME.to_string()),
            severity,
            timestamp: first_str(record, CROWD_TIME_KEYS).unwrap_or_else(now_iso),
        }
    }

    fn normalize_sensor(&self, record: &Value) -> FloodPoint {
        let depth = first_f64(record, SENSOR_LEVEL_KEYS).unwrap_or(0.0) * CM_PER_METER;
        let severity = match first_str(record, SENSOR_LABEL_KEYS) {
            Some(label) => Severity::from_label(&label),
            None => Severity::from_depth_cm(depth),
        };
        let location_name = first_str(record, SENSOR_NAME_KEYS).unwrap_or_else(|| {
            let zone = first_str(record, SENSOR_ZONE_KEYS).unwrap_or_else(|| "N/A".to_string());
            format!("Sensor {zone}")
        });

        FloodPoint {
            id: first_str(record, SENSOR_ID_KEYS)
                .unwrap_or_else(|| synthesize_id(SourceKind::Sensor)),
            lat: first_f64(record, &["lat"]).unwrap_or(self.fallback_center.lat),
            lng: first_f64(record, &["lng"]).unwrap_or(self.fallback_center.lng),
            depth,
            location_name,
            severity,
            timestamp: first_str(record, SENSOR_TIME_KEYS).unwrap_or_else(now_iso),
        }
    }

    fn normalize_local(&self, record: &Value, kind: SourceKind) -> FloodPoint {
        let depth = first_f64(record, LOCAL_DEPTH_KEYS)
            .or_else(|| first_f64(record, LOCAL_LEVEL_KEYS).map(|m| m * CM_PER_METER))
            .unwrap_or(0.0);
        let severity = match first_str(record, LOCAL_LABEL_KEYS) {
            Some(label) => Severity::from_label(&label),
            None => Severity::from_depth_cm(depth),
        };

        FloodPoint {
            id: first_str(record, LOCAL_ID_KEYS).unwrap_or_else(|| synthesize_id(kind)),
            lat: first_f64(record, LOCAL_LAT_KEYS).unwrap_or(self.fallback_center.lat),
            lng: first_f64(record, LOCAL_LNG_KEYS).unwrap_or(self.fallback_center.lng),
            depth,
            location_name: first_str(record, LOCAL_NAME_KEYS)
                .unwrap_or_else(|| LOCAL_PLACEHOLDER_NAME.to_string()),
            severity,
            timestamp: first_str(record, LOCAL_TIME_KEYS).unwrap_or_else(now_iso),
        }
    }
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

/// First alias holding a non-empty string (numbers are stringified).
pub(crate) fn first_str(record: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match record.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// First alias holding a finite, non-zero number (or numeric string).
///
/// Zero is skipped like a missing value: the backend uses `0` as "unknown"
/// for coordinates and water levels alike.
pub(crate) fn first_f64(record: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| {
        let v = match record.get(*key)? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        (v.is_finite() && v != 0.0).then_some(v)
    })
}

fn synthesize_id(kind: SourceKind) -> String {
    format!("{}-{}", kind.as_str(), uuid::Uuid::new_v4())
}

pub(crate) fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn normalizer() -> Normalizer {
        Normalizer::default()
    }

    // -- Crowd ---------------------------------------------------------------

    #[test]
    fn crowd_water_level_converts_meters_to_cm() {
        let p = normalizer().normalize(
            &json!({"entity_id": "c1", "lat": 10.77, "lng": 106.7, "waterlevel": 0.35}),
            SourceKind::Crowd,
        );
        assert!((p.depth - 35.0).abs() < 1e-9);
        assert_eq!(p.id, "c1");
    }

    #[test]
    fn crowd_label_wins_over_depth() {
        let p = normalizer().normalize(
            &json!({"id": "c2", "risklevel": "Moderate", "waterlevel": 1.5}),
            SourceKind::Crowd,
        );
        assert!((p.depth - 150.0).abs() < 1e-9);
        assert_eq!(p.severity, Severity::Medium);
    }

    #[test]
    fn crowd_without_label_uses_depth() {
        let p = normalizer().normalize(&json!({"waterLevel": 0.6}), SourceKind::Crowd);
        assert_eq!(p.severity, Severity::High);
    }

    #[test]
    fn crowd_aliases_are_resolved_in_order() {
        let p = normalizer().normalize(
            &json!({
                "entity_id": "urn:crowd:1",
                "id": "fallback",
                "riskLevel": "HIGH",
                "locationName": "Ben Thanh",
                "reportedAt": "2024-05-01T08:00:00Z"
            }),
            SourceKind::Crowd,
        );
        assert_eq!(p.id, "urn:crowd:1");
        assert_eq!(p.severity, Severity::High);
        assert_eq!(p.location_name, "Ben Thanh");
        assert_eq!(p.timestamp, "2024-05-01T08:00:00Z");
    }

    #[test]
    fn empty_crowd_record_is_fully_defaulted() {
        let p = normalizer().normalize(&json!({}), SourceKind::Crowd);
        assert!(p.id.starts_with("crowd-"));
        assert_eq!(p.lat, REFERENCE_CENTER.lat);
        assert_eq!(p.lng, REFERENCE_CENTER.lng);
        assert_eq!(p.depth, 0.0);
        assert_eq!(p.severity, Severity::Low);
        assert_eq!(p.location_name, CROWD_PLACEHOLDER_NAME);
        assert!(chrono::DateTime::parse_from_rfc3339(&p.timestamp).is_ok());
    }

    #[test]
    fn synthesized_ids_are_not_stable() {
        let a = normalizer().normalize(&json!({}), SourceKind::Crowd);
        let b = normalizer().normalize(&json!({}), SourceKind::Crowd);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn numeric_strings_and_numeric_ids_are_accepted() {
        let p = normalizer().normalize(
            &json!({"id": 42, "lat": "10.8", "lng": "106.65", "waterlevel": "0.2"}),
            SourceKind::Crowd,
        );
        assert_eq!(p.id, "42");
        assert_eq!(p.lat, 10.8);
        assert_eq!(p.lng, 106.65);
        assert!((p.depth - 20.0).abs() < 1e-9);
    }

    #[test]
    fn zero_coordinates_fall_back_to_center() {
        let p = normalizer().normalize(&json!({"lat": 0, "lng": 0}), SourceKind::Crowd);
        assert_eq!(p.position(), REFERENCE_CENTER);
    }

    // -- Sensor --------------------------------------------------------------

    #[test]
    fn sensor_severity_from_depth_when_unlabelled() {
        let p = normalizer().normalize(
            &json!({"zoneid": "z1", "zonename": "Q7", "lat": 10.73, "lng": 106.72, "waterlevel": 1.0}),
            SourceKind::Sensor,
        );
        assert_eq!(p.id, "z1");
        assert_eq!(p.location_name, "Q7");
        assert_eq!(p.severity, Severity::Severe);
    }

    #[test]
    fn sensor_label_is_normalized() {
        let p = normalizer().normalize(
            &json!({"zoneId": "z2", "severity": "medium", "waterLevel": 2.0}),
            SourceKind::Sensor,
        );
        assert_eq!(p.severity, Severity::Medium);
    }

    #[test]
    fn sensor_placeholder_name_uses_zone_id() {
        let p = normalizer().normalize(&json!({"zoneid": "z9"}), SourceKind::Sensor);
        assert_eq!(p.location_name, "Sensor z9");

        let p = normalizer().normalize(&json!({"entity_id": "e1"}), SourceKind::Sensor);
        assert_eq!(p.id, "e1");
        assert_eq!(p.location_name, "Sensor N/A");
    }

    #[test]
    fn sensor_timestamp_prefers_time_index() {
        let p = normalizer().normalize(
            &json!({"time_index": "2024-06-01T00:00:00Z", "updatedat": "2020-01-01T00:00:00Z"}),
            SourceKind::Sensor,
        );
        assert_eq!(p.timestamp, "2024-06-01T00:00:00Z");
    }

    // -- Local ---------------------------------------------------------------

    #[test]
    fn normalizing_a_normalized_point_is_idempotent() {
        let original = FloodPoint {
            id: "local-1".into(),
            lat: 10.7765,
            lng: 106.7009,
            depth: 42.0,
            location_name: "Nguyen Hue".into(),
            severity: Severity::Medium,
            timestamp: "2024-07-01T10:00:00.000Z".into(),
        };
        let raw = serde_json::to_value(&original).unwrap();
        let again = normalizer().normalize(&raw, SourceKind::Local);
        assert_eq!(again, original);
    }

    #[test]
    fn local_report_shape_uses_latitude_and_water_level() {
        let p = normalizer().normalize(
            &json!({"id": "r1", "latitude": 10.8, "longitude": 106.7, "waterLevel": 0.55, "riskLevel": "High"}),
            SourceKind::Local,
        );
        assert_eq!(p.lat, 10.8);
        assert_eq!(p.lng, 106.7);
        assert!((p.depth - 55.0).abs() < 1e-9);
        assert_eq!(p.severity, Severity::High);
        assert_eq!(p.location_name, LOCAL_PLACEHOLDER_NAME);
    }

    #[test]
    fn custom_fallback_center_is_used() {
        let center = GeoPoint::new(21.0278, 105.8342);
        let p = Normalizer::new(center).normalize(&json!({}), SourceKind::Synthetic);
        assert_eq!(p.position(), center);
        assert!(p.id.starts_with("synthetic-"));
    }

    #[test]
    fn batch_preserves_order() {
        let batch = vec![json!({"id": "a"}), json!({"id": "b"})];
        let points = normalizer().normalize_batch(&batch, SourceKind::Crowd);
        let ids: Vec<_> = points.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
