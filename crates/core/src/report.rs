//! Crowd reports as listed on the dashboard.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::normalize::{first_f64, first_str, now_iso, Normalizer};
use crate::types::{FloodPoint, SourceKind};

pub const DEFAULT_REPORT_STATUS: &str = "active";
pub const DEFAULT_REPORT_TYPE: &str = "community";

/// A single crowd report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    pub timestamp: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub images: Vec<String>,
    /// Water level in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_at: Option<String>,
    #[serde(rename = "type", default = "default_type")]
    pub kind: String,
}

fn default_status() -> String {
    DEFAULT_REPORT_STATUS.to_string()
}

fn default_type() -> String {
    DEFAULT_REPORT_TYPE.to_string()
}

impl Report {
    /// Map a backend report record (`lat`/`lng`, `waterlevel`, `risk_score`,
    /// `image_urls`, ...) onto a [`Report`]. Never fails.
    pub fn from_backend(record: &Value) -> Self {
        let images = ["images", "image_urls"]
            .iter()
            .find_map(|key| record.get(*key)?.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        let timestamp = first_str(record, &["reportedAt", "timestamp"]);
        let address = first_str(record, &["address"]);

        Self {
            id: first_str(record, &["id"]).unwrap_or_default(),
            latitude: first_f64(record, &["lat", "latitude"]).unwrap_or_default(),
            longitude: first_f64(record, &["lng", "longitude"]).unwrap_or_default(),
            description: first_str(record, &["description"]).unwrap_or_default(),
            location_name: address.clone(),
            timestamp: timestamp.clone().unwrap_or_else(now_iso),
            status: first_str(record, &["status"]).unwrap_or_else(default_status),
            images,
            water_level: first_f64(record, &["waterLevel", "waterlevel"]),
            risk_score: first_f64(record, &["riskScore", "risk_score"]),
            risk_level: first_str(record, &["riskLevel", "risk_level"]),
            address,
            confidence: first_str(record, &["confidence"]),
            reported_at: timestamp,
            kind: first_str(record, &["type"]).unwrap_or_else(default_type),
        }
    }

    /// Raw `local` record for the normalizer.
    pub fn to_local_record(&self) -> Value {
        json!({
            "id": self.id,
            "latitude": self.latitude,
            "longitude": self.longitude,
            "waterLevel": self.water_level,
            "riskLevel": self.risk_level,
            "address": self.address.as_ref().or(self.location_name.as_ref()),
            "reportedAt": self.reported_at.as_ref().unwrap_or(&self.timestamp),
        })
    }

    /// The map point this report contributes.
    pub fn to_point(&self, normalizer: &Normalizer) -> FloodPoint {
        normalizer.normalize(&self.to_local_record(), SourceKind::Local)
    }
}
