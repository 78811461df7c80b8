//! Backend response shapes and their mapping onto dashboard models.
//!
//! `Raw*` types mirror what the backend actually sends and are lenient:
//! every field is optional. The public models are what the dashboard
//! consumes.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use floodwatch_core::normalize::Normalizer;
use floodwatch_core::types::{FloodPoint, SourceKind};

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
    /// Per-dependency status, passed through in whatever shape the backend
    /// reports it.
    #[serde(default)]
    pub orion_ld: Value,
    #[serde(default)]
    pub cratedb: Value,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStats {
    pub total: Option<u64>,
    pub severe: Option<u64>,
    pub high: Option<u64>,
    pub medium: Option<u64>,
    pub low: Option<u64>,
    pub avg_water_level: Option<f64>,
    pub sensor_count: Option<u64>,
    pub community_count: Option<u64>,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_alerts: u64,
    pub severe_alerts: u64,
    /// Filled in from the district breakdown when that is available.
    pub safe_districts: u64,
    pub active_zones: u64,
    pub avg_water_level: f64,
    pub sensor_count: u64,
    pub community_count: u64,
    pub last_updated: String,
}

impl From<RawStats> for DashboardStats {
    fn from(raw: RawStats) -> Self {
        Self {
            total_alerts: raw.total.unwrap_or(0),
            severe_alerts: raw.severe.unwrap_or(0),
            safe_districts: 0,
            active_zones: raw.high.unwrap_or(0) + raw.medium.unwrap_or(0) + raw.low.unwrap_or(0),
            avg_water_level: raw.avg_water_level.unwrap_or(0.0),
            sensor_count: raw.sensor_count.unwrap_or(0),
            community_count: raw.community_count.unwrap_or(0),
            last_updated: raw
                .last_updated
                .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

// ---------------------------------------------------------------------------
// Districts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDistricts {
    #[serde(default)]
    pub districts: Vec<Value>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictStats {
    /// Per-district records, passed through untouched.
    pub districts: Vec<Value>,
    pub timestamp: Option<String>,
    /// Districts with no `severe` and no `high` alerts.
    pub safe_districts: u64,
}

impl From<RawDistricts> for DistrictStats {
    fn from(raw: RawDistricts) -> Self {
        let count = |d: &Value, key: &str| d.get(key).and_then(Value::as_f64).unwrap_or(0.0);
        let safe_districts = raw
            .districts
            .iter()
            .filter(|d| count(d, "severe") == 0.0 && count(d, "high") == 0.0)
            .count() as u64;
        Self {
            districts: raw.districts,
            timestamp: raw.timestamp,
            safe_districts,
        }
    }
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HighRiskZone {
    pub id: String,
    pub name: String,
    pub predicted_risk: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Advisory {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PredictionFactors {
    pub rain_probability: f64,
    pub tidal_effect: f64,
    pub current_flood_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Prediction {
    /// 0-100.
    #[serde(default)]
    pub next_6h_risk: f64,
    #[serde(default)]
    pub risk_level: String,
    #[serde(default)]
    pub high_risk_zones: Vec<HighRiskZone>,
    #[serde(default)]
    pub advisory: Advisory,
    #[serde(default)]
    pub factors: Option<PredictionFactors>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPrediction {
    pub prediction: Option<Prediction>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

// ---------------------------------------------------------------------------
// Weather
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictWeather {
    pub district: String,
    #[serde(default)]
    pub district_name: Option<String>,
    #[serde(default)]
    pub temp: f64,
    #[serde(default)]
    pub humidity: f64,
    #[serde(default)]
    pub wind_speed: Option<f64>,
    #[serde(default)]
    pub is_raining: bool,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawWeather {
    #[serde(default)]
    pub data: Vec<DistrictWeather>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherInfo {
    pub temperature: f64,
    pub humidity: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherResponse {
    pub current: WeatherInfo,
    /// `"<district>: <temp>°C"` entries joined by `", "`.
    pub forecast: String,
}

impl From<RawWeather> for WeatherResponse {
    fn from(raw: RawWeather) -> Self {
        let Some(first) = raw.data.first() else {
            return Self {
                current: WeatherInfo {
                    temperature: 0.0,
                    humidity: 0.0,
                    description: "N/A".to_string(),
                },
                forecast: String::new(),
            };
        };
        Self {
            current: WeatherInfo {
                temperature: first.temp,
                humidity: first.humidity,
                description: first.description.clone(),
            },
            forecast: raw
                .data
                .iter()
                .map(|d| format!("{}: {}°C", d.district, d.temp))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

// ---------------------------------------------------------------------------
// Risk analysis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAnalysis {
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub weather_summary: String,
    #[serde(default)]
    pub flood_data: Value,
}

// ---------------------------------------------------------------------------
// Reports and nearby floods
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecentReports {
    #[serde(default)]
    pub reports: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNearbyFloods {
    #[serde(default)]
    pub crowd_reports: Vec<Value>,
    #[serde(default)]
    pub sensor_data: Vec<Value>,
}

impl RawNearbyFloods {
    /// Crowd points first, then sensor points.
    pub fn into_points(self, normalizer: &Normalizer) -> Vec<FloodPoint> {
        let mut points = normalizer.normalize_batch(&self.crowd_reports, SourceKind::Crowd);
        points.extend(normalizer.normalize_batch(&self.sensor_data, SourceKind::Sensor));
        points
    }
}

#[cfg(test)]
mod tests {
    use floodwatch_core::types::Severity;
    use serde_json::json;

    use super::*;

    #[test]
    fn health_accepts_structured_dependency_status() {
        let health: HealthStatus = serde_json::from_value(json!({
            "status": "ok",
            "orion_ld": {"status": "up", "latency_ms": 12},
            "cratedb": "up",
        }))
        .unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.orion_ld["status"], "up");
        assert_eq!(health.cratedb, "up");

        let bare: HealthStatus = serde_json::from_value(json!({"status": "ok"})).unwrap();
        assert!(bare.orion_ld.is_null());
    }

    #[test]
    fn stats_mapping_sums_active_zones() {
        let raw: RawStats = serde_json::from_value(json!({
            "total": 12, "severe": 2, "high": 3, "medium": 4, "low": 1,
            "avgWaterLevel": 0.4, "lastUpdated": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        let stats = DashboardStats::from(raw);
        assert_eq!(stats.total_alerts, 12);
        assert_eq!(stats.severe_alerts, 2);
        assert_eq!(stats.active_zones, 8);
        assert_eq!(stats.sensor_count, 0);
        assert_eq!(stats.last_updated, "2024-01-01T00:00:00Z");
    }

    #[test]
    fn empty_stats_default_to_zero() {
        let stats = DashboardStats::from(serde_json::from_value::<RawStats>(json!({})).unwrap());
        assert_eq!(stats.total_alerts, 0);
        assert!(!stats.last_updated.is_empty());
    }

    #[test]
    fn safe_districts_have_no_severe_or_high() {
        let raw: RawDistricts = serde_json::from_value(json!({
            "districts": [
                {"name": "Q1", "severe": 0, "high": 0, "medium": 3},
                {"name": "Q4", "severe": 1, "high": 0},
                {"name": "Q7", "high": 2},
                {"name": "Q9"}
            ]
        }))
        .unwrap();
        assert_eq!(DistrictStats::from(raw).safe_districts, 2);
    }

    #[test]
    fn weather_uses_first_district_and_joins_forecast() {
        let raw: RawWeather = serde_json::from_value(json!({
            "success": true,
            "data": [
                {"district": "q1", "temp": 31.5, "humidity": 70, "isRaining": false, "description": "cloudy"},
                {"district": "q7", "temp": 30, "humidity": 80, "isRaining": true, "description": "rain"}
            ]
        }))
        .unwrap();
        let weather = WeatherResponse::from(raw);
        assert_eq!(weather.current.temperature, 31.5);
        assert_eq!(weather.current.description, "cloudy");
        assert_eq!(weather.forecast, "q1: 31.5°C, q7: 30°C");
    }

    #[test]
    fn empty_weather_is_placeholder() {
        let weather = WeatherResponse::from(RawWeather::default());
        assert_eq!(weather.current.description, "N/A");
        assert!(weather.forecast.is_empty());
    }

    #[test]
    fn nearby_floods_normalize_both_sources() {
        let raw: RawNearbyFloods = serde_json::from_value(json!({
            "crowd_reports": [{"entity_id": "c1", "lat": 10.7, "lng": 106.6, "waterlevel": 0.35, "risklevel": "high"}],
            "sensor_data": [{"zoneid": "z1", "lat": 10.8, "lng": 106.7, "waterlevel": 1.1}]
        }))
        .unwrap();
        let points = raw.into_points(&Normalizer::default());
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].id, "c1");
        assert_eq!(points[0].severity, Severity::High);
        assert_eq!(points[1].id, "z1");
        assert_eq!(points[1].severity, Severity::Severe);
    }
}
