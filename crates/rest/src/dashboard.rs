//! One-shot dashboard load with per-field failure isolation.
//!
//! A health check gates the load. After it passes, every data fetch runs
//! concurrently and fails on its own: a broken endpoint leaves its field
//! empty and adds an entry to [`DashboardSnapshot::errors`], while its
//! siblings still populate.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

use floodwatch_core::report::Report;
use floodwatch_core::types::{FloodPoint, GeoPoint};

use crate::client::{FloodApi, RestError};
use crate::models::{DashboardStats, DistrictStats, HealthStatus, Prediction, RiskAnalysis, WeatherResponse};

/// Error key for a failed health check.
pub const GENERAL_ERROR_KEY: &str = "general";

/// Recent reports requested on load.
pub const RECENT_REPORTS_LIMIT: u32 = 10;
pub const RECENT_REPORTS_HOURS: u32 = 24;
/// Nearby flood points requested on load.
pub const NEARBY_LIMIT: u32 = 100;

/// Everything the dashboard loader needs from a backend.
#[async_trait]
pub trait DashboardSource: Send + Sync {
    async fn health(&self) -> Result<HealthStatus, RestError>;
    async fn stats(&self) -> Result<DashboardStats, RestError>;
    async fn district_stats(&self) -> Result<DistrictStats, RestError>;
    async fn prediction(&self) -> Result<Prediction, RestError>;
    async fn current_weather(&self) -> Result<WeatherResponse, RestError>;
    async fn risk_analysis(&self) -> Result<RiskAnalysis, RestError>;
    async fn recent_reports(&self, limit: u32, hours: u32) -> Result<Vec<Report>, RestError>;
    async fn nearby_floods(
        &self,
        lat: f64,
        lng: f64,
        radius_km: f64,
        limit: u32,
    ) -> Result<Vec<FloodPoint>, RestError>;
}

#[async_trait]
impl DashboardSource for FloodApi {
    async fn health(&self) -> Result<HealthStatus, RestError> {
        FloodApi::health(self).await
    }

    async fn stats(&self) -> Result<DashboardStats, RestError> {
        FloodApi::stats(self).await
    }

    async fn district_stats(&self) -> Result<DistrictStats, RestError> {
        FloodApi::district_stats(self).await
    }

    async fn prediction(&self) -> Result<Prediction, RestError> {
        FloodApi::prediction(self).await
    }

    async fn current_weather(&self) -> Result<WeatherResponse, RestError> {
        FloodApi::current_weather(self).await
    }

    async fn risk_analysis(&self) -> Result<RiskAnalysis, RestError> {
        FloodApi::risk_analysis(self).await
    }

    async fn recent_reports(&self, limit: u32, hours: u32) -> Result<Vec<Report>, RestError> {
        FloodApi::recent_reports(self, limit, hours).await
    }

    async fn nearby_floods(
        &self,
        lat: f64,
        lng: f64,
        radius_km: f64,
        limit: u32,
    ) -> Result<Vec<FloodPoint>, RestError> {
        FloodApi::nearby_floods(self, lat, lng, radius_km, limit).await
    }
}

/// Result of one dashboard load.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub stats: Option<DashboardStats>,
    pub district_stats: Option<DistrictStats>,
    pub prediction: Option<Prediction>,
    pub weather: Option<WeatherResponse>,
    pub risk_analysis: Option<RiskAnalysis>,
    pub recent_reports: Vec<Report>,
    /// Map points from the nearby-floods endpoint.
    pub points: Vec<FloodPoint>,
    /// Field name to error message for every fetch that failed.
    pub errors: BTreeMap<String, String>,
}

impl DashboardSnapshot {
    /// Whether the health check failed and nothing else was attempted.
    pub fn backend_unavailable(&self) -> bool {
        self.errors.contains_key(GENERAL_ERROR_KEY)
    }
}

/// Load the dashboard from `source`, centering the nearby-flood query on
/// `viewer`.
pub async fn load_dashboard<S>(source: &S, viewer: GeoPoint, nearby_radius_km: f64) -> DashboardSnapshot
where
    S: DashboardSource + ?Sized,
{
    let mut snapshot = DashboardSnapshot::default();

    if let Err(e) = source.health().await {
        tracing::error!(error = %e, "Backend health check failed");
        snapshot
            .errors
            .insert(GENERAL_ERROR_KEY.to_string(), format!("Backend unavailable: {e}"));
        return snapshot;
    }

    let (stats, districts, prediction, weather, risk, reports, nearby) = tokio::join!(
        source.stats(),
        source.district_stats(),
        source.prediction(),
        source.current_weather(),
        source.risk_analysis(),
        source.recent_reports(RECENT_REPORTS_LIMIT, RECENT_REPORTS_HOURS),
        source.nearby_floods(viewer.lat, viewer.lng, nearby_radius_km, NEARBY_LIMIT),
    );

    let errors = &mut snapshot.errors;
    snapshot.stats = isolate(errors, "stats", stats);
    snapshot.district_stats = isolate(errors, "districts", districts);
    snapshot.prediction = isolate(errors, "prediction", prediction);
    snapshot.weather = isolate(errors, "weather", weather);
    snapshot.risk_analysis = isolate(errors, "riskAnalysis", risk);
    snapshot.recent_reports = isolate(errors, "reports", reports).unwrap_or_default();
    snapshot.points = isolate(errors, "floods", nearby).unwrap_or_default();

    if let (Some(stats), Some(districts)) = (&mut snapshot.stats, &snapshot.district_stats) {
        stats.safe_districts = districts.safe_districts;
    }

    tracing::info!(
        points = snapshot.points.len(),
        reports = snapshot.recent_reports.len(),
        failed = snapshot.errors.len(),
        "Dashboard loaded",
    );
    snapshot
}

fn isolate<T>(errors: &mut BTreeMap<String, String>, field: &str, result: Result<T, RestError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(field, error = %e, "Dashboard fetch failed");
            errors.insert(field.to_string(), e.to_string());
            None
        }
    }
}
