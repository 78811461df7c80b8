//! REST client for the flood backend.
//!
//! Wraps the backend HTTP endpoints using [`reqwest`] and maps every
//! response onto the dashboard models in [`crate::models`].

use serde::de::DeserializeOwned;

use floodwatch_core::normalize::Normalizer;
use floodwatch_core::report::Report;
use floodwatch_core::types::FloodPoint;

use crate::models::{
    DashboardStats, DistrictStats, HealthStatus, Prediction, RawDistricts, RawNearbyFloods,
    RawPrediction, RawRecentReports, RawStats, RawWeather, RiskAnalysis, WeatherResponse,
};

/// Errors from the REST layer.
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    /// The HTTP request itself failed (network, DNS, TLS, body decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("API error ({status}): {body}")]
    ApiError {
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// The response was well-formed JSON but missing required content.
    #[error("Unexpected response from {endpoint}: {reason}")]
    Unexpected { endpoint: String, reason: String },
}

/// Longest error body kept in [`RestError::ApiError`].
const MAX_ERROR_BODY: usize = 200;

/// HTTP client for a single backend.
#[derive(Debug, Clone)]
pub struct FloodApi {
    client: reqwest::Client,
    base_url: String,
    normalizer: Normalizer,
}

impl FloodApi {
    /// `base_url` without a trailing slash, e.g. `http://localhost:8000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            normalizer: Normalizer::default(),
        }
    }

    /// Replace the normalizer used for nearby-flood points.
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Backend root every endpoint path is appended to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthStatus, RestError> {
        self.get_json("/health", &[]).await
    }

    /// `GET /api/dashboard/stats`
    pub async fn stats(&self) -> Result<DashboardStats, RestError> {
        let raw: RawStats = self.get_json("/api/dashboard/stats", &[]).await?;
        Ok(raw.into())
    }

    /// `GET /api/dashboard/districts`
    pub async fn district_stats(&self) -> Result<DistrictStats, RestError> {
        let raw: RawDistricts = self.get_json("/api/dashboard/districts", &[]).await?;
        Ok(raw.into())
    }

    /// `GET /api/flood/prediction`
    pub async fn prediction(&self) -> Result<Prediction, RestError> {
        let endpoint = "/api/flood/prediction";
        let raw: RawPrediction = self.get_json(endpoint, &[]).await?;
        raw.prediction.ok_or_else(|| RestError::Unexpected {
            endpoint: endpoint.to_string(),
            reason: "missing `prediction`".to_string(),
        })
    }

    /// `GET /api/weather/current`
    pub async fn current_weather(&self) -> Result<WeatherResponse, RestError> {
        let raw: RawWeather = self.get_json("/api/weather/current", &[]).await?;
        Ok(raw.into())
    }

    /// `GET /api/flood/risk-analysis`
    pub async fn risk_analysis(&self) -> Result<RiskAnalysis, RestError> {
        self.get_json("/api/flood/risk-analysis", &[]).await
    }

    /// `GET /api/reports/recent?limit&hours`
    pub async fn recent_reports(&self, limit: u32, hours: u32) -> Result<Vec<Report>, RestError> {
        let raw: RawRecentReports = self
            .get_json(
                "/api/reports/recent",
                &[("limit", limit.to_string()), ("hours", hours.to_string())],
            )
            .await?;
        Ok(raw.reports.iter().map(Report::from_backend).collect())
    }

    /// `GET /api/flood/nearby?lat&lng&radius&limit`, normalized to points.
    pub async fn nearby_floods(
        &self,
        lat: f64,
        lng: f64,
        radius_km: f64,
        limit: u32,
    ) -> Result<Vec<FloodPoint>, RestError> {
        let raw: RawNearbyFloods = self
            .get_json(
                "/api/flood/nearby",
                &[
                    ("lat", lat.to_string()),
                    ("lng", lng.to_string()),
                    ("radius", radius_km.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        tracing::debug!(
            crowd = raw.crowd_reports.len(),
            sensor = raw.sensor_data.len(),
            "Fetched nearby floods",
        );
        Ok(raw.into_points(&self.normalizer))
    }

    // ---- private helpers ----

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, RestError> {
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!(url = %url, "Fetching");
        let response = self.client.get(&url).query(query).send().await?;
        Self::parse_response(response).await
    }

    /// Ensure the response has a success status code, or turn it into a
    /// [`RestError::ApiError`] carrying the status and (truncated) body.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, RestError> {
        let status = response.status();
        if !status.is_success() {
            let mut body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            if let Some((idx, _)) = body.char_indices().nth(MAX_ERROR_BODY) {
                body.truncate(idx);
            }
            return Err(RestError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RestError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
