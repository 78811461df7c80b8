//! Dashboard configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use floodwatch_core::cluster::ClusterConfig;
use floodwatch_core::reconcile::ReconcileConfig;
use floodwatch_core::seed::SeedConfig;
use floodwatch_core::types::GeoPoint;
use floodwatch_core::zones::REFERENCE_CENTER;
use floodwatch_stream::session::{
    ChannelConfig, DEFAULT_POLL_INTERVAL, DEFAULT_STREAM_RADIUS_KM, DEFAULT_STREAM_URL,
};

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_LOCAL_REPORTS: &str = "floodwatch_local_reports.json";
const DEFAULT_NEARBY_RADIUS_KM: f64 = 10.0;

/// Runtime configuration.
///
/// # Environment variables
///
/// | Variable                        | Default                          | Description                                  |
/// |---------------------------------|----------------------------------|----------------------------------------------|
/// | `FLOODWATCH_API_URL`            | `http://localhost:8000`          | Backend REST base URL                        |
/// | `FLOODWATCH_STREAM_URL`         | `ws://localhost:8000/ws/map`     | Push-channel WebSocket URL                   |
/// | `FLOODWATCH_LOCAL_REPORTS`      | `floodwatch_local_reports.json`  | Local report log file                        |
/// | `FLOODWATCH_POLL_INTERVAL_SECS` | `7`                              | Seconds between channel polls                |
/// | `FLOODWATCH_STREAM_RADIUS_KM`   | `20`                             | Radius sent in the channel `init` frame      |
/// | `FLOODWATCH_NEARBY_RADIUS_KM`   | `10`                             | Radius for the REST nearby-floods query      |
/// | `FLOODWATCH_VIEWER_LAT`         | `10.762622`                      | Initial viewer latitude                      |
/// | `FLOODWATCH_VIEWER_LNG`         | `106.660172`                     | Initial viewer longitude                     |
/// | `FLOODWATCH_SEED`               | built-in                         | RNG seed for the fallback dataset            |
///
/// Unparsable values are logged and replaced by the default.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub api_url: String,
    pub stream_url: String,
    pub local_reports_path: String,
    pub poll_interval: Duration,
    pub stream_radius_km: f64,
    pub nearby_radius_km: f64,
    pub viewer: GeoPoint,
    pub reconcile: ReconcileConfig,
    pub cluster: ClusterConfig,
    pub seed: SeedConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            stream_url: DEFAULT_STREAM_URL.to_string(),
            local_reports_path: DEFAULT_LOCAL_REPORTS.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            stream_radius_km: DEFAULT_STREAM_RADIUS_KM,
            nearby_radius_km: DEFAULT_NEARBY_RADIUS_KM,
            viewer: REFERENCE_CENTER,
            reconcile: ReconcileConfig::default(),
            cluster: ClusterConfig::default(),
            seed: SeedConfig::default(),
        }
    }
}

impl DashboardConfig {
    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Used by [`from_env`](Self::from_env)
    /// and by tests.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let poll_secs = parse_or(&lookup, "FLOODWATCH_POLL_INTERVAL_SECS", defaults.poll_interval.as_secs());
        let poll_interval = if poll_secs == 0 {
            tracing::warn!("FLOODWATCH_POLL_INTERVAL_SECS must be positive, using default");
            defaults.poll_interval
        } else {
            Duration::from_secs(poll_secs)
        };

        Self {
            api_url: lookup("FLOODWATCH_API_URL").unwrap_or(defaults.api_url),
            stream_url: lookup("FLOODWATCH_STREAM_URL").unwrap_or(defaults.stream_url),
            local_reports_path: lookup("FLOODWATCH_LOCAL_REPORTS").unwrap_or(defaults.local_reports_path),
            poll_interval,
            stream_radius_km: parse_or(&lookup, "FLOODWATCH_STREAM_RADIUS_KM", defaults.stream_radius_km),
            nearby_radius_km: parse_or(&lookup, "FLOODWATCH_NEARBY_RADIUS_KM", defaults.nearby_radius_km),
            viewer: GeoPoint::new(
                parse_or(&lookup, "FLOODWATCH_VIEWER_LAT", defaults.viewer.lat),
                parse_or(&lookup, "FLOODWATCH_VIEWER_LNG", defaults.viewer.lng),
            ),
            reconcile: defaults.reconcile,
            cluster: defaults.cluster,
            seed: SeedConfig {
                rng_seed: parse_or(&lookup, "FLOODWATCH_SEED", defaults.seed.rng_seed),
                ..defaults.seed
            },
        }
    }

    /// Channel settings for a session centered on `viewer`.
    pub fn channel_config(&self, viewer: GeoPoint) -> ChannelConfig {
        ChannelConfig {
            url: self.stream_url.clone(),
            viewer,
            radius_km: self.stream_radius_km,
            poll_interval: self.poll_interval,
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %value, "Invalid configuration value, using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> DashboardConfig {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        DashboardConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = from_pairs(&[]);
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.stream_url, "ws://localhost:8000/ws/map");
        assert_eq!(config.poll_interval, Duration::from_secs(7));
        assert_eq!(config.stream_radius_km, 20.0);
        assert_eq!(config.nearby_radius_km, 10.0);
        assert_eq!(config.viewer, REFERENCE_CENTER);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = from_pairs(&[
            ("FLOODWATCH_API_URL", "http://backend:9000"),
            ("FLOODWATCH_POLL_INTERVAL_SECS", "3"),
            ("FLOODWATCH_VIEWER_LAT", "10.8"),
            ("FLOODWATCH_VIEWER_LNG", "106.7"),
            ("FLOODWATCH_SEED", "42"),
        ]);
        assert_eq!(config.api_url, "http://backend:9000");
        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert_eq!(config.viewer, GeoPoint::new(10.8, 106.7));
        assert_eq!(config.seed.rng_seed, 42);
        assert_eq!(config.seed.count, 5);
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = from_pairs(&[
            ("FLOODWATCH_POLL_INTERVAL_SECS", "0"),
            ("FLOODWATCH_STREAM_RADIUS_KM", "wide"),
        ]);
        assert_eq!(config.poll_interval, Duration::from_secs(7));
        assert_eq!(config.stream_radius_km, 20.0);
    }

    #[test]
    fn channel_config_uses_given_viewer() {
        let config = from_pairs(&[]);
        let channel = config.channel_config(GeoPoint::new(10.9, 106.8));
        assert_eq!(channel.viewer, GeoPoint::new(10.9, 106.8));
        assert_eq!(channel.radius_km, 20.0);
    }
}
