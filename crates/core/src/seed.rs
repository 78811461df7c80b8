//! Deterministic fallback dataset for a cold or offline backend.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::normalize::{now_iso, Normalizer};
use crate::report::Report;
use crate::types::{FloodPoint, GeoPoint, SourceKind};

pub const SEED_LOCATION_NAME: &str = "Demo area";

/// Shape of the fallback dataset.
#[derive(Debug, Clone)]
pub struct SeedConfig {
    /// Number of reports to generate.
    pub count: usize,
    /// Center of the square patch the points are scattered over.
    pub center: GeoPoint,
    /// Full width of the square patch, in degrees.
    pub spread_deg: f64,
    /// Water depth range in centimeters.
    pub min_depth_cm: f64,
    pub max_depth_cm: f64,
    /// The same seed always yields the same dataset.
    pub rng_seed: u64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            count: 5,
            center: GeoPoint::new(10.77, 106.70),
            spread_deg: 0.01,
            min_depth_cm: 30.0,
            max_depth_cm: 80.0,
            rng_seed: 0x464c_4f4f_44,
        }
    }
}

/// Reports plus the map points they project to.
#[derive(Debug, Clone, Default)]
pub struct SeedDataset {
    pub reports: Vec<Report>,
    pub points: Vec<FloodPoint>,
}

/// Build the fallback dataset. The same config always yields the same
/// coordinates and depths.
pub fn fallback_dataset(config: &SeedConfig, normalizer: &Normalizer) -> SeedDataset {
    let mut rng = StdRng::seed_from_u64(config.rng_seed);
    let half = config.spread_deg / 2.0;
    let now = now_iso();

    let reports: Vec<Report> = (0..config.count)
        .map(|i| {
            let lat = config.center.lat + rng.random_range(-half..=half);
            let lng = config.center.lng + rng.random_range(-half..=half);
            let depth = rng.random_range(config.min_depth_cm..=config.max_depth_cm);
            let label = if depth > 70.0 {
                "Severe"
            } else if depth > 50.0 {
                "High"
            } else {
                "Medium"
            };
            Report {
                id: format!("fake-{i}"),
                latitude: lat,
                longitude: lng,
                description: format!("Demo report #{} - water about {depth:.0} cm", i + 1),
                location_name: Some(SEED_LOCATION_NAME.to_string()),
                timestamp: now.clone(),
                status: "active".to_string(),
                images: Vec::new(),
                water_level: Some(depth / 100.0),
                risk_score: Some(depth / 100.0),
                risk_level: Some(label.to_string()),
                address: Some(SEED_LOCATION_NAME.to_string()),
                confidence: Some("Demo".to_string()),
                reported_at: Some(now.clone()),
                kind: "community".to_string(),
            }
        })
        .collect();

    let points = reports
        .iter()
        .map(|r| normalizer.normalize(&r.to_local_record(), SourceKind::Synthetic))
        .collect();

    SeedDataset { reports, points }
}

/// Points only.
pub fn fallback_points(config: &SeedConfig) -> Vec<FloodPoint> {
    fallback_dataset(config, &Normalizer::default()).points
}
