//! Canonical map types shared by every stage of the pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Four-level flood severity, ordered `Low < Medium < High < Severe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Severe,
}

/// Depth (cm) at or above which a reading counts as `Medium`.
pub const MEDIUM_DEPTH_CM: f64 = 20.0;
/// Depth (cm) at or above which a reading counts as `High`.
pub const HIGH_DEPTH_CM: f64 = 50.0;
/// Depth (cm) at or above which a reading counts as `Severe`.
pub const SEVERE_DEPTH_CM: f64 = 100.0;

impl Severity {
    /// Ordinal used for max-aggregation in clusters (`low=1 .. severe=4`).
    pub fn score(self) -> u8 {
        match self {
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Severe => 4,
        }
    }

    /// Inverse of [`score`](Self::score). Anything below 2 is `Low`.
    pub fn from_score(score: u8) -> Self {
        match score {
            s if s >= 4 => Severity::Severe,
            3 => Severity::High,
            2 => Severity::Medium,
            _ => Severity::Low,
        }
    }

    /// Classify a water depth in centimeters.
    ///
    /// Zero, negative and non-finite depths are `Low`.
    pub fn from_depth_cm(depth_cm: f64) -> Self {
        if !depth_cm.is_finite() || depth_cm <= 0.0 {
            return Severity::Low;
        }
        if depth_cm < MEDIUM_DEPTH_CM {
            Severity::Low
        } else if depth_cm < HIGH_DEPTH_CM {
            Severity::Medium
        } else if depth_cm < SEVERE_DEPTH_CM {
            Severity::High
        } else {
            Severity::Severe
        }
    }

    /// Map a free-form backend label onto the four-level scale.
    ///
    /// Case-insensitive substring match, checked in order `severe`, `high`,
    /// `moderate|medium`; everything else is `Low`.
    pub fn from_label(label: &str) -> Self {
        let s = label.to_lowercase();
        if s.contains("severe") {
            Severity::Severe
        } else if s.contains("high") {
            Severity::High
        } else if s.contains("moderate") || s.contains("medium") {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Severe => "severe",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// A WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

// ---------------------------------------------------------------------------
// FloodPoint
// ---------------------------------------------------------------------------

/// Canonical flood observation after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloodPoint {
    /// Source entity id, or a synthesized `<kind>-<uuid>` when absent.
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    /// Water depth in centimeters.
    pub depth: f64,
    pub location_name: String,
    pub severity: Severity,
    /// ISO-8601 timestamp.
    pub timestamp: String,
}

impl FloodPoint {
    /// Where the point sits on the map.
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }
}

/// Where a raw record came from; selects the field aliases used by the
/// normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Crowd,
    Sensor,
    Local,
    Synthetic,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Crowd => "crowd",
            SourceKind::Sensor => "sensor",
            SourceKind::Local => "local",
            SourceKind::Synthetic => "synthetic",
        }
    }
}

// ---------------------------------------------------------------------------
// Viewport
// ---------------------------------------------------------------------------

/// Visible map rectangle plus integer zoom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
    pub zoom: u8,
}

impl Viewport {
    /// Build a viewport, rejecting non-finite bounds and inverted latitudes.
    ///
    /// `west > east` is accepted: it describes a box crossing the
    /// antimeridian.
    pub fn new(west: f64, south: f64, east: f64, north: f64, zoom: u8) -> Result<Self, CoreError> {
        if ![west, south, east, north].iter().all(|v| v.is_finite()) {
            return Err(CoreError::Validation(
                "Viewport bounds must be finite".to_string(),
            ));
        }
        if south > north {
            return Err(CoreError::Validation(format!(
                "Viewport south ({south}) must not exceed north ({north})"
            )));
        }
        Ok(Self {
            west,
            south,
            east,
            north,
            zoom,
        })
    }

    /// Square viewport of `half_span` degrees around `center`.
    pub fn around(center: GeoPoint, half_span: f64, zoom: u8) -> Self {
        Self {
            west: center.lng - half_span,
            south: center.lat - half_span,
            east: center.lng + half_span,
            north: center.lat + half_span,
            zoom,
        }
    }

    /// Midpoint of the box.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new((self.south + self.north) / 2.0, (self.west + self.east) / 2.0)
    }
}
