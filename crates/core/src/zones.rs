//! Static reference data for Ho Chi Minh City: the flood-zone table, the
//! city boundary and the map bounds.
//!
//! Everything here is built once from constant tables and never mutated.
//! Zone risk is a display label only; it never feeds the reconciler.

use geo::{Contains, LineString, Point, Polygon};
use serde::Serialize;

use crate::types::{FloodPoint, GeoPoint, Severity, Viewport};

/// City reference center. Used as the fallback coordinate for records
/// without a location and as the default viewer position.
pub const REFERENCE_CENTER: GeoPoint = GeoPoint::new(10.762622, 106.660172);

/// South-west corner of the interactive map bounds.
pub const MAP_BOUNDS_SW: GeoPoint = GeoPoint::new(10.3, 106.3);
/// North-east corner of the interactive map bounds.
pub const MAP_BOUNDS_NE: GeoPoint = GeoPoint::new(11.2, 107.1);
/// Lowest zoom the map allows.
pub const MIN_MAP_ZOOM: u8 = 10;

/// City boundary ring as `[lat, lng]` pairs (closed).
pub const CITY_BOUNDARY: &[[f64; 2]] = &[
    [11.16, 106.46], [11.1, 106.55], [11.0, 106.65], [10.95, 106.75],
    [10.92, 106.82], [10.88, 106.85], [10.8, 106.82], [10.7, 106.78],
    [10.6, 106.85], [10.5, 106.95], [10.35, 106.9], [10.45, 106.8],
    [10.55, 106.75], [10.65, 106.7], [10.7, 106.6], [10.75, 106.5],
    [10.85, 106.45], [10.95, 106.4], [11.05, 106.42], [11.16, 106.46],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Elevation {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Drainage {
    Poor,
    Moderate,
    Good,
}

/// Qualitative terrain description of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoneProperties {
    pub elevation: Elevation,
    pub near_river: bool,
    pub drainage: Drainage,
}

/// Parameters of the backend's water-level simulation, kept for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoneSimulation {
    /// Baseline water level in meters.
    pub base_level: f64,
    pub tidal_sensitivity: f64,
    pub rain_sensitivity: f64,
    pub drain_rate: f64,
}

/// A known flood-prone area.
#[derive(Debug, Clone, Serialize)]
pub struct FloodZone {
    pub id: &'static str,
    pub name: &'static str,
    pub district: &'static str,
    /// `[lat, lng]`.
    pub center: [f64; 2],
    /// Closed ring of `[lat, lng]` vertices.
    pub polygon: &'static [[f64; 2]],
    pub properties: ZoneProperties,
    pub simulation: ZoneSimulation,
    pub default_risk: Severity,
}

impl FloodZone {
    /// The zone outline as a `geo` polygon in `(x = lng, y = lat)` order.
    pub fn geometry(&self) -> Polygon<f64> {
        ring_to_polygon(self.polygon)
    }

    /// Strict interior containment; points on the outline are outside.
    pub fn contains(&self, point: GeoPoint) -> bool {
        self.geometry().contains(&Point::new(point.lng, point.lat))
    }
}

/// The fixed zone table.
pub fn flood_zones() -> &'static [FloodZone] {
    FLOOD_ZONES
}

/// Look a zone up by id.
pub fn zone_by_id(id: &str) -> Option<&'static FloodZone> {
    FLOOD_ZONES.iter().find(|z| z.id == id)
}

/// First zone whose polygon contains `point`.
pub fn zone_containing(point: GeoPoint) -> Option<&'static FloodZone> {
    let p = Point::new(point.lng, point.lat);
    FLOOD_ZONES.iter().find(|z| z.geometry().contains(&p))
}

/// Display risk for a zone: its default risk raised to the worst live point
/// inside the outline.
pub fn zone_risk(zone: &FloodZone, points: &[FloodPoint]) -> Severity {
    let geometry = zone.geometry();
    points
        .iter()
        .filter(|p| geometry.contains(&Point::new(p.lng, p.lat)))
        .map(|p| p.severity)
        .fold(zone.default_risk, Severity::max)
}

/// Whether `point` lies inside the city boundary.
pub fn within_city(point: GeoPoint) -> bool {
    ring_to_polygon(CITY_BOUNDARY).contains(&Point::new(point.lng, point.lat))
}

impl Viewport {
    /// Clamp to the interactive map bounds and minimum zoom.
    pub fn clamped_to_city(self) -> Viewport {
        let clamp_lng = |v: f64| v.clamp(MAP_BOUNDS_SW.lng, MAP_BOUNDS_NE.lng);
        let clamp_lat = |v: f64| v.clamp(MAP_BOUNDS_SW.lat, MAP_BOUNDS_NE.lat);
        Viewport {
            west: clamp_lng(self.west),
            south: clamp_lat(self.south),
            east: clamp_lng(self.east),
            north: clamp_lat(self.north),
            zoom: self.zoom.max(MIN_MAP_ZOOM),
        }
    }
}

fn ring_to_polygon(ring: &[[f64; 2]]) -> Polygon<f64> {
    let coords: Vec<(f64, f64)> = ring.iter().map(|[lat, lng]| (*lng, *lat)).collect();
    Polygon::new(LineString::from(coords), vec![])
}

// ---------------------------------------------------------------------------
// Zone table
// ---------------------------------------------------------------------------

static FLOOD_ZONES: &[FloodZone] = &[
    FloodZone {
        id: "zone-q4-tran-xuan-soan",
        name: "Đường Trần Xuân Soạn",
        district: "Quận 4",
        center: [10.7592, 106.703],
        polygon: &[
            [10.7565, 106.7012], [10.7572, 106.7008], [10.758, 106.7015], [10.7588, 106.7022],
            [10.7592, 106.703], [10.76, 106.7042], [10.761, 106.7055], [10.7622, 106.7065],
            [10.7628, 106.706], [10.762, 106.705], [10.7612, 106.704], [10.7605, 106.703],
            [10.7598, 106.7025], [10.7585, 106.702], [10.7575, 106.7018], [10.7565, 106.7012],
        ],
        properties: ZoneProperties {
            elevation: Elevation::Low,
            near_river: true,
            drainage: Drainage::Poor,
        },
        simulation: ZoneSimulation {
            base_level: 0.15,
            tidal_sensitivity: 0.9,
            rain_sensitivity: 0.8,
            drain_rate: 0.3,
        },
        default_risk: Severity::Severe,
    },
    FloodZone {
        id: "zone-q7-huynh-tan-phat",
        name: "Đường Huỳnh Tấn Phát",
        district: "Quận 7",
        center: [10.7355, 106.7205],
        polygon: &[
            [10.732, 106.7175], [10.7328, 106.7185], [10.7335, 106.7192], [10.7345, 106.72],
            [10.7355, 106.7205], [10.7365, 106.7215], [10.738, 106.7235], [10.7395, 106.7245],
            [10.7405, 106.7235], [10.739, 106.7225], [10.7375, 106.721], [10.736, 106.7198],
            [10.7348, 106.719], [10.7332, 106.718], [10.732, 106.7175],
        ],
        properties: ZoneProperties {
            elevation: Elevation::Low,
            near_river: true,
            drainage: Drainage::Poor,
        },
        simulation: ZoneSimulation {
            base_level: 0.12,
            tidal_sensitivity: 0.85,
            rain_sensitivity: 0.75,
            drain_rate: 0.35,
        },
        default_risk: Severity::Severe,
    },
    FloodZone {
        id: "zone-q8-au-duong-lan",
        name: "Đường Âu Dương Lân",
        district: "Quận 8",
        center: [10.7415, 106.6575],
        polygon: &[
            [10.738, 106.6545], [10.739, 106.6555], [10.74, 106.6565], [10.741, 106.657],
            [10.7415, 106.6575], [10.7425, 106.6585], [10.7435, 106.66], [10.745, 106.6615],
            [10.7455, 106.6605], [10.7445, 106.659], [10.7432, 106.6575], [10.742, 106.656],
            [10.7405, 106.655], [10.7392, 106.6535], [10.738, 106.6545],
        ],
        properties: ZoneProperties {
            elevation: Elevation::Low,
            near_river: false,
            drainage: Drainage::Poor,
        },
        simulation: ZoneSimulation {
            base_level: 0.1,
            tidal_sensitivity: 0.5,
            rain_sensitivity: 0.8,
            drain_rate: 0.35,
        },
        default_risk: Severity::High,
    },
    FloodZone {
        id: "zone-nhabe-nguyen-binh",
        name: "Đường Nguyễn Bình",
        district: "Nhà Bè",
        center: [10.689, 106.7355],
        polygon: &[
            [10.685, 106.7315], [10.6865, 106.7328], [10.688, 106.734], [10.689, 106.7355],
            [10.6905, 106.7375], [10.692, 106.7395], [10.6935, 106.738], [10.6925, 106.7365],
            [10.6912, 106.735], [10.69, 106.7335], [10.6885, 106.7325], [10.687, 106.7312],
            [10.685, 106.7315],
        ],
        properties: ZoneProperties {
            elevation: Elevation::Low,
            near_river: true,
            drainage: Drainage::Poor,
        },
        simulation: ZoneSimulation {
            base_level: 0.18,
            tidal_sensitivity: 0.85,
            rain_sensitivity: 0.75,
            drain_rate: 0.25,
        },
        default_risk: Severity::Severe,
    },
    FloodZone {
        id: "zone-binhchanh-quoc-lo-50",
        name: "Quốc lộ 50",
        district: "Bình Chánh",
        center: [10.7015, 106.619],
        polygon: &[
            [10.698, 106.615], [10.699, 106.6162], [10.7, 106.6175], [10.7015, 106.619],
            [10.703, 106.621], [10.7045, 106.6235], [10.7055, 106.6225], [10.7042, 106.6205],
            [10.703, 106.6195], [10.7018, 106.618], [10.7005, 106.6165], [10.6992, 106.6152],
            [10.698, 106.615],
        ],
        properties: ZoneProperties {
            elevation: Elevation::Low,
            near_river: false,
            drainage: Drainage::Moderate,
        },
        simulation: ZoneSimulation {
            base_level: 0.12,
            tidal_sensitivity: 0.4,
            rain_sensitivity: 0.85,
            drain_rate: 0.4,
        },
        default_risk: Severity::High,
    },
    FloodZone {
        id: "zone-binhchanh-an-suong",
        name: "Ngã tư An Sương",
        district: "Bình Chánh",
        center: [10.865, 106.6165],
        polygon: &[
            [10.862, 106.615], [10.8635, 106.6155], [10.8645, 106.616], [10.865, 106.6165],
            [10.8665, 106.619], [10.868, 106.6175], [10.8672, 106.6165], [10.866, 106.6155],
            [10.8648, 106.6145], [10.863, 106.614], [10.862, 106.615],
        ],
        properties: ZoneProperties {
            elevation: Elevation::Medium,
            near_river: false,
            drainage: Drainage::Moderate,
        },
        simulation: ZoneSimulation {
            base_level: 0.09,
            tidal_sensitivity: 0.3,
            rain_sensitivity: 0.75,
            drain_rate: 0.45,
        },
        default_risk: Severity::High,
    },
    FloodZone {
        id: "zone-q8-pham-hung",
        name: "Đường Phạm Hùng",
        district: "Quận 8",
        center: [10.7258, 106.6812],
        polygon: &[
            [10.722, 106.678], [10.7235, 106.6795], [10.7245, 106.6805], [10.7258, 106.6812],
            [10.7275, 106.6835], [10.7295, 106.6845], [10.7285, 106.683], [10.7272, 106.6815],
            [10.726, 106.68], [10.724, 106.6788], [10.722, 106.678],
        ],
        properties: ZoneProperties {
            elevation: Elevation::Low,
            near_river: false,
            drainage: Drainage::Moderate,
        },
        simulation: ZoneSimulation {
            base_level: 0.1,
            tidal_sensitivity: 0.5,
            rain_sensitivity: 0.85,
            drain_rate: 0.4,
        },
        default_risk: Severity::High,
    },
    FloodZone {
        id: "zone-q1-calmette",
        name: "Đường Calmette",
        district: "Quận 1",
        center: [10.772, 106.6995],
        polygon: &[
            [10.7695, 106.698], [10.7705, 106.699], [10.7715, 106.6995], [10.772, 106.6995],
            [10.7735, 106.7015], [10.7745, 106.701], [10.774, 106.7], [10.773, 106.6992],
            [10.772, 106.6985], [10.771, 106.6978], [10.7695, 106.698],
        ],
        properties: ZoneProperties {
            elevation: Elevation::Medium,
            near_river: false,
            drainage: Drainage::Moderate,
        },
        simulation: ZoneSimulation {
            base_level: 0.05,
            tidal_sensitivity: 0.3,
            rain_sensitivity: 0.7,
            drain_rate: 0.6,
        },
        default_risk: Severity::Medium,
    },
    FloodZone {
        id: "zone-q1-nguyen-thai-binh",
        name: "Đường Nguyễn Thái Bình",
        district: "Quận 1",
        center: [10.774, 106.696],
        polygon: &[
            [10.772, 106.695], [10.773, 106.6955], [10.774, 106.696], [10.775, 106.6975],
            [10.776, 106.6968], [10.7752, 106.696], [10.7742, 106.695], [10.7732, 106.6942],
            [10.772, 106.695],
        ],
        properties: ZoneProperties {
            elevation: Elevation::Medium,
            near_river: false,
            drainage: Drainage::Moderate,
        },
        simulation: ZoneSimulation {
            base_level: 0.06,
            tidal_sensitivity: 0.3,
            rain_sensitivity: 0.65,
            drain_rate: 0.55,
        },
        default_risk: Severity::Medium,
    },
    FloodZone {
        id: "zone-q1-co-giang",
        name: "Đường Cô Giang",
        district: "Quận 1",
        center: [10.7685, 106.694],
        polygon: &[
            [10.766, 106.692], [10.7675, 106.6932], [10.7685, 106.694], [10.7702, 106.696],
            [10.7712, 106.6952], [10.77, 106.694], [10.7688, 106.6928], [10.7675, 106.6918],
            [10.766, 106.692],
        ],
        properties: ZoneProperties {
            elevation: Elevation::Medium,
            near_river: false,
            drainage: Drainage::Moderate,
        },
        simulation: ZoneSimulation {
            base_level: 0.06,
            tidal_sensitivity: 0.35,
            rain_sensitivity: 0.7,
            drain_rate: 0.55,
        },
        default_risk: Severity::Medium,
    },
    FloodZone {
        id: "zone-binhthanh-xo-viet-nghe-tinh",
        name: "Xô Viết Nghệ Tĩnh",
        district: "Bình Thạnh",
        center: [10.8058, 106.7075],
        polygon: &[
            [10.802, 106.705], [10.8035, 106.706], [10.8048, 106.707], [10.8058, 106.7075],
            [10.8075, 106.7095], [10.809, 106.711], [10.8098, 106.7098], [10.8085, 106.7082],
            [10.807, 106.707], [10.8055, 106.7055], [10.804, 106.7045], [10.802, 106.705],
        ],
        properties: ZoneProperties {
            elevation: Elevation::Medium,
            near_river: false,
            drainage: Drainage::Moderate,
        },
        simulation: ZoneSimulation {
            base_level: 0.08,
            tidal_sensitivity: 0.4,
            rain_sensitivity: 0.8,
            drain_rate: 0.5,
        },
        default_risk: Severity::High,
    },
    FloodZone {
        id: "zone-thuduc-do-xuan-hop",
        name: "Đường Đỗ Xuân Hợp",
        district: "Thủ Đức",
        center: [10.822, 106.7692],
        polygon: &[
            [10.818, 106.765], [10.8195, 106.7665], [10.821, 106.768], [10.822, 106.7692],
            [10.8245, 106.7725], [10.8262, 106.7735], [10.8252, 106.772], [10.824, 106.7705],
            [10.823, 106.769], [10.8215, 106.7675], [10.82, 106.766], [10.818, 106.765],
        ],
        properties: ZoneProperties {
            elevation: Elevation::Medium,
            near_river: false,
            drainage: Drainage::Moderate,
        },
        simulation: ZoneSimulation {
            base_level: 0.08,
            tidal_sensitivity: 0.3,
            rain_sensitivity: 0.75,
            drain_rate: 0.5,
        },
        default_risk: Severity::High,
    },
    FloodZone {
        id: "zone-thuduc-nguyen-duy-trinh",
        name: "Đường Nguyễn Duy Trinh",
        district: "Thủ Đức",
        center: [10.7918, 106.7855],
        polygon: &[
            [10.788, 106.782], [10.7895, 106.7835], [10.791, 106.785], [10.7918, 106.7855],
            [10.794, 106.7885], [10.796, 106.7895], [10.795, 106.788], [10.7935, 106.7865],
            [10.792, 106.785], [10.7905, 106.7835], [10.788, 106.782],
        ],
        properties: ZoneProperties {
            elevation: Elevation::Medium,
            near_river: false,
            drainage: Drainage::Moderate,
        },
        simulation: ZoneSimulation {
            base_level: 0.07,
            tidal_sensitivity: 0.25,
            rain_sensitivity: 0.7,
            drain_rate: 0.55,
        },
        default_risk: Severity::Medium,
    },
    FloodZone {
        id: "zone-govap-pham-van-dong",
        name: "Đường Phạm Văn Đồng",
        district: "Gò Vấp",
        center: [10.842, 106.6855],
        polygon: &[
            [10.838, 106.682], [10.8395, 106.6835], [10.841, 106.685], [10.842, 106.6855],
            [10.8435, 106.6875], [10.846, 106.6895], [10.845, 106.6885], [10.8435, 106.6865],
            [10.842, 106.6845], [10.84, 106.6825], [10.838, 106.682],
        ],
        properties: ZoneProperties {
            elevation: Elevation::Medium,
            near_river: false,
            drainage: Drainage::Moderate,
        },
        simulation: ZoneSimulation {
            base_level: 0.06,
            tidal_sensitivity: 0.2,
            rain_sensitivity: 0.7,
            drain_rate: 0.6,
        },
        default_risk: Severity::Medium,
    },
    FloodZone {
        id: "zone-tanbinh-truong-chinh",
        name: "Đường Trường Chinh",
        district: "Tân Bình",
        center: [10.8158, 106.6455],
        polygon: &[
            [10.812, 106.642], [10.8135, 106.6435], [10.815, 106.645], [10.8158, 106.6455],
            [10.8175, 106.648], [10.819, 106.6495], [10.8182, 106.6482], [10.817, 106.6465],
            [10.816, 106.645], [10.8145, 106.6435], [10.813, 106.6425], [10.812, 106.642],
        ],
        properties: ZoneProperties {
            elevation: Elevation::Medium,
            near_river: false,
            drainage: Drainage::Moderate,
        },
        simulation: ZoneSimulation {
            base_level: 0.07,
            tidal_sensitivity: 0.25,
            rain_sensitivity: 0.7,
            drain_rate: 0.55,
        },
        default_risk: Severity::Medium,
    },];
