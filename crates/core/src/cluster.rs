//! Hierarchical point clustering for map rendering.
//!
//! Points are projected onto the Web-Mercator unit square and indexed once
//! per zoom level. The deepest level (`max_zoom`) holds the raw points; each
//! shallower level is built greedily from the one below it by merging every
//! node with its not-yet-merged neighbours inside the pixel radius scaled to
//! that zoom. A cluster carries its weighted centroid, member count and the
//! maximum severity score among its members.
//!
//! Indexes are immutable. When the point set changes, build a new one.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use rstar::primitives::GeomWithData;
use rstar::{RTree, AABB};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{FloodPoint, GeoPoint, Severity, Viewport};

/// Tunables for [`ClusterIndex`].
#[derive(Debug, Clone, Copy)]
pub struct ClusterConfig {
    /// Merge radius in screen pixels.
    pub radius_px: f64,
    /// Tile extent the radius is measured against.
    pub extent_px: f64,
    /// Zoom at and above which every point renders individually.
    pub max_zoom: u8,
    /// Minimum member count for a cluster.
    pub min_points: usize,
    /// Upper bound for the zoom returned by cluster expansion.
    pub expansion_zoom_cap: u8,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            radius_px: 60.0,
            extent_px: 512.0,
            max_zoom: 17,
            min_points: 2,
            expansion_zoom_cap: 17,
        }
    }
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Identifies a cluster by the level it was formed at and the index of its
/// seed node in the level below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterId {
    pub zoom: u8,
    pub seed: u32,
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.zoom, self.seed)
    }
}

impl FromStr for ClusterId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::Validation(format!("Invalid cluster id '{s}'"));
        let (zoom, seed) = s.split_once(':').ok_or_else(invalid)?;
        Ok(Self {
            zoom: zoom.parse().map_err(|_| invalid())?,
            seed: seed.parse().map_err(|_| invalid())?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub id: ClusterId,
    pub lat: f64,
    pub lng: f64,
    pub count: usize,
    /// Maximum [`Severity::score`] among members.
    pub severity_score: u8,
}

impl ClusterSummary {
    /// The most severe member's level.
    pub fn severity(&self) -> Severity {
        Severity::from_score(self.severity_score)
    }
}

/// One marker to draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RenderItem {
    Point(FloodPoint),
    Cluster(ClusterSummary),
}

/// Where the map should move after a cluster click.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewTransition {
    pub center: GeoPoint,
    pub zoom: u8,
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum NodeKind {
    Leaf(usize),
    Cluster(ClusterId),
}

#[derive(Debug, Clone)]
struct Node {
    x: f64,
    y: f64,
    count: usize,
    score: u8,
    kind: NodeKind,
    /// Slot of the node this one was merged into (or copied as) one level up.
    parent: Option<usize>,
}

#[derive(Debug, Default)]
struct Level {
    nodes: Vec<Node>,
    tree: RTree<GeomWithData<[f64; 2], usize>>,
}

impl Level {
    fn new(nodes: Vec<Node>) -> Self {
        let entries = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| GeomWithData::new([n.x, n.y], i))
            .collect();
        Self {
            nodes,
            tree: RTree::bulk_load(entries),
        }
    }
}

/// Immutable per-zoom cluster hierarchy over one snapshot of the points.
///
/// Rebuilt from scratch whenever the point set changes; queries never
/// mutate it.
#[derive(Debug)]
pub struct ClusterIndex {
    config: ClusterConfig,
    points: Vec<FloodPoint>,
    /// `levels[z]` is what renders at zoom `z`; `levels[max_zoom]` are leaves.
    levels: Vec<Level>,
    /// Slot of each cluster in the level it was formed at.
    slots: HashMap<ClusterId, usize>,
}

impl ClusterIndex {
    /// Build the full hierarchy from an owned snapshot of the point set.
    pub fn build(points: Vec<FloodPoint>, config: ClusterConfig) -> Self {
        let max_zoom = config.max_zoom as usize;
        let mut levels: Vec<Level> = (0..=max_zoom).map(|_| Level::default()).collect();
        let mut slots = HashMap::new();

        let leaves = points
            .iter()
            .enumerate()
            .map(|(i, p)| Node {
                x: lng_x(p.lng),
                y: lat_y(p.lat),
                count: 1,
                score: p.severity.score(),
                kind: NodeKind::Leaf(i),
                parent: None,
            })
            .collect();
        levels[max_zoom] = Level::new(leaves);

        for zoom in (0..max_zoom).rev() {
            let radius = config.radius_px / (config.extent_px * 2f64.powi(zoom as i32));
            let (below, above) = levels.split_at_mut(zoom + 1);
            let nodes = cluster_level(&mut above[0], zoom as u8, radius, config.min_points, &mut slots);
            below[zoom] = Level::new(nodes);
        }

        tracing::debug!(points = points.len(), clusters = slots.len(), "Built cluster index");
        Self {
            config,
            points,
            levels,
            slots,
        }
    }

    /// Settings the index was built with.
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// The indexed snapshot, in the order it was built from.
    pub fn points(&self) -> &[FloodPoint] {
        &self.points
    }

    /// Render items inside `viewport` at its zoom.
    ///
    /// Longitudes are wrapped, boxes crossing the antimeridian are split and
    /// boxes spanning 360° or more cover the whole world.
    pub fn clusters(&self, viewport: &Viewport) -> Vec<RenderItem> {
        let mut min_lng = wrap_lng(viewport.west);
        let mut max_lng = if viewport.east == 180.0 { 180.0 } else { wrap_lng(viewport.east) };
        let min_lat = viewport.south.clamp(-90.0, 90.0);
        let max_lat = viewport.north.clamp(-90.0, 90.0);

        if viewport.east - viewport.west >= 360.0 {
            min_lng = -180.0;
            max_lng = 180.0;
        } else if min_lng > max_lng {
            let mut items = self.query(min_lng, min_lat, 180.0, max_lat, viewport.zoom);
            items.extend(self.query(-180.0, min_lat, max_lng, max_lat, viewport.zoom));
            return items;
        }
        self.query(min_lng, min_lat, max_lng, max_lat, viewport.zoom)
    }

    /// Smallest zoom at which the cluster's members no longer render as this
    /// one cluster, capped at `expansion_zoom_cap`.
    pub fn expansion_zoom(&self, id: ClusterId) -> Result<u8, CoreError> {
        let mut current = id;
        let zoom = loop {
            let children = self.children(current)?;
            let zoom = current.zoom + 1;
            if zoom >= self.config.max_zoom || children.len() != 1 {
                break zoom;
            }
            match children[0].kind {
                NodeKind::Cluster(child) => current = child,
                NodeKind::Leaf(_) => break zoom,
            }
        };
        Ok(zoom.min(self.config.expansion_zoom_cap))
    }

    /// View transition for a cluster click: centered on the centroid at the
    /// expansion zoom.
    pub fn expand(&self, id: ClusterId) -> Result<ViewTransition, CoreError> {
        let node = self.cluster_node(id)?;
        Ok(ViewTransition {
            center: GeoPoint::new(y_lat(node.y), x_lng(node.x)),
            zoom: self.expansion_zoom(id)?,
        })
    }

    /// Original points under a cluster.
    pub fn leaves(&self, id: ClusterId) -> Result<Vec<&FloodPoint>, CoreError> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            for child in self.children(current)? {
                match child.kind {
                    NodeKind::Leaf(i) => out.push(&self.points[i]),
                    NodeKind::Cluster(cid) => stack.push(cid),
                }
            }
        }
        Ok(out)
    }

    fn query(&self, min_lng: f64, min_lat: f64, max_lng: f64, max_lat: f64, zoom: u8) -> Vec<RenderItem> {
        let level = &self.levels[zoom.min(self.config.max_zoom) as usize];
        let envelope = AABB::from_corners(
            [lng_x(min_lng), lat_y(max_lat)],
            [lng_x(max_lng), lat_y(min_lat)],
        );
        level
            .tree
            .locate_in_envelope(&envelope)
            .map(|entry| self.render(&level.nodes[entry.data]))
            .collect()
    }

    fn render(&self, node: &Node) -> RenderItem {
        match node.kind {
            NodeKind::Leaf(i) => RenderItem::Point(self.points[i].clone()),
            NodeKind::Cluster(id) => RenderItem::Cluster(ClusterSummary {
                id,
                lat: y_lat(node.y),
                lng: x_lng(node.x),
                count: node.count,
                severity_score: node.score,
            }),
        }
    }

    fn cluster_node(&self, id: ClusterId) -> Result<&Node, CoreError> {
        self.slots
            .get(&id)
            .and_then(|&slot| self.levels.get(id.zoom as usize)?.nodes.get(slot))
            .ok_or_else(|| CoreError::ClusterNotFound(id.to_string()))
    }

    fn children(&self, id: ClusterId) -> Result<Vec<&Node>, CoreError> {
        let slot = *self
            .slots
            .get(&id)
            .ok_or_else(|| CoreError::ClusterNotFound(id.to_string()))?;
        let below = self
            .levels
            .get(id.zoom as usize + 1)
            .ok_or_else(|| CoreError::ClusterNotFound(id.to_string()))?;
        Ok(below.nodes.iter().filter(|n| n.parent == Some(slot)).collect())
    }
}

/// Greedy pass: merge `source` nodes into the nodes of the next shallower
/// level. Sets `parent` on every source node.
fn cluster_level(
    source: &mut Level,
    zoom: u8,
    radius: f64,
    min_points: usize,
    slots: &mut HashMap<ClusterId, usize>,
) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::new();
    let r2 = radius * radius;

    for i in 0..source.nodes.len() {
        if source.nodes[i].parent.is_some() {
            continue;
        }
        let origin = source.nodes[i].clone();
        let neighbours: Vec<usize> = source
            .tree
            .locate_within_distance([origin.x, origin.y], r2)
            .map(|entry| entry.data)
            .filter(|&j| j != i && source.nodes[j].parent.is_none())
            .collect();

        let count = origin.count + neighbours.iter().map(|&j| source.nodes[j].count).sum::<usize>();

        if count > origin.count && count >= min_points {
            let slot = out.len();
            let id = ClusterId { zoom, seed: i as u32 };
            let (mut wx, mut wy) = (origin.x * origin.count as f64, origin.y * origin.count as f64);
            let mut score = origin.score;
            for &j in &neighbours {
                let n = &mut source.nodes[j];
                wx += n.x * n.count as f64;
                wy += n.y * n.count as f64;
                score = score.max(n.score);
                n.parent = Some(slot);
            }
            source.nodes[i].parent = Some(slot);
            slots.insert(id, slot);
            out.push(Node {
                x: wx / count as f64,
                y: wy / count as f64,
                count,
                score,
                kind: NodeKind::Cluster(id),
                parent: None,
            });
        } else {
            // Too few to merge: carry the origin (and any neighbours) up as-is.
            for j in std::iter::once(i).chain(if count > 1 { neighbours } else { Vec::new() }) {
                let slot = out.len();
                source.nodes[j].parent = Some(slot);
                out.push(Node {
                    parent: None,
                    ..source.nodes[j].clone()
                });
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

fn wrap_lng(lng: f64) -> f64 {
    ((lng + 180.0) % 360.0 + 360.0) % 360.0 - 180.0
}

fn lng_x(lng: f64) -> f64 {
    lng / 360.0 + 0.5
}

fn lat_y(lat: f64) -> f64 {
    let sin = (lat * PI / 180.0).sin();
    let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / PI;
    y.clamp(0.0, 1.0)
}

fn x_lng(x: f64) -> f64 {
    (x - 0.5) * 360.0
}

fn y_lat(y: f64) -> f64 {
    let y2 = (180.0 - y * 360.0) * PI / 180.0;
    360.0 * y2.exp().atan() / PI - 90.0
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn point(id: &str, lat: f64, lng: f64, severity: Severity) -> FloodPoint {
        FloodPoint {
            id: id.to_string(),
            lat,
            lng,
            depth: 0.0,
            location_name: id.to_string(),
            severity,
            timestamp: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    /// One severe and three low points a few tens of meters apart.
    fn tight_group() -> Vec<FloodPoint> {
        vec![
            point("s", 10.7700, 106.7000, Severity::Severe),
            point("l1", 10.7702, 106.7001, Severity::Low),
            point("l2", 10.7699, 106.7003, Severity::Low),
            point("l3", 10.7703, 106.6998, Severity::Low),
        ]
    }

    fn city_view(zoom: u8) -> Viewport {
        Viewport::around(GeoPoint::new(10.77, 106.70), 0.5, zoom)
    }

    fn only_cluster(items: &[RenderItem]) -> &ClusterSummary {
        assert_eq!(items.len(), 1, "expected a single item, got {items:?}");
        match &items[0] {
            RenderItem::Cluster(c) => c,
            other => panic!("expected cluster, got {other:?}"),
        }
    }

    #[test]
    fn projection_round_trips() {
        for (lat, lng) in [(10.77, 106.7), (-33.86, 151.2), (0.0, 0.0), (60.0, -179.5)] {
            assert!((y_lat(lat_y(lat)) - lat).abs() < 1e-9);
            assert!((x_lng(lng_x(lng)) - lng).abs() < 1e-9);
        }
    }

    #[test]
    fn severe_member_dominates_cluster() {
        let index = ClusterIndex::build(tight_group(), ClusterConfig::default());
        let items = index.clusters(&city_view(10));
        let cluster = only_cluster(&items);

        assert_eq!(cluster.count, 4);
        assert_eq!(cluster.severity_score, Severity::Severe.score());
        assert_eq!(cluster.severity(), Severity::Severe);
    }

    #[test]
    fn max_zoom_renders_every_point() {
        let index = ClusterIndex::build(tight_group(), ClusterConfig::default());
        for zoom in [17, 18, 22] {
            let items = index.clusters(&city_view(zoom));
            assert_eq!(items.len(), 4, "zoom {zoom}");
            assert!(items.iter().all(|i| matches!(i, RenderItem::Point(_))));
        }
    }

    #[test]
    fn distant_points_are_not_merged() {
        let points = vec![
            point("a", 10.70, 106.60, Severity::Low),
            point("b", 10.85, 106.80, Severity::High),
        ];
        let index = ClusterIndex::build(points, ClusterConfig::default());
        let items = index.clusters(&city_view(12));
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn centroid_is_inside_members() {
        let index = ClusterIndex::build(tight_group(), ClusterConfig::default());
        let items = index.clusters(&city_view(5));
        let c = only_cluster(&items);
        assert!(c.lat > 10.7698 && c.lat < 10.7704, "lat {}", c.lat);
        assert!(c.lng > 106.6997 && c.lng < 106.7004, "lng {}", c.lng);
    }

    #[test]
    fn viewport_filters_items() {
        let points = vec![
            point("in", 10.77, 106.70, Severity::Low),
            point("out", 21.03, 105.85, Severity::Low),
        ];
        let index = ClusterIndex::build(points, ClusterConfig::default());
        let items = index.clusters(&city_view(17));
        assert_eq!(items.len(), 1);
        assert_matches!(&items[0], RenderItem::Point(p) if p.id == "in");
    }

    #[test]
    fn antimeridian_viewport_is_split() {
        let points = vec![
            point("east", 0.0, 179.5, Severity::Low),
            point("west", 0.0, -179.5, Severity::Low),
            point("far", 0.0, 0.0, Severity::Low),
        ];
        let index = ClusterIndex::build(points, ClusterConfig::default());
        let view = Viewport::new(179.0, -1.0, -179.0, 1.0, 17).unwrap();
        let mut ids: Vec<String> = index
            .clusters(&view)
            .into_iter()
            .filter_map(|i| match i {
                RenderItem::Point(p) => Some(p.id),
                RenderItem::Cluster(_) => None,
            })
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["east", "west"]);

        let world = Viewport::new(-200.0, -10.0, 200.0, 10.0, 17).unwrap();
        assert_eq!(index.clusters(&world).len(), 3);
    }

    #[test]
    fn expansion_separates_members() {
        let index = ClusterIndex::build(tight_group(), ClusterConfig::default());
        let cluster = only_cluster(&index.clusters(&city_view(10))).clone();

        let transition = index.expand(cluster.id).unwrap();
        assert!(transition.zoom > 10 && transition.zoom <= 17);
        assert!((transition.center.lat - cluster.lat).abs() < 1e-9);
        assert!((transition.center.lng - cluster.lng).abs() < 1e-9);

        let after = index.clusters(&city_view(transition.zoom));
        assert!(after.len() > 1, "still one item at zoom {}", transition.zoom);
    }

    #[test]
    fn expansion_zoom_is_capped() {
        let config = ClusterConfig {
            expansion_zoom_cap: 12,
            ..Default::default()
        };
        let index = ClusterIndex::build(tight_group(), config);
        let cluster = only_cluster(&index.clusters(&city_view(10))).clone();
        assert!(index.expansion_zoom(cluster.id).unwrap() <= 12);
    }

    #[test]
    fn leaves_cover_all_members() {
        let index = ClusterIndex::build(tight_group(), ClusterConfig::default());
        let cluster = only_cluster(&index.clusters(&city_view(3))).clone();
        let mut ids: Vec<&str> = index.leaves(cluster.id).unwrap().iter().map(|p| p.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["l1", "l2", "l3", "s"]);
    }

    #[test]
    fn unknown_cluster_is_an_error() {
        let index = ClusterIndex::build(tight_group(), ClusterConfig::default());
        let missing = ClusterId { zoom: 3, seed: 999 };
        assert_matches!(index.expand(missing), Err(CoreError::ClusterNotFound(_)));
        assert_matches!(index.leaves(missing), Err(CoreError::ClusterNotFound(_)));
    }

    #[test]
    fn cluster_id_parses_from_display() {
        let id = ClusterId { zoom: 9, seed: 42 };
        assert_eq!(id.to_string().parse::<ClusterId>().unwrap(), id);
        assert_matches!("nope".parse::<ClusterId>(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn empty_index_yields_nothing() {
        let index = ClusterIndex::build(Vec::new(), ClusterConfig::default());
        assert!(index.clusters(&city_view(12)).is_empty());
    }
}
