//! Shared live map state.
//!
//! [`MapStore`] owns the reconciler and the cluster index built from it.
//! Every ingest holds the write lock across the merge and the index
//! rebuild, so readers never see a half-applied batch.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};

use floodwatch_core::cluster::{ClusterConfig, ClusterId, ClusterIndex, RenderItem, ViewTransition};
use floodwatch_core::error::CoreError;
use floodwatch_core::reconcile::{IngestSummary, ReconcileConfig, StreamReconciler};
use floodwatch_core::types::{FloodPoint, Severity, Viewport};
use floodwatch_core::zones::{self, FloodZone};
use floodwatch_stream::sink::PointSink;

const MAP_EVENT_CAPACITY: usize = 64;

/// Change notification for the render layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MapEvent {
    /// The live point collection changed; re-query the viewport.
    PointsChanged { revision: u64, count: usize },
}

/// Display risk for one flood zone.
#[derive(Debug, Clone, Serialize)]
pub struct ZoneRisk {
    pub zone: &'static FloodZone,
    pub risk: Severity,
}

struct MapState {
    reconciler: StreamReconciler,
    index: ClusterIndex,
}

/// The live point collection and its cluster index behind one lock.
///
/// Shared as `Arc<MapStore>` between the dashboard, the channel session
/// (through [`PointSink`]) and render-layer readers.
pub struct MapStore {
    state: RwLock<MapState>,
    cluster_config: ClusterConfig,
    event_tx: broadcast::Sender<MapEvent>,
}

impl MapStore {
    /// Empty store with the given merge and clustering settings.
    pub fn new(reconcile: ReconcileConfig, cluster: ClusterConfig) -> Self {
        let (event_tx, _) = broadcast::channel(MAP_EVENT_CAPACITY);
        Self {
            state: RwLock::new(MapState {
                reconciler: StreamReconciler::new(reconcile),
                index: ClusterIndex::build(Vec::new(), cluster),
            }),
            cluster_config: cluster,
            event_tx,
        }
    }

    /// Fires after every batch that changed the collection.
    pub fn subscribe(&self) -> broadcast::Receiver<MapEvent> {
        self.event_tx.subscribe()
    }

    /// Reconcile a batch and rebuild the index.
    pub async fn ingest(&self, points: Vec<FloodPoint>) -> IngestSummary {
        if points.is_empty() {
            return IngestSummary::default();
        }
        let mut state = self.state.write().await;
        let summary = state.reconciler.ingest(points);
        self.rebuild(&mut state);
        summary
    }

    /// Inject the fallback dataset if the collection is still empty and no
    /// fallback was injected before.
    pub async fn seed_fallback(&self, fallback: impl FnOnce() -> Vec<FloodPoint>) -> bool {
        let mut state = self.state.write().await;
        let seeded = state.reconciler.seed_fallback(fallback);
        if seeded {
            self.rebuild(&mut state);
        }
        seeded
    }

    /// Render items for a viewport.
    pub async fn clusters_for_viewport(&self, viewport: &Viewport) -> Vec<RenderItem> {
        self.state.read().await.index.clusters(viewport)
    }

    /// Where to move the map after a cluster click.
    pub async fn expand_cluster(&self, id: ClusterId) -> Result<ViewTransition, CoreError> {
        self.state.read().await.index.expand(id)
    }

    /// Every original point under a cluster.
    pub async fn cluster_leaves(&self, id: ClusterId) -> Result<Vec<FloodPoint>, CoreError> {
        let state = self.state.read().await;
        Ok(state.index.leaves(id)?.into_iter().cloned().collect())
    }

    /// Copy of the live collection.
    pub async fn points(&self) -> Vec<FloodPoint> {
        self.state.read().await.reconciler.points().to_vec()
    }

    /// Number of live points.
    pub async fn len(&self) -> usize {
        self.state.read().await.reconciler.len()
    }

    /// Whether the live collection has no points.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.reconciler.is_empty()
    }

    /// Bumped once per batch that changed the collection.
    pub async fn revision(&self) -> u64 {
        self.state.read().await.reconciler.revision()
    }

    /// Display risk for every flood zone given the current points.
    pub async fn zone_risks(&self) -> Vec<ZoneRisk> {
        let state = self.state.read().await;
        let points = state.reconciler.points();
        zones::flood_zones()
            .iter()
            .map(|zone| ZoneRisk {
                zone,
                risk: zones::zone_risk(zone, points),
            })
            .collect()
    }

    fn rebuild(&self, state: &mut MapState) {
        state.index = ClusterIndex::build(state.reconciler.points().to_vec(), self.cluster_config);
        let _ = self.event_tx.send(MapEvent::PointsChanged {
            revision: state.reconciler.revision(),
            count: state.reconciler.len(),
        });
    }
}

impl Default for MapStore {
    fn default() -> Self {
        Self::new(ReconcileConfig::default(), ClusterConfig::default())
    }
}

#[async_trait]
impl PointSink for MapStore {
    async fn ingest(&self, points: Vec<FloodPoint>) -> IngestSummary {
        MapStore::ingest(self, points).await
    }
}
