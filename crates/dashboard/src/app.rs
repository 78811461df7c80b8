//! Dashboard orchestration.
//!
//! [`Dashboard`] ties the REST loader, the local report log, the fallback
//! seed and the push channel to one [`MapStore`]. It keeps at most one
//! channel session alive and replaces it whenever the viewer moves.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinError;

use floodwatch_core::local_log::{LocalLogError, LocalReportLog, LocalReports};
use floodwatch_core::normalize::Normalizer;
use floodwatch_core::report::Report;
use floodwatch_core::seed::fallback_dataset;
use floodwatch_core::types::{FloodPoint, GeoPoint};
use floodwatch_rest::dashboard::{load_dashboard, DashboardSnapshot, DashboardSource};
use floodwatch_stream::events::ChannelEvent;
use floodwatch_stream::session::{event_channel, ChannelSession};
use floodwatch_stream::sink::PointSink;

use crate::config::DashboardConfig;
use crate::store::MapStore;

/// Errors from [`Dashboard::submit_local_report`].
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("Local report log error: {0}")]
    LocalLog(#[from] LocalLogError),

    #[error("Background task failed: {0}")]
    Task(#[from] JoinError),
}

/// Owns the map store and everything that feeds it.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct Dashboard {
    config: DashboardConfig,
    api: Arc<dyn DashboardSource>,
    local_log: Arc<dyn LocalReportLog>,
    normalizer: Normalizer,
    store: Arc<MapStore>,
    channel_tx: broadcast::Sender<ChannelEvent>,
    session: Mutex<Option<ChannelSession>>,
    viewer: RwLock<GeoPoint>,
    reports: RwLock<Vec<Report>>,
    snapshot: RwLock<Option<DashboardSnapshot>>,
}

impl Dashboard {
    /// Build a dashboard with an empty map. Nothing is fetched or opened
    /// until [`refresh`](Self::refresh) and
    /// [`connect_channel`](Self::connect_channel).
    pub fn new(config: DashboardConfig, api: Arc<dyn DashboardSource>, local_log: Arc<dyn LocalReportLog>) -> Self {
        let (channel_tx, _) = event_channel();
        Self {
            store: Arc::new(MapStore::new(config.reconcile, config.cluster)),
            viewer: RwLock::new(config.viewer),
            normalizer: Normalizer::default(),
            config,
            api,
            local_log,
            channel_tx,
            session: Mutex::new(None),
            reports: RwLock::new(Vec::new()),
            snapshot: RwLock::new(None),
        }
    }

    /// The configuration this dashboard was built with.
    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// The live map, for render-layer queries and change notifications.
    pub fn store(&self) -> &Arc<MapStore> {
        &self.store
    }

    /// Events from every channel session this dashboard opens.
    pub fn subscribe_channel(&self) -> broadcast::Receiver<ChannelEvent> {
        self.channel_tx.subscribe()
    }

    /// Current viewer location.
    pub async fn viewer(&self) -> GeoPoint {
        *self.viewer.read().await
    }

    /// Reports shown in the side panel, newest local ones first.
    pub async fn recent_reports(&self) -> Vec<Report> {
        self.reports.read().await.clone()
    }

    /// The last result of [`refresh`](Self::refresh).
    pub async fn last_snapshot(&self) -> Option<DashboardSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Load everything the backend offers, merge the local log, and seed the
    /// map if it is still empty.
    ///
    /// Failures never abort the refresh; they end up in the returned
    /// snapshot's `errors` or in the log.
    pub async fn refresh(&self) -> DashboardSnapshot {
        let viewer = self.viewer().await;
        let mut snapshot = load_dashboard(self.api.as_ref(), viewer, self.config.nearby_radius_km).await;
        let mut reports = std::mem::take(&mut snapshot.recent_reports);

        let summary = self.store.ingest(snapshot.points.clone()).await;
        tracing::debug!(inserted = summary.inserted, merged = summary.merged, "Backend points ingested");

        match self.load_local().await {
            Ok(local) if !local.is_empty() => {
                tracing::info!(reports = local.reports.len(), points = local.points.len(), "Loaded local reports");
                reports.splice(0..0, local.reports);
                self.store.ingest(local.points).await;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to load local reports"),
        }

        let mut seeded_reports = Vec::new();
        let seeded = self
            .store
            .seed_fallback(|| {
                let dataset = fallback_dataset(&self.config.seed, &self.normalizer);
                seeded_reports = dataset.reports;
                dataset.points
            })
            .await;
        if seeded {
            tracing::info!(points = seeded_reports.len(), "No flood data available, showing fallback dataset");
            if reports.is_empty() {
                reports = seeded_reports;
            }
        }

        snapshot.recent_reports = reports.clone();
        *self.reports.write().await = reports;
        *self.snapshot.write().await = Some(snapshot.clone());
        snapshot
    }

    /// Open a channel session at the current viewer location, closing any
    /// previous one first.
    pub async fn connect_channel(&self) {
        let mut slot = self.session.lock().await;
        if let Some(mut old) = slot.take() {
            old.close().await;
        }
        let viewer = self.viewer().await;
        let sink: Arc<dyn PointSink> = self.store.clone();
        *slot = Some(ChannelSession::open(
            self.config.channel_config(viewer),
            sink,
            self.normalizer.clone(),
            self.channel_tx.clone(),
        ));
    }

    /// Move the viewer and reconnect the channel around the new location.
    pub async fn set_viewer_location(&self, viewer: GeoPoint) {
        *self.viewer.write().await = viewer;
        tracing::info!(lat = viewer.lat, lng = viewer.lng, "Viewer moved, reconnecting flood stream");
        self.connect_channel().await;
    }

    /// Persist a report made on this device and show it on the map.
    ///
    /// The cached snapshot counts it as one more community alert until the
    /// next refresh replaces the stats.
    pub async fn submit_local_report(&self, report: Report) -> Result<FloodPoint, DashboardError> {
        let point = report.to_point(&self.normalizer);

        let log = Arc::clone(&self.local_log);
        let (stored_report, stored_point) = (report.clone(), point.clone());
        tokio::task::spawn_blocking(move || log.append(&stored_report, &stored_point)).await??;

        if let Some(snapshot) = self.snapshot.write().await.as_mut() {
            snapshot.recent_reports.insert(0, report.clone());
            if let Some(stats) = snapshot.stats.as_mut() {
                stats.total_alerts += 1;
                stats.community_count += 1;
            }
        }
        self.reports.write().await.insert(0, report);
        self.store.ingest(vec![point.clone()]).await;
        tracing::info!(id = %point.id, severity = point.severity.as_str(), "Local report submitted");
        Ok(point)
    }

    /// Close the channel session, if any.
    pub async fn shutdown(&self) {
        if let Some(mut session) = self.session.lock().await.take() {
            session.close().await;
        }
    }

    async fn load_local(&self) -> Result<LocalReports, DashboardError> {
        let log = Arc::clone(&self.local_log);
        Ok(tokio::task::spawn_blocking(move || log.load()).await??)
    }
}
