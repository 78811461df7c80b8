//! `floodwatch-dashboard` -- headless flood map daemon.
//!
//! Loads the dashboard from the backend, merges locally stored reports,
//! keeps the map live over the push channel and logs every change until
//! interrupted. See [`DashboardConfig`] for the environment variables.
//!
//! `RUST_LOG` overrides the default filter
//! (`floodwatch_dashboard=info,floodwatch_stream=info`).

use std::sync::Arc;

use floodwatch_core::local_log::JsonFileReportLog;
use floodwatch_core::types::Viewport;
use floodwatch_dashboard::app::Dashboard;
use floodwatch_dashboard::config::DashboardConfig;
use floodwatch_dashboard::store::MapEvent;
use floodwatch_rest::client::FloodApi;
use floodwatch_stream::events::ChannelEvent;

use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Half-width in degrees of the viewport logged after each change.
const LOG_VIEWPORT_HALF_SPAN: f64 = 0.05;
const LOG_VIEWPORT_ZOOM: u8 = 13;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "floodwatch_dashboard=info,floodwatch_stream=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = DashboardConfig::from_env();
    tracing::info!(
        api_url = %config.api_url,
        stream_url = %config.stream_url,
        local_reports = %config.local_reports_path,
        poll_secs = config.poll_interval.as_secs(),
        "Starting floodwatch-dashboard",
    );

    let api = Arc::new(FloodApi::new(config.api_url.clone()));
    let local_log = Arc::new(JsonFileReportLog::new(config.local_reports_path.clone()));
    let dashboard = Arc::new(Dashboard::new(config, api, local_log));

    spawn_map_logger(Arc::clone(&dashboard));
    spawn_channel_logger(dashboard.subscribe_channel());

    let snapshot = dashboard.refresh().await;
    for (field, message) in &snapshot.errors {
        tracing::warn!(field = %field, error = %message, "Dashboard field unavailable");
    }
    if let Some(stats) = &snapshot.stats {
        tracing::info!(
            total_alerts = stats.total_alerts,
            severe_alerts = stats.severe_alerts,
            active_zones = stats.active_zones,
            "Current flood stats",
        );
    }

    dashboard.connect_channel().await;

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
    dashboard.shutdown().await;
}

/// Log the render set around the viewer whenever the map changes.
fn spawn_map_logger(dashboard: Arc<Dashboard>) {
    let mut rx = dashboard.store().subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(MapEvent::PointsChanged { revision, count }) => {
                    let viewer = dashboard.viewer().await;
                    let viewport = Viewport::around(viewer, LOG_VIEWPORT_HALF_SPAN, LOG_VIEWPORT_ZOOM);
                    let items = dashboard.store().clusters_for_viewport(&viewport).await;
                    tracing::info!(revision, points = count, render_items = items.len(), "Map updated");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Map logger lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn spawn_channel_logger(mut rx: tokio::sync::broadcast::Receiver<ChannelEvent>) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => tracing::debug!(?event, "Channel event"),
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "Channel logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}
