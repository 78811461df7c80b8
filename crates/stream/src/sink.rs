//! Destination for normalized points.

use async_trait::async_trait;

use floodwatch_core::reconcile::IngestSummary;
use floodwatch_core::types::FloodPoint;

/// Receives every batch a channel session produces.
///
/// Implementations must apply the whole batch atomically with respect to
/// their readers.
#[async_trait]
pub trait PointSink: Send + Sync {
    async fn ingest(&self, points: Vec<FloodPoint>) -> IngestSummary;
}
