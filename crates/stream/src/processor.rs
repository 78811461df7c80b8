//! Push-channel frame processing.
//!
//! Turns raw WebSocket frames into normalized point batches for a
//! [`PointSink`] and reports what happened on the event channel. A
//! malformed frame is logged and dropped; it never ends the session.

use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;

use floodwatch_core::normalize::Normalizer;

use crate::events::{ChannelEvent, DisconnectReason, FrameKind};
use crate::messages::{parse_message, IncomingMessage};
use crate::sink::PointSink;

/// What the session loop should do after a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameControl {
    Continue,
    Stop(DisconnectReason),
}

/// Dispatch one received frame.
pub async fn handle_frame(
    msg: Result<Message, tokio_tungstenite::tungstenite::Error>,
    normalizer: &Normalizer,
    sink: &dyn PointSink,
    event_tx: &broadcast::Sender<ChannelEvent>,
) -> FrameControl {
    match msg {
        Ok(Message::Text(text)) => {
            handle_text(&text, normalizer, sink, event_tx).await;
            FrameControl::Continue
        }
        Ok(Message::Binary(_)) => {
            tracing::trace!("Ignoring binary frame");
            FrameControl::Continue
        }
        Ok(Message::Ping(_) | Message::Pong(_)) => {
            // Handled automatically by tungstenite.
            FrameControl::Continue
        }
        Ok(Message::Close(frame)) => {
            tracing::info!(?frame, "Flood stream closed by server");
            FrameControl::Stop(DisconnectReason::RemoteClosed)
        }
        Ok(Message::Frame(_)) => FrameControl::Continue,
        Err(e) => {
            tracing::error!(error = %e, "Flood stream receive error");
            FrameControl::Stop(DisconnectReason::Error(e.to_string()))
        }
    }
}

/// Parse, normalize and ingest a single text frame.
///
/// Returns the number of points handed to the sink.
pub async fn handle_text(
    text: &str,
    normalizer: &Normalizer,
    sink: &dyn PointSink,
    event_tx: &broadcast::Sender<ChannelEvent>,
) -> usize {
    let (kind, frame) = match parse_message(text) {
        Ok(IncomingMessage::Snapshot(frame)) => (FrameKind::Snapshot, frame),
        Ok(IncomingMessage::Update(frame)) => (FrameKind::Update, frame),
        Ok(IncomingMessage::Other) => {
            tracing::trace!("Ignoring frame of unknown type");
            return 0;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Malformed flood stream payload");
            let _ = event_tx.send(ChannelEvent::PayloadRejected {
                reason: e.to_string(),
            });
            return 0;
        }
    };

    let points = frame.to_points(normalizer);
    tracing::debug!(
        ?kind,
        crowd = frame.crowd_records().len(),
        sensor = frame.sensor_records().len(),
        "Received flood stream frame",
    );
    if points.is_empty() {
        return 0;
    }

    let count = points.len();
    let summary = sink.ingest(points).await;
    let _ = event_tx.send(ChannelEvent::BatchIngested {
        kind,
        points: count,
        inserted: summary.inserted,
        merged: summary.merged,
    });
    count
}
