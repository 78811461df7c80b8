//! One push-channel connection with its poll timer.
//!
//! [`ChannelSession::open`] spawns a task that connects, sends `init`,
//! then polls on a fixed interval while feeding every received batch into
//! a [`PointSink`]. The task ends when the server closes, a transport error
//! occurs, or [`ChannelSession::close`] is called. It never reconnects on
//! its own: whoever owns the session opens a new one when the viewer moves.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use floodwatch_core::normalize::Normalizer;
use floodwatch_core::types::GeoPoint;
use floodwatch_core::zones::REFERENCE_CENTER;

use crate::client::{self, ChannelError};
use crate::events::{ChannelEvent, DisconnectReason};
use crate::messages::OutgoingMessage;
use crate::processor::{handle_frame, FrameControl};
use crate::sink::PointSink;

/// Broadcast channel capacity for session events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

pub const DEFAULT_STREAM_URL: &str = "ws://localhost:8000/ws/map";
pub const DEFAULT_STREAM_RADIUS_KM: f64 = 20.0;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(7);

/// How long [`ChannelSession::close`] waits for the task to wind down.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub url: String,
    /// Sent in `init`.
    pub viewer: GeoPoint,
    /// Sent in `init`, in kilometers.
    pub radius_km: f64,
    pub poll_interval: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_STREAM_URL.to_string(),
            viewer: REFERENCE_CENTER,
            radius_km: DEFAULT_STREAM_RADIUS_KM,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Create the event channel sessions publish on.
///
/// One sender can outlive many sessions, so subscribers keep receiving
/// across reconnects.
pub fn event_channel() -> (broadcast::Sender<ChannelEvent>, broadcast::Receiver<ChannelEvent>) {
    broadcast::channel(EVENT_CHANNEL_CAPACITY)
}

/// Handle to a running session task.
pub struct ChannelSession {
    config: ChannelConfig,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ChannelSession {
    /// Spawn the session task. Connection failures are reported as
    /// [`ChannelEvent::Disconnected`] rather than returned.
    pub fn open(
        config: ChannelConfig,
        sink: Arc<dyn PointSink>,
        normalizer: Normalizer,
        event_tx: broadcast::Sender<ChannelEvent>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let task_config = config.clone();
        let task_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            let reason = run_session(&task_config, sink.as_ref(), &normalizer, &event_tx, &task_cancel).await;
            tracing::info!(url = %task_config.url, ?reason, "Flood stream session ended");
            let _ = event_tx.send(ChannelEvent::Disconnected { reason });
        });

        Self {
            config,
            cancel,
            task: Some(task),
        }
    }

    /// Settings the session was opened with.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Whether the session task has ended for any reason.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop polling, close the connection if open and wait for the task.
    ///
    /// Calling this more than once is a no-op.
    pub async fn close(&mut self) {
        self.close_within(CLOSE_TIMEOUT).await;
    }

    /// [`close`](Self::close) with an explicit grace period. A task still
    /// running when it elapses is aborted, so once this returns the session
    /// can no longer hand points to its sink.
    pub async fn close_within(&mut self, grace: Duration) {
        self.cancel.cancel();
        let Some(task) = self.task.take() else {
            return;
        };
        let abort = task.abort_handle();
        match tokio::time::timeout(grace, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Flood stream task failed"),
            Err(_) => {
                tracing::warn!("Flood stream task did not stop in time, aborting");
                abort.abort();
            }
        }
    }
}

impl Drop for ChannelSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Connect, send `init`, then poll and process frames until something ends
/// the session.
async fn run_session(
    config: &ChannelConfig,
    sink: &dyn PointSink,
    normalizer: &Normalizer,
    event_tx: &broadcast::Sender<ChannelEvent>,
    cancel: &CancellationToken,
) -> DisconnectReason {
    tracing::info!(url = %config.url, "Connecting to flood stream");
    let ws_stream = tokio::select! {
        _ = cancel.cancelled() => return DisconnectReason::Closed,
        result = client::connect(&config.url) => match result {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "Flood stream connection failed");
                return DisconnectReason::ConnectFailed(e.to_string());
            }
        },
    };
    let (mut sink_ws, mut stream) = ws_stream.split();

    let init = OutgoingMessage::Init {
        lat: config.viewer.lat,
        lng: config.viewer.lng,
        radius: config.radius_km,
    };
    if let Err(e) = send(&mut sink_ws, &init).await {
        tracing::error!(error = %e, "Failed to send init");
        return DisconnectReason::Error(e.to_string());
    }
    let _ = event_tx.send(ChannelEvent::Connected {
        url: config.url.clone(),
    });

    // First poll one full interval after connecting.
    let mut ticker = tokio::time::interval_at(
        tokio::time::Instant::now() + config.poll_interval,
        config.poll_interval,
    );
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink_ws.send(Message::Close(None)).await;
                return DisconnectReason::Closed;
            }
            _ = ticker.tick() => {
                if let Err(e) = send(&mut sink_ws, &OutgoingMessage::Poll).await {
                    tracing::error!(error = %e, "Failed to send poll");
                    return DisconnectReason::Error(e.to_string());
                }
            }
            msg = stream.next() => {
                let Some(msg) = msg else {
                    tracing::info!("Flood stream exhausted");
                    return DisconnectReason::RemoteClosed;
                };
                if let FrameControl::Stop(reason) = handle_frame(msg, normalizer, sink, event_tx).await {
                    return reason;
                }
            }
        }
    }
}

/// Serialize and send one frame.
async fn send<S>(sink: &mut S, msg: &OutgoingMessage) -> Result<(), ChannelError>
where
    S: SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let json = msg.to_json()?;
    tracing::trace!(frame = %json, "Sending frame");
    sink.send(Message::Text(json)).await?;
    Ok(())
}
