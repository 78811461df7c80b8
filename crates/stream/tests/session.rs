//! Channel session tests against an in-process WebSocket server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, Mutex, Notify};
use tokio_tungstenite::tungstenite::Message;

use floodwatch_core::normalize::Normalizer;
use floodwatch_core::reconcile::{IngestSummary, StreamReconciler};
use floodwatch_core::types::{FloodPoint, GeoPoint};
use floodwatch_stream::events::{ChannelEvent, DisconnectReason, FrameKind};
use floodwatch_stream::session::{event_channel, ChannelConfig, ChannelSession};
use floodwatch_stream::sink::PointSink;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ReconcilingSink(Mutex<StreamReconciler>);

#[async_trait]
impl PointSink for ReconcilingSink {
    async fn ingest(&self, points: Vec<FloodPoint>) -> IngestSummary {
        self.0.lock().await.ingest(points)
    }
}

/// Sink that takes far longer than any close grace period.
#[derive(Default)]
struct SlowSink {
    started: Notify,
    completed: AtomicUsize,
}

#[async_trait]
impl PointSink for SlowSink {
    async fn ingest(&self, points: Vec<FloodPoint>) -> IngestSummary {
        self.started.notify_one();
        tokio::time::sleep(Duration::from_secs(2)).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        IngestSummary {
            inserted: points.len(),
            merged: 0,
        }
    }
}

/// Accept one client, forward every text frame it sends to the returned
/// receiver, and send whatever arrives on the returned sender.
async fn spawn_server() -> (String, mpsc::UnboundedReceiver<Value>, mpsc::UnboundedSender<Message>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (from_client_tx, from_client_rx) = mpsc::unbounded_channel();
    let (to_client_tx, mut to_client_rx) = mpsc::unbounded_channel::<Message>();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        let (mut write, mut read) = ws.split();
        loop {
            tokio::select! {
                outgoing = to_client_rx.recv() => match outgoing {
                    Some(msg) => {
                        if write.send(msg).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                incoming = read.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let _ = from_client_tx.send(serde_json::from_str::<Value>(&text).unwrap());
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => {
                        let _ = from_client_tx.send(serde_json::json!({"type": "__closed"}));
                        break;
                    }
                    Some(Ok(_)) => {}
                },
            }
        }
    });

    (url, from_client_rx, to_client_tx)
}

fn config(url: String, poll_interval: Duration) -> ChannelConfig {
    ChannelConfig {
        url,
        viewer: GeoPoint::new(10.8, 106.7),
        radius_km: 20.0,
        poll_interval,
    }
}

async fn next_event(rx: &mut broadcast::Receiver<ChannelEvent>) -> ChannelEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

async fn next_frame(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for client frame")
        .expect("server task ended")
}

// ---------------------------------------------------------------------------
// Test: handshake, polling and ingest
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_init_then_poll_then_ingest() {
    let (url, mut from_client, to_client) = spawn_server().await;
    let sink = Arc::new(ReconcilingSink::default());
    let (event_tx, mut events) = event_channel();

    let mut session = ChannelSession::open(
        config(url.clone(), Duration::from_millis(100)),
        sink.clone(),
        Normalizer::default(),
        event_tx,
    );

    let init = next_frame(&mut from_client).await;
    assert_eq!(init["type"], "init");
    assert_eq!(init["lat"], 10.8);
    assert_eq!(init["lng"], 106.7);
    assert_eq!(init["radius"], 20.0);
    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected { url });

    let poll = next_frame(&mut from_client).await;
    assert_eq!(poll, serde_json::json!({"type": "poll"}));

    to_client
        .send(Message::Text(
            r#"{"type":"snapshot","crowd":[{"entity_id":"c1","lat":10.7,"lng":106.6,"waterlevel":0.4}],"sensor":[{"zoneid":"z1","lat":10.9,"lng":106.8}]}"#.to_string(),
        ))
        .unwrap();
    assert_eq!(
        next_event(&mut events).await,
        ChannelEvent::BatchIngested {
            kind: FrameKind::Snapshot,
            points: 2,
            inserted: 2,
            merged: 0,
        }
    );
    assert_eq!(sink.0.lock().await.len(), 2);

    session.close().await;
    assert!(session.is_finished());
}

#[tokio::test]
async fn test_malformed_frame_keeps_session_open() {
    let (url, mut from_client, to_client) = spawn_server().await;
    let sink = Arc::new(ReconcilingSink::default());
    let (event_tx, mut events) = event_channel();

    let mut session = ChannelSession::open(
        config(url, Duration::from_secs(60)),
        sink.clone(),
        Normalizer::default(),
        event_tx,
    );
    next_frame(&mut from_client).await;
    assert_matches!(next_event(&mut events).await, ChannelEvent::Connected { .. });

    to_client.send(Message::Text("{definitely not json".to_string())).unwrap();
    assert_matches!(next_event(&mut events).await, ChannelEvent::PayloadRejected { .. });

    to_client
        .send(Message::Text(r#"{"type":"update","sensor":[{"zoneid":"z9","lat":10.75,"lng":106.65}]}"#.to_string()))
        .unwrap();
    assert_matches!(
        next_event(&mut events).await,
        ChannelEvent::BatchIngested { kind: FrameKind::Update, points: 1, .. }
    );
    assert!(!session.is_finished());

    session.close().await;
}

// ---------------------------------------------------------------------------
// Test: teardown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_close_is_idempotent_and_closes_socket() {
    let (url, mut from_client, _to_client) = spawn_server().await;
    let (event_tx, mut events) = event_channel();

    let mut session = ChannelSession::open(
        config(url, Duration::from_secs(60)),
        Arc::new(ReconcilingSink::default()),
        Normalizer::default(),
        event_tx,
    );
    next_frame(&mut from_client).await;
    assert_matches!(next_event(&mut events).await, ChannelEvent::Connected { .. });

    session.close().await;
    session.close().await;

    assert_eq!(next_frame(&mut from_client).await["type"], "__closed");
    assert_eq!(
        next_event(&mut events).await,
        ChannelEvent::Disconnected {
            reason: DisconnectReason::Closed
        }
    );
    assert!(session.is_finished());
}

#[tokio::test]
async fn test_server_close_ends_session_without_retry() {
    let (url, mut from_client, to_client) = spawn_server().await;
    // The owner keeps its sender, so the channel stays open after the task ends.
    let (event_tx, mut events) = event_channel();

    let mut session = ChannelSession::open(
        config(url, Duration::from_secs(60)),
        Arc::new(ReconcilingSink::default()),
        Normalizer::default(),
        event_tx.clone(),
    );
    next_frame(&mut from_client).await;
    assert_matches!(next_event(&mut events).await, ChannelEvent::Connected { .. });

    to_client.send(Message::Close(None)).unwrap();
    assert_eq!(
        next_event(&mut events).await,
        ChannelEvent::Disconnected {
            reason: DisconnectReason::RemoteClosed
        }
    );

    // No reconnect: nothing else arrives.
    assert!(tokio::time::timeout(Duration::from_millis(300), events.recv()).await.is_err());
    assert!(session.is_finished());
    session.close().await;
    drop(event_tx);
}

#[tokio::test]
async fn test_unreachable_server_reports_connect_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let (event_tx, mut events) = event_channel();
    let mut session = ChannelSession::open(
        config(url, Duration::from_secs(60)),
        Arc::new(ReconcilingSink::default()),
        Normalizer::default(),
        event_tx,
    );

    assert_matches!(
        next_event(&mut events).await,
        ChannelEvent::Disconnected {
            reason: DisconnectReason::ConnectFailed(_)
        }
    );
    session.close().await;
}

#[tokio::test]
async fn test_close_aborts_task_stuck_in_sink() {
    let (url, mut from_client, to_client) = spawn_server().await;
    let sink = Arc::new(SlowSink::default());
    let (event_tx, mut events) = event_channel();

    let mut session = ChannelSession::open(
        config(url, Duration::from_secs(60)),
        sink.clone(),
        Normalizer::default(),
        event_tx,
    );
    next_frame(&mut from_client).await;
    assert_matches!(next_event(&mut events).await, ChannelEvent::Connected { .. });

    to_client
        .send(Message::Text(
            r#"{"type":"snapshot","crowd":[{"entity_id":"c1","lat":10.7,"lng":106.6}]}"#.to_string(),
        ))
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), sink.started.notified())
        .await
        .expect("sink never called");

    session.close_within(Duration::from_millis(100)).await;
    assert!(session.is_finished());

    // Past the sink's delay: the aborted task never finished its batch.
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(sink.completed.load(Ordering::SeqCst), 0);
}
