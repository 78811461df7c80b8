//! Lifecycle events published by a channel session.

use serde::Serialize;

/// Which kind of server frame produced a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    Snapshot,
    Update,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DisconnectReason {
    /// Closed locally through [`ChannelSession::close`](crate::session::ChannelSession::close).
    Closed,
    /// The server sent a close frame or ended the stream.
    RemoteClosed,
    /// The connection could not be established.
    ConnectFailed(String),
    /// A send or receive failed on an open connection.
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChannelEvent {
    /// Connected and `init` sent.
    Connected { url: String },

    /// A frame was normalized and handed to the sink.
    BatchIngested {
        kind: FrameKind,
        points: usize,
        inserted: usize,
        merged: usize,
    },

    /// A frame could not be parsed. The connection stays open.
    PayloadRejected { reason: String },

    /// The session is over. Nothing reconnects automatically.
    Disconnected { reason: DisconnectReason },
}
