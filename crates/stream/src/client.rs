//! WebSocket connection helper for the push channel.

use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Live push-channel stream.
pub type ChannelStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Errors that can occur on the push channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A protocol-level error on an established connection.
    #[error("Protocol error: {0}")]
    Protocol(#[from] tokio_tungstenite::tungstenite::Error),

    /// An outgoing frame could not be serialized.
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Open a WebSocket connection to `url`.
pub async fn connect(url: &str) -> Result<ChannelStream, ChannelError> {
    let (ws_stream, _response) = connect_async(url)
        .await
        .map_err(|e| ChannelError::Connection(format!("Failed to connect to {url}: {e}")))?;

    tracing::info!(url = %url, "Connected to flood stream");
    Ok(ws_stream)
}
