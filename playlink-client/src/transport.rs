//! WebSocket transport
//!
//! Thin layer over tokio-tungstenite: connecting, pulling text frames off
//! the stream, and a shared writable half the call path sends through. The
//! read half stays owned by the connection supervisor; only the sink is
//! behind a lock, and only so that concurrent calls can interleave sends.

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use playlink_core::{Error, Result};
use std::fmt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
pub type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Open a WebSocket to the given endpoint and split it.
pub async fn connect(endpoint: &str) -> Result<(WsSink, WsStream)> {
    let (stream, _response) = connect_async(endpoint)
        .await
        .map_err(|e| Error::Transport(format!("connect {endpoint}: {e}")))?;
    tracing::debug!(endpoint = %endpoint, "websocket established");
    Ok(stream.split())
}

/// What the read half produced.
#[derive(Debug)]
pub enum Inbound {
    /// One text frame of protocol traffic
    Frame(String),
    /// The connection is gone
    Closed(CloseReason),
}

/// Why the read half stopped.
#[derive(Debug)]
pub enum CloseReason {
    /// The server sent a close frame
    Peer,
    /// The stream ended without a close frame
    EndOfStream,
    /// A socket or protocol failure
    Error(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Peer => f.write_str("closed by server"),
            CloseReason::EndOfStream => f.write_str("end of stream"),
            CloseReason::Error(e) => write!(f, "transport failure: {e}"),
        }
    }
}

/// Pull the next protocol frame, transparently skipping everything that is
/// not one: pings, pongs, and binary junk that does not decode as UTF-8.
/// Binary frames that do decode are treated as text; some proxies rewrite
/// frame types.
pub async fn next_inbound(stream: &mut WsStream) -> Inbound {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => return Inbound::Frame(text),
            Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                Ok(text) => return Inbound::Frame(text),
                Err(_) => tracing::warn!("dropping non-UTF-8 binary frame"),
            },
            Some(Ok(Message::Close(_))) => return Inbound::Closed(CloseReason::Peer),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Inbound::Closed(CloseReason::Error(e.to_string())),
            None => return Inbound::Closed(CloseReason::EndOfStream),
        }
    }
}

/// The writable half of the connection, shared between the call path and
/// the supervisor. Empty while disconnected.
#[derive(Default)]
pub struct SendHalf {
    sink: Mutex<Option<WsSink>>,
}

impl SendHalf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a freshly connected sink the active one.
    pub async fn install(&self, sink: WsSink) {
        *self.sink.lock().await = Some(sink);
    }

    /// Drop the active sink, if any. Sends start failing immediately.
    pub async fn clear(&self) {
        *self.sink.lock().await = None;
    }

    /// Send one text frame.
    pub async fn send(&self, frame: String) -> Result<()> {
        let mut guard = self.sink.lock().await;
        match guard.as_mut() {
            Some(sink) => sink
                .send(Message::Text(frame))
                .await
                .map_err(|e| Error::Transport(format!("send: {e}"))),
            None => Err(Error::Disconnected),
        }
    }

    /// Politely close the connection, removing the sink.
    pub async fn close(&self) {
        if let Some(mut sink) = self.sink.lock().await.take() {
            let _ = sink.send(Message::Close(None)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_without_sink_reports_disconnected() {
        let half = SendHalf::new();
        let err = half.send("{}".to_string()).await.unwrap_err();
        assert!(matches!(err, Error::Disconnected));
    }

    #[tokio::test]
    async fn close_without_sink_is_a_no_op() {
        let half = SendHalf::new();
        half.close().await;
        half.clear().await;
    }
}
