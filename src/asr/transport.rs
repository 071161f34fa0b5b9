//! Duplex message transport used by the recognition client.
//!
//! [`Transport::open`] yields a [`TransportConnection`]: an outbound
//! [`TransportSink`] and an inbound frame channel. The production
//! implementation is [`TungsteniteTransport`]; tests substitute scripted
//! in-memory transports.

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use crate::error::{Result, VoiceError};

/// An inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportFrame {
    Text(String),
    Binary(Vec<u8>),
    /// The peer closed the connection.
    Closed,
    /// A read failed; no more frames follow.
    Error(String),
}

/// Outbound half of a connection.
#[async_trait]
pub trait TransportSink: Send {
    async fn send_text(&mut self, text: String) -> Result<()>;
    async fn send_binary(&mut self, data: Vec<u8>) -> Result<()>;
    /// Close the connection. Idempotent.
    async fn close(&mut self) -> Result<()>;
}

/// An open connection.
pub struct TransportConnection {
    pub sink: Box<dyn TransportSink>,
    pub frames: mpsc::UnboundedReceiver<TransportFrame>,
}

impl std::fmt::Debug for TransportConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConnection").finish_non_exhaustive()
    }
}

/// Opens connections.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to `url` with extra request headers.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Connection`] if the connection cannot be established.
    async fn open(&self, url: &str, headers: &[(String, String)]) -> Result<TransportConnection>;
}

// ---------------------------------------------------------------------------
// WebSocket implementation
// ---------------------------------------------------------------------------

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport over tokio-tungstenite.
#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteTransport;

struct WsSink {
    write: SplitSink<WsStream, Message>,
    reader: tokio::task::JoinHandle<()>,
    closed: bool,
}

#[async_trait]
impl TransportSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.write
            .send(Message::Text(text))
            .await
            .map_err(|e| VoiceError::Connection(format!("send error: {e}")))
    }

    async fn send_binary(&mut self, data: Vec<u8>) -> Result<()> {
        self.write
            .send(Message::Binary(data))
            .await
            .map_err(|e| VoiceError::Connection(format!("send error: {e}")))
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = self.write.close().await;
        self.reader.abort();
        result.map_err(|e| VoiceError::Connection(format!("close error: {e}")))
    }
}

impl Drop for WsSink {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn open(&self, url: &str, headers: &[(String, String)]) -> Result<TransportConnection> {
        let mut request = url
            .into_client_request()
            .map_err(|e| VoiceError::Connection(format!("invalid url {url}: {e}")))?;
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| VoiceError::Connection(format!("invalid header name: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| VoiceError::Connection(format!("invalid header value: {e}")))?;
            request.headers_mut().insert(name, value);
        }

        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| VoiceError::Connection(format!("connect: {e}")))?;
        debug!(url, "websocket connected");

        let (write, mut read) = ws_stream.split();
        let (tx, frames) = mpsc::unbounded_channel();

        let reader = tokio::spawn(async move {
            loop {
                let frame = match read.next().await {
                    Some(Ok(Message::Text(text))) => TransportFrame::Text(text),
                    Some(Ok(Message::Binary(data))) => TransportFrame::Binary(data),
                    Some(Ok(Message::Close(_))) | None => {
                        let _ = tx.send(TransportFrame::Closed);
                        break;
                    }
                    Some(Err(e)) => {
                        let _ = tx.send(TransportFrame::Error(e.to_string()));
                        break;
                    }
                    _ => continue, // Ping/Pong handled by tungstenite.
                };
                if tx.send(frame).is_err() {
                    break;
                }
            }
        });

        Ok(TransportConnection {
            sink: Box::new(WsSink {
                write,
                reader,
                closed: false,
            }),
            frames,
        })
    }
}
