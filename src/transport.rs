//! Transport abstraction for the coordinator connection.
//!
//! The transport is a dumb pipe for text frames with no knowledge of the
//! coordinator protocol. Production code uses the tokio-tungstenite backed
//! [`WebSocketTransportFactory`]; tests drive the socket through the channel
//! based mock below.

use anyhow::Result;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, trace, warn};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::config::SocketConfig;

type RawWs = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<RawWs, Message>;
type WsStream = SplitStream<RawWs>;

/// An event produced by the transport layer.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The underlying connection finished its HTTP upgrade with this code.
    Opened { code: u16 },
    /// A text frame arrived from the server.
    Message(String),
    /// The server closed the connection.
    Closed { code: u16, reason: String },
    /// The connection failed.
    Failed(String),
}

/// Represents an active connection to the coordinator.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a text frame to the server.
    async fn send(&self, text: &str) -> Result<()>;

    /// Closes the connection with the clean close code.
    async fn close(&self) -> Result<()>;
}

/// A factory responsible for creating new transport instances.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Opens a new transport and returns it along with its event stream.
    /// The receiver buffers from the moment of creation, so a subscriber
    /// obtained here cannot miss the open confirmation.
    async fn open(
        &self,
        config: &SocketConfig,
    ) -> Result<(Arc<dyn Transport>, Receiver<TransportEvent>)>;
}

const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Tokio-tungstenite backed transport.
pub struct WebSocketTransport {
    ws_sink: Arc<Mutex<Option<WsSink>>>,
    clean_close_code: u16,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&self, text: &str) -> Result<()> {
        let mut sink_guard = self.ws_sink.lock().await;
        let sink = sink_guard
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("socket is closed"))?;
        debug!("--> Sending frame: {} bytes", text.len());
        sink.send(Message::text(text)).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut sink_guard = self.ws_sink.lock().await;
        if let Some(mut sink) = sink_guard.take() {
            let frame = CloseFrame {
                code: CloseCode::from(self.clean_close_code),
                reason: "".into(),
            };
            sink.send(Message::Close(Some(frame))).await?;
        }
        Ok(())
    }
}

/// Factory producing [`WebSocketTransport`] instances.
#[derive(Debug, Default)]
pub struct WebSocketTransportFactory;

impl WebSocketTransportFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransportFactory for WebSocketTransportFactory {
    async fn open(
        &self,
        config: &SocketConfig,
    ) -> Result<(Arc<dyn Transport>, Receiver<TransportEvent>)> {
        debug!("Dialing {}", config.url);
        let (client, response) = connect_async(&config.url).await?;
        let code = response.status().as_u16();

        let (sink, stream) = client.split();
        let transport = Arc::new(WebSocketTransport {
            ws_sink: Arc::new(Mutex::new(Some(sink))),
            clean_close_code: config.clean_close_code,
        });

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::task::spawn(read_pump(stream, event_tx.clone()));

        let _ = event_tx.send(TransportEvent::Opened { code }).await;
        Ok((transport, event_rx))
    }
}

async fn read_pump(mut stream: WsStream, event_tx: Sender<TransportEvent>) {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                trace!("<-- Received frame: {} bytes", text.len());
                if event_tx
                    .send(TransportEvent::Message(text.to_string()))
                    .await
                    .is_err()
                {
                    warn!("Event receiver dropped, closing read pump");
                    return;
                }
            }
            Some(Ok(Message::Close(frame))) => {
                let (code, reason) = match frame {
                    Some(f) => (u16::from(f.code), f.reason.to_string()),
                    None => (1005, String::new()),
                };
                trace!("Received close frame: code {code}, reason {reason:?}");
                let _ = event_tx.send(TransportEvent::Closed { code, reason }).await;
                return;
            }
            // Binary, ping and pong frames are not part of the coordinator
            // protocol.
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                error!("Error reading from websocket: {e}");
                let _ = event_tx.send(TransportEvent::Failed(e.to_string())).await;
                return;
            }
            None => {
                trace!("Websocket stream ended");
                let _ = event_tx
                    .send(TransportEvent::Closed {
                        code: 1006,
                        reason: "stream ended".into(),
                    })
                    .await;
                return;
            }
        }
    }
}
