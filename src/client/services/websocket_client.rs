use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use crate::client::chat::channel::{ChannelEvent, EventReceiver, RealtimeChannel, RealtimeConnector};
use crate::client::error::ChannelError;
use crate::client::services::message_parser::{encode_frame, parse_frame};
use crate::common::protocol::OutgoingEvent;

type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Realtime channel over a WebSocket. Reading and writing run on their own
/// tasks; `emit` only queues the frame for the writer.
pub struct WebSocketChannel {
    url: String,
    outgoing_sender: Option<mpsc::UnboundedSender<Message>>,
    events: Option<EventReceiver>,
    connected: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl WebSocketChannel {
    /// Opens the socket. The handshake must finish within `connect_timeout`.
    pub async fn connect(url: &str, connect_timeout: Duration) -> Result<Self, ChannelError> {
        let parsed = url::Url::parse(url).map_err(|e| ChannelError::ConnectionFailed(format!("invalid url {}: {}", url, e)))?;
        info!("[WS:CLIENT] Connecting to {}", parsed);
        let handshake = match tokio::time::timeout(connect_timeout, connect_async(parsed.as_str())).await {
            Ok(handshake) => handshake,
            Err(_) => {
                warn!("[WS:CLIENT] No handshake from {} within {:?}", url, connect_timeout);
                return Err(ChannelError::Timeout);
            }
        };
        let (ws_stream, _) = handshake.map_err(|e| {
            warn!("[WS:CLIENT] Connection failed: {}", e);
            ChannelError::ConnectionFailed(format!("Failed to connect: {}", e))
        })?;
        info!("[WS:CLIENT] Connected to {}", url);

        let (mut ws_sender, ws_receiver) = ws_stream.split();
        let connected = Arc::new(AtomicBool::new(true));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();

        let reader = tokio::spawn(Self::handle_incoming_messages(ws_receiver, event_tx, connected.clone()));

        let writer_connected = connected.clone();
        tokio::spawn(async move {
            debug!("[WS:CLIENT] Starting outgoing message handler");
            while let Some(frame) = outgoing_rx.recv().await {
                let closing = matches!(frame, Message::Close(_));
                if let Err(e) = ws_sender.send(frame).await {
                    warn!("[WS:CLIENT] Failed to send frame: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
            writer_connected.store(false, Ordering::SeqCst);
            debug!("[WS:CLIENT] Outgoing message handler ended");
        });

        Ok(Self {
            url: url.to_string(),
            outgoing_sender: Some(outgoing_tx),
            events: Some(event_rx),
            connected,
            reader: Some(reader),
        })
    }

    async fn handle_incoming_messages(
        mut ws_receiver: WsReader,
        sender: mpsc::UnboundedSender<ChannelEvent>,
        connected: Arc<AtomicBool>,
    ) {
        debug!("[WS:CLIENT] Starting incoming message handler");
        let reason = loop {
            match ws_receiver.next().await {
                Some(Ok(Message::Text(text))) => {
                    debug!("[WS:CLIENT] Received frame: {}", text);
                    match parse_frame(&text) {
                        Ok(event) => {
                            if sender.send(event).is_err() {
                                debug!("[WS:CLIENT] Subscriber dropped, stopping reader");
                                break "subscriber dropped".to_string();
                            }
                        }
                        // Unknown events are skipped, the stream stays up.
                        Err(e) => warn!("[WS:CLIENT] {}", e),
                    }
                }
                Some(Ok(Message::Close(_))) => break "closed by server".to_string(),
                Some(Ok(_)) => {}
                Some(Err(e)) => break format!("WebSocket error: {}", e),
                None => break "connection closed".to_string(),
            }
        };
        connected.store(false, Ordering::SeqCst);
        info!("[WS:CLIENT] Channel ended: {}", reason);
        let _ = sender.send(ChannelEvent::Disconnected { reason });
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl RealtimeChannel for WebSocketChannel {
    fn subscribe(&mut self) -> Result<EventReceiver, ChannelError> {
        self.events.take().ok_or(ChannelError::AlreadySubscribed)
    }

    fn emit(&self, event: &OutgoingEvent) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected);
        }
        let sender = self.outgoing_sender.as_ref().ok_or(ChannelError::NotConnected)?;
        let json = encode_frame(event)?;
        debug!("[WS:CLIENT] Queueing {}", event.name());
        sender
            .send(Message::Text(json))
            .map_err(|_| ChannelError::SendFailed("writer task ended".to_string()))
    }

    fn disconnect(&mut self) {
        if let Some(sender) = self.outgoing_sender.take() {
            let _ = sender.send(Message::Close(None));
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.connected.store(false, Ordering::SeqCst);
        info!("[WS:CLIENT] Disconnected from {}", self.url);
    }

    fn is_connected(&self) -> bool {
        self.outgoing_sender.is_some() && self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for WebSocketChannel {
    fn drop(&mut self) {
        if self.outgoing_sender.is_some() {
            self.disconnect();
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl RealtimeConnector for WebSocketConnector {
    type Channel = WebSocketChannel;

    async fn connect(&self, url: &str) -> Result<WebSocketChannel, ChannelError> {
        WebSocketChannel::connect(url, self.connect_timeout).await
    }
}
