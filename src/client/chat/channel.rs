use log::{info, warn};
use rand::Rng;
use tokio::sync::mpsc;

use crate::client::config::ReconnectPolicy;
use crate::client::error::ChannelError;
use crate::common::protocol::{JoinRoom, NewMessage, OutgoingEvent};

/// What a realtime channel delivers to its subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Message(NewMessage),
    /// `error` frame from the server.
    ServerError(String),
    /// The connection ended; no more events follow.
    Disconnected { reason: String },
}

pub type EventReceiver = mpsc::UnboundedReceiver<ChannelEvent>;

/// A persistent bidirectional event stream.
///
/// `emit` is synchronous: it either queues the frame or fails immediately, it
/// never waits for the network.
pub trait RealtimeChannel {
    /// Hands out the inbound event stream. Only the first call succeeds.
    fn subscribe(&mut self) -> Result<EventReceiver, ChannelError>;

    fn emit(&self, event: &OutgoingEvent) -> Result<(), ChannelError>;

    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    fn join(&self, room: &JoinRoom) -> Result<(), ChannelError> {
        self.emit(&OutgoingEvent::JoinRoom(room.clone()))
    }
}

#[allow(async_fn_in_trait)]
pub trait RealtimeConnector {
    type Channel: RealtimeChannel;

    /// One connection attempt.
    async fn connect(&self, url: &str) -> Result<Self::Channel, ChannelError>;
}

/// Connects with the retry schedule of `policy`. `Never` makes a single attempt.
pub async fn connect_with_retry<K: RealtimeConnector>(
    connector: &K,
    url: &str,
    policy: &ReconnectPolicy,
) -> Result<K::Channel, ChannelError> {
    let max_attempts = policy.max_attempts();
    let mut last_error = ChannelError::ConnectionFailed("no attempt made".to_string());

    for attempt in 1..=max_attempts {
        match connector.connect(url).await {
            Ok(channel) => {
                if attempt > 1 {
                    info!("[WS:CLIENT] Connected to {} after {} attempts", url, attempt);
                }
                return Ok(channel);
            }
            Err(e) => {
                warn!("[WS:CLIENT] Connection attempt {}/{} failed: {}", attempt, max_attempts, e);
                last_error = e;
                if attempt < max_attempts {
                    let delay = policy.delay_for(attempt);
                    let jitter_ms = delay.as_millis() as u64 / 10;
                    let jitter = std::time::Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms));
                    info!("[WS:CLIENT] Retrying in {:?}...", delay + jitter);
                    tokio::time::sleep(delay + jitter).await;
                }
            }
        }
    }

    Err(last_error)
}
