use log::{debug, info, warn};

use crate::client::chat::channel::{connect_with_retry, ChannelEvent, EventReceiver, RealtimeChannel, RealtimeConnector};
use crate::client::chat::session::ChatSession;
use crate::client::config::ReconnectPolicy;
use crate::client::error::{ChannelError, ChatError};
use crate::client::services::api_client::ChatHistoryApi;

/// Runs the history fetch while still handling realtime events, so neither
/// source waits on the other. Returns once history has been applied.
pub async fn sync_history<C, H>(session: &mut ChatSession<C>, history: &H, events: &mut EventReceiver)
where
    C: RealtimeChannel,
    H: ChatHistoryApi,
{
    let conversation_id = session.conversation_id().clone();
    let fetch = history.fetch_history(&conversation_id);
    tokio::pin!(fetch);

    loop {
        tokio::select! {
            result = &mut fetch => {
                session.apply_history(result);
                break;
            }
            Some(event) = events.recv() => session.handle_event(event),
        }
    }
}

/// Applies every event already queued without waiting. Returns how many were handled.
pub fn drain_events<C: RealtimeChannel>(session: &mut ChatSession<C>, events: &mut EventReceiver) -> usize {
    let mut handled = 0;
    while let Ok(event) = events.try_recv() {
        session.handle_event(event);
        handled += 1;
    }
    handled
}

/// True for events after which the channel is gone.
pub fn is_disconnect(event: &ChannelEvent) -> bool {
    matches!(event, ChannelEvent::Disconnected { .. })
}

/// Reconnects a dropped session according to `policy`. With `backfill`,
/// history is refetched and only unseen messages are appended. `Never`
/// leaves the session disconnected.
pub async fn reconnect<C, K, H>(
    session: &mut ChatSession<C>,
    connector: &K,
    history: &H,
    url: &str,
    policy: &ReconnectPolicy,
) -> Result<EventReceiver, ChatError>
where
    C: RealtimeChannel,
    K: RealtimeConnector<Channel = C>,
    H: ChatHistoryApi,
{
    let ReconnectPolicy::Backoff { backfill, .. } = *policy else {
        debug!("[CHAT] Reconnect disabled, {} stays offline", session.conversation_id());
        return Err(ChannelError::Disconnected.into());
    };
    if session.is_closed() {
        return Err(ChatError::Closed);
    }

    let channel = connect_with_retry(connector, url, policy).await?;
    let events = session.attach(channel)?;
    info!("[CHAT] Reconnected {}", session.conversation_id());

    if backfill {
        let conversation_id = session.conversation_id().clone();
        match history.fetch_history(&conversation_id).await {
            Ok(messages) => {
                session.backfill(messages);
            }
            Err(e) => warn!("[CHAT] Backfill for {} failed: {}", conversation_id, e),
        }
    }
    Ok(events)
}
