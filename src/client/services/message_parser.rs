// Client-side parsing and display helpers for chat frames
use chrono::{DateTime, Local, Utc};

use crate::client::chat::channel::ChannelEvent;
use crate::client::error::ChannelError;
use crate::common::models::ConversationMessage;
use crate::common::protocol::{IncomingEvent, OutgoingEvent};

/// Decodes one text frame from the chat server.
pub fn parse_frame(text: &str) -> Result<ChannelEvent, ChannelError> {
    let event: IncomingEvent =
        serde_json::from_str(text).map_err(|e| ChannelError::InvalidMessage(format!("{}: {}", e, text)))?;
    Ok(match event {
        IncomingEvent::NewMessage(message) => ChannelEvent::Message(message),
        IncomingEvent::Error(err) => ChannelEvent::ServerError(err.message),
    })
}

pub fn encode_frame(event: &OutgoingEvent) -> Result<String, ChannelError> {
    serde_json::to_string(event).map_err(|e| ChannelError::SendFailed(format!("Failed to serialize {}: {}", event.name(), e)))
}

/// HH:MM in local time.
pub fn format_timestamp(sent_at: DateTime<Utc>) -> String {
    sent_at.with_timezone(&Local).format("%H:%M").to_string()
}

/// One line of the terminal transcript: `[HH:MM] name: text`, with a marker
/// for sends still waiting for the server.
pub fn render_line(message: &ConversationMessage, my_name: &str, peer_name: &str) -> String {
    let who = if message.is_mine { my_name } else { peer_name };
    let pending = if message.is_pending() { " (sending)" } else { "" };
    format!("[{}] {}: {}{}", format_timestamp(message.sent_at), who, message.text, pending)
}
