use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::models::{ConversationId, ConversationMessage, MessageId, MessageOrigin, UserId};
use crate::common::timestamp;

/// Realtime protocol between client and chat server.
///
/// Every frame is a JSON text message `{"event": <name>, "data": <payload>}`.
pub const EVENT_JOIN_ROOM: &str = "join_room";
pub const EVENT_SEND_MESSAGE: &str = "send_message";
pub const EVENT_NEW_MESSAGE: &str = "new_message";
pub const EVENT_ERROR: &str = "error";

pub const MAX_MESSAGE_LENGTH: usize = 2048;

/// Room membership request; a room is scoped to one conversation and the
/// joining user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRoom {
    pub match_id: ConversationId,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMessage {
    pub match_id: ConversationId,
    pub from_user_id: UserId,
    pub text: String,
    pub client_id: String,
}

/// A message broadcast by the server to every member of the room, the sender
/// included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub id: MessageId,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub match_id: ConversationId,
    pub from_user_id: UserId,
    pub text: String,
    #[serde(with = "timestamp")]
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub client_id: Option<String>,
}

impl NewMessage {
    pub fn into_message(self, local_user: &UserId) -> ConversationMessage {
        let is_mine = &self.from_user_id == local_user;
        ConversationMessage {
            id: self.id,
            conversation_id: self.match_id,
            sender_id: self.from_user_id,
            text: self.text,
            sent_at: self.sent_at,
            origin: MessageOrigin::Realtime,
            is_mine,
            client_id: self.client_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerError {
    pub message: String,
}

/// Frames the client sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutgoingEvent {
    JoinRoom(JoinRoom),
    SendMessage(SendMessage),
}

impl OutgoingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutgoingEvent::JoinRoom(_) => EVENT_JOIN_ROOM,
            OutgoingEvent::SendMessage(_) => EVENT_SEND_MESSAGE,
        }
    }
}

/// Frames the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum IncomingEvent {
    NewMessage(NewMessage),
    Error(ServerError),
}
