use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::common::timestamp;

/// Ids come over the wire either as JSON strings or integers (the backend uses
/// numeric user ids and uuid match ids); both are kept as opaque text.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                RawId::deserialize(deserializer).map(|raw| Self(raw.into_string()))
            }
        }
    };
}

opaque_id!(
    /// A user as seen by discovery (the candidate shown on a card).
    CandidateId
);
opaque_id!(UserId);
opaque_id!(
    /// A mutual match. Each match owns exactly one conversation.
    MatchId
);
opaque_id!(MessageId);

pub type ConversationId = MatchId;

impl From<CandidateId> for UserId {
    fn from(id: CandidateId) -> Self {
        UserId(id.0)
    }
}

/// A discoverable profile. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    #[serde(rename = "first_name")]
    pub name: String,
    pub age: u32,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub interests: BTreeSet<String>,
    #[serde(default)]
    pub distance: f64,
    #[serde(rename = "is_premium", default)]
    pub premium: bool,
}

impl Candidate {
    /// First photo, used as the card background.
    pub fn cover_photo(&self) -> Option<&str> {
        self.photos.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastMessage {
    pub text: String,
    #[serde(with = "timestamp")]
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub is_from_current_user: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub user_id: UserId,
    pub matched_user_id: UserId,
    /// The other party.
    pub user: Candidate,
    #[serde(with = "timestamp")]
    pub matched_at: DateTime<Utc>,
    #[serde(default)]
    pub last_message: Option<LastMessage>,
    #[serde(default)]
    pub is_new_match: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LikeKind {
    #[serde(rename = "like")]
    Like,
    #[serde(rename = "super")]
    SuperLike,
}

impl fmt::Display for LikeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LikeKind::Like => f.write_str("like"),
            LikeKind::SuperLike => f.write_str("super"),
        }
    }
}

/// Response to a like or super-like. Never produced for a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikeResult {
    #[serde(default)]
    pub is_match: bool,
    #[serde(rename = "match", default)]
    pub matched: Option<Match>,
}

impl LikeResult {
    pub fn no_match() -> Self {
        Self { is_match: false, matched: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MessageOrigin {
    #[default]
    History,
    Realtime,
    /// Rendered optimistically, waiting for the server to reflect it.
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: MessageId,
    #[serde(rename = "match_id")]
    pub conversation_id: ConversationId,
    #[serde(rename = "from_user_id")]
    pub sender_id: UserId,
    pub text: String,
    #[serde(with = "timestamp")]
    pub sent_at: DateTime<Utc>,
    #[serde(skip)]
    pub origin: MessageOrigin,
    /// Set from the local user id when the message enters a session; the
    /// server's own flag is ignored.
    #[serde(skip)]
    pub is_mine: bool,
    /// Client-generated correlation id for messages this client sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl ConversationMessage {
    pub fn is_pending(&self) -> bool {
        self.origin == MessageOrigin::Local
    }
}
