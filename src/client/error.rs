use thiserror::Error;

/// Failures talking to the REST collaborators (discovery, likes, history).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no active session")]
    Unauthenticated,
}

/// Realtime channel failures. None of these are fatal to the caller.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ChannelError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("channel not connected")]
    NotConnected,

    #[error("message send failed: {0}")]
    SendFailed(String),

    #[error("channel disconnected")]
    Disconnected,

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("operation timed out")]
    Timeout,

    #[error("channel events already taken")]
    AlreadySubscribed,
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("chat session is closed")]
    Closed,
}

#[derive(Debug, Error)]
#[error("invalid value for {key}: {value}")]
pub struct ConfigError {
    pub key: String,
    pub value: String,
}
