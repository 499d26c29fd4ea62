pub mod auth;
pub mod chat;
pub mod config;
pub mod discovery;
pub mod error;
pub mod services;

pub use config::ClientConfig;
pub use error::{ApiError, ChannelError, ChatError, ConfigError};
