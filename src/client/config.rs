use std::env;
use std::str::FromStr;
use std::time::Duration;

use log::{info, warn};

use crate::client::discovery::gesture::GestureConfig;
use crate::client::error::ConfigError;
use crate::client::services::api_client::DiscoveryFilters;

/// What a chat session does after its realtime channel drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Stay disconnected until the conversation is reopened.
    Never,
    Backoff {
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        /// Refetch history after reconnecting and append what was missed.
        backfill: bool,
    },
}

impl ReconnectPolicy {
    pub fn backoff(max_attempts: u32, backfill: bool) -> Self {
        ReconnectPolicy::Backoff {
            max_attempts,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            backfill,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        match self {
            ReconnectPolicy::Never => 1,
            ReconnectPolicy::Backoff { max_attempts, .. } => (*max_attempts).max(1),
        }
    }

    /// Delay before retry number `attempt` (1-based), doubling up to `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            ReconnectPolicy::Never => Duration::ZERO,
            ReconnectPolicy::Backoff { initial_delay, max_delay, .. } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                std::cmp::min(initial_delay.saturating_mul(factor), *max_delay)
            }
        }
    }
}

/// How a sent chat message shows up locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EchoPolicy {
    /// Append immediately as pending, reconcile with the server copy.
    #[default]
    Optimistic,
    /// Show the message only once the channel reflects it back.
    ServerEcho,
}

impl FromStr for EchoPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optimistic" => Ok(EchoPolicy::Optimistic),
            "server" | "server_echo" => Ok(EchoPolicy::ServerEcho),
            other => Err(ConfigError { key: "CHAT_ECHO".into(), value: other.into() }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub chat_url: String,
    pub session_token: Option<String>,
    pub gesture: GestureConfig,
    pub ack_duration: Duration,
    pub filters: DiscoveryFilters,
    pub reconnect: ReconnectPolicy,
    pub echo: EchoPolicy,
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000/api".to_string(),
            chat_url: "ws://127.0.0.1:8765/socket".to_string(),
            session_token: None,
            gesture: GestureConfig::default(),
            ack_duration: Duration::from_millis(1000),
            filters: DiscoveryFilters::default(),
            reconnect: ReconnectPolicy::Never,
            echo: EchoPolicy::Optimistic,
            log_level: "info".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let gesture = GestureConfig {
            threshold: parse_var("SWIPE_THRESHOLD", defaults.gesture.threshold),
            jitter: parse_var("SWIPE_JITTER", defaults.gesture.jitter),
            rotation_span: parse_var("SWIPE_ROTATION_SPAN", defaults.gesture.rotation_span),
            viewport_width: parse_var("VIEWPORT_WIDTH", defaults.gesture.viewport_width),
        };

        let filters = DiscoveryFilters {
            age_min: parse_var("DISCOVER_AGE_MIN", defaults.filters.age_min),
            age_max: parse_var("DISCOVER_AGE_MAX", defaults.filters.age_max),
            max_distance: parse_var("DISCOVER_MAX_DISTANCE", defaults.filters.max_distance),
        };

        let reconnect = match env::var("CHAT_RECONNECT").unwrap_or_default().trim() {
            "" | "never" => ReconnectPolicy::Never,
            "backoff" => ReconnectPolicy::backoff(
                parse_var("CHAT_RECONNECT_MAX_ATTEMPTS", 5),
                parse_var("CHAT_RECONNECT_BACKFILL", true),
            ),
            other => {
                warn!("[CONFIG] Unknown CHAT_RECONNECT '{}', reconnect disabled", other);
                ReconnectPolicy::Never
            }
        };

        let echo = match env::var("CHAT_ECHO") {
            Ok(raw) => raw.parse().unwrap_or_else(|e: ConfigError| {
                warn!("[CONFIG] {}, using optimistic echo", e);
                EchoPolicy::Optimistic
            }),
            Err(_) => defaults.echo,
        };

        let config = Self {
            api_base_url: env::var("CONNECTHUB_API_URL").unwrap_or(defaults.api_base_url),
            chat_url: env::var("CONNECTHUB_CHAT_URL").unwrap_or(defaults.chat_url),
            session_token: env::var("CONNECTHUB_SESSION_TOKEN").ok().filter(|t| !t.trim().is_empty()),
            gesture,
            ack_duration: Duration::from_millis(parse_var("ACTION_ACK_MS", 1000)),
            filters,
            reconnect,
            echo,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        };

        info!("Client configuration loaded:");
        info!("  API: {}", config.api_base_url);
        info!("  Chat: {}", config.chat_url);
        info!("  Reconnect: {:?}, echo: {:?}", config.reconnect, config.echo);
        config
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                let err = ConfigError { key: key.to_string(), value: raw };
                warn!("[CONFIG] {}, using default", err);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = ReconnectPolicy::backoff(6, false);
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(16));
        assert_eq!(policy.delay_for(5), Duration::from_secs(30));
        assert_eq!(policy.max_attempts(), 6);
    }

    #[test]
    fn never_policy_tries_once() {
        assert_eq!(ReconnectPolicy::Never.max_attempts(), 1);
        assert_eq!(ReconnectPolicy::Never.delay_for(3), Duration::ZERO);
    }

    #[test]
    fn echo_policy_parsing() {
        assert_eq!("server".parse::<EchoPolicy>().unwrap(), EchoPolicy::ServerEcho);
        assert_eq!(" Optimistic ".parse::<EchoPolicy>().unwrap(), EchoPolicy::Optimistic);
        assert!("sometimes".parse::<EchoPolicy>().is_err());
    }

    #[test]
    fn parse_var_falls_back_on_garbage() {
        std::env::set_var("CONNECTHUB_TEST_PARSE_VAR", "not-a-number");
        assert_eq!(parse_var("CONNECTHUB_TEST_PARSE_VAR", 7u32), 7);
        std::env::set_var("CONNECTHUB_TEST_PARSE_VAR", " 12 ");
        assert_eq!(parse_var("CONNECTHUB_TEST_PARSE_VAR", 7u32), 12);
        std::env::remove_var("CONNECTHUB_TEST_PARSE_VAR");
    }
}
