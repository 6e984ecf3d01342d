//! Souk realtime: a reconnecting publish/subscribe client keyed by user id.
//!
//! The channel is an explicitly owned object (no process-wide instance). Socket
//! plumbing sits behind [`Transport`]; [`NotificationHub`] is the in-process
//! implementation the server publishes admin notifications into.

#![forbid(unsafe_code)]

use std::time::Duration;

use futures::stream::BoxStream;
use souk_core::RealtimeEvent;

pub mod channel;
pub mod hub;

pub use channel::{ChannelHandle, ChannelStatus, ConnectionState, DisconnectReason, RealtimeChannel};
pub use hub::NotificationHub;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("no realtime endpoint configured: set SOUK_SOCKET_URL or SOUK_API_URL")]
    MissingEndpoint,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("connection lost: {0}")]
    Lost(String),
}

/// Fixed-delay retry ceiling applied after an unexpected transport loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self { Self { max_attempts: 5, delay: Duration::from_millis(1000) } }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    pub endpoint: String,
    pub policy: ReconnectPolicy,
}

impl RealtimeConfig {
    /// Read the endpoint and retry policy from the environment. Fails fast when no endpoint resolves.
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoint = Self::resolve_endpoint(std::env::var("SOUK_SOCKET_URL").ok(), std::env::var("SOUK_API_URL").ok())?;
        let d = ReconnectPolicy::default();
        let max_attempts = std::env::var("SOUK_RECONNECT_ATTEMPTS").ok().and_then(|s| s.parse::<u32>().ok()).unwrap_or(d.max_attempts);
        let delay = std::env::var("SOUK_RECONNECT_DELAY_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(d.delay);
        Ok(Self { endpoint, policy: ReconnectPolicy { max_attempts, delay } })
    }

    /// Socket URL wins over the API base URL; blank values count as unset.
    pub fn resolve_endpoint(socket_url: Option<String>, api_url: Option<String>) -> Result<String, ConfigError> {
        let pick = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        pick(socket_url).or_else(|| pick(api_url)).ok_or(ConfigError::MissingEndpoint)
    }
}

/// Authentication context attached to every connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: String,
    pub endpoint: String,
}

/// Event stream of one live connection. `None` or `Err` means the connection is gone.
pub type EventStream = BoxStream<'static, Result<RealtimeEvent, TransportError>>;

#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(&self, auth: &AuthContext) -> Result<EventStream, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_url_preferred() {
        let ep = RealtimeConfig::resolve_endpoint(Some("wss://rt.example".into()), Some("https://api.example".into()));
        assert_eq!(ep.unwrap(), "wss://rt.example");
    }

    #[test]
    fn api_url_is_the_fallback() {
        let ep = RealtimeConfig::resolve_endpoint(Some("  ".into()), Some("https://api.example".into()));
        assert_eq!(ep.unwrap(), "https://api.example");
    }

    #[test]
    fn missing_endpoint_fails_fast() {
        assert_eq!(RealtimeConfig::resolve_endpoint(None, None), Err(ConfigError::MissingEndpoint));
        assert_eq!(RealtimeConfig::resolve_endpoint(Some(String::new()), Some(" ".into())), Err(ConfigError::MissingEndpoint));
    }
}
