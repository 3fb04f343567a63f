//! Client configuration.

use std::time::Duration;

use stealthim_protocol::constants::{
    ACK_TIMEOUT, DEFAULT_USER_AGENT, HANDSHAKE_TIMEOUT, REQUEST_TIMEOUT, STREAM_MAX_ATTEMPTS,
    STREAM_RETRY_DELAY,
};

use crate::closure::ClosurePolicy;

/// Default capacity of the live-event delivery channel.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Default capacity of the upload progress channel.
pub const DEFAULT_PROGRESS_CHANNEL_CAPACITY: usize = 16;

/// Settings shared by every operation of a [`Client`](crate::Client).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL (`http://` or `https://`), without a trailing slash.
    pub base_url: String,
    /// Session token attached as the bearer credential.
    pub session: Option<String>,
    /// Client identity header.
    pub user_agent: String,
    /// Timeout for ordinary request/response calls.
    pub request_timeout: Duration,
    /// Timeout for the duplex (WebSocket) handshake.
    pub handshake_timeout: Duration,
    /// Time allowed for each upload ack.
    pub ack_timeout: Duration,
    /// Live-event reconnection settings.
    pub stream: StreamConfig,
    /// Closures accepted as upload completion.
    pub closure: ClosurePolicy,
}

impl ClientConfig {
    /// Creates a configuration with defaults for everything but the base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            session: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: REQUEST_TIMEOUT,
            handshake_timeout: HANDSHAKE_TIMEOUT,
            ack_timeout: ACK_TIMEOUT,
            stream: StreamConfig::default(),
            closure: ClosurePolicy::default(),
        }
    }

    /// Sets the session token.
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        let session = session.into();
        self.session = (!session.is_empty()).then_some(session);
        self
    }
}

/// Reconnection policy for the live-event consumer.
///
/// Unlike the exponential backoff used for long-lived connections, the
/// event stream retries a bounded number of times with a fixed delay.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Total connection attempts, including the first.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub retry_delay: Duration,
    /// Capacity of the delivery channel; a full channel blocks the reader.
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_attempts: STREAM_MAX_ATTEMPTS,
            retry_delay: STREAM_RETRY_DELAY,
            channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::new("https://im.example.com/");
        assert_eq!(config.base_url, "https://im.example.com");
        assert!(config.session.is_none());
        assert_eq!(config.stream.max_attempts, 3);
        assert_eq!(config.stream.retry_delay, Duration::from_secs(1));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
    }

    #[test]
    fn empty_session_is_none() {
        assert!(ClientConfig::new("http://h").with_session("").session.is_none());
        assert_eq!(
            ClientConfig::new("http://h").with_session("tok").session.as_deref(),
            Some("tok")
        );
    }
}
