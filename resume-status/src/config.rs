//! Configuration for the status tracker.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::errors::{Result, StatusError};

/// Environment variable holding the backend HTTP base URL.
pub const ENV_API_URL: &str = "RESUME_STATUS_API_URL";
/// Environment variable overriding the WebSocket endpoint directly.
pub const ENV_WS_URL: &str = "RESUME_STATUS_WS_URL";
/// Environment variable overriding the topic prefix.
pub const ENV_TOPIC_PREFIX: &str = "RESUME_STATUS_TOPIC_PREFIX";
/// Environment variable overriding the reconnect delay.
pub const ENV_RECONNECT_DELAY_MS: &str = "RESUME_STATUS_RECONNECT_DELAY_MS";

const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Configuration for connecting to the status broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// WebSocket endpoint speaking STOMP.
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,
    /// Destination prefix; the identity is appended as the last segment.
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    /// Delay before reconnecting after a transport failure.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Upper bound of random jitter added to the reconnect delay.
    #[serde(default)]
    pub reconnect_jitter_ms: u64,
    /// How long to wait for the socket and the STOMP handshake.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_endpoint_url() -> String {
    endpoint_from_api_url(DEFAULT_API_URL)
}

fn default_topic_prefix() -> String {
    "/topic/resume-status".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    5000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            endpoint_url: default_endpoint_url(),
            topic_prefix: default_topic_prefix(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            reconnect_jitter_ms: 0,
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Derives the raw WebSocket STOMP endpoint from the backend HTTP base URL.
///
/// The broker is mounted at `/ws`; the SockJS raw transport lives under
/// `/ws/websocket`.
#[must_use]
pub fn endpoint_from_api_url(api_url: &str) -> String {
    let base = api_url.trim().trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{base}/ws/websocket")
}

impl TrackerConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the WebSocket endpoint.
    #[must_use]
    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = url.into();
        self
    }

    /// Sets the endpoint from a backend HTTP base URL.
    #[must_use]
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.endpoint_url = endpoint_from_api_url(api_url);
        self
    }

    /// Sets the topic prefix.
    #[must_use]
    pub fn with_topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.topic_prefix = prefix.into();
        self
    }

    /// Sets the reconnect delay.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the reconnect jitter bound.
    #[must_use]
    pub fn with_reconnect_jitter(mut self, jitter: Duration) -> Self {
        self.reconnect_jitter_ms = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Gets the reconnect delay as a Duration.
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Gets the reconnect jitter bound as a Duration.
    #[must_use]
    pub fn reconnect_jitter(&self) -> Duration {
        Duration::from_millis(self.reconnect_jitter_ms)
    }

    /// Gets the connect timeout as a Duration.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Builds the per-identity destination.
    #[must_use]
    pub fn destination_for(&self, identity: &str) -> String {
        format!("{}/{}", self.topic_prefix.trim_end_matches('/'), identity)
    }

    /// Loads configuration from the process environment.
    ///
    /// `RESUME_STATUS_WS_URL` wins over `RESUME_STATUS_API_URL`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ws_url) = lookup(ENV_WS_URL).filter(|v| !v.trim().is_empty()) {
            config.endpoint_url = ws_url.trim().to_string();
        } else if let Some(api_url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            config.endpoint_url = endpoint_from_api_url(&api_url);
        }

        if let Some(prefix) = lookup(ENV_TOPIC_PREFIX).filter(|v| !v.trim().is_empty()) {
            config.topic_prefix = prefix.trim().to_string();
        }

        if let Some(delay) = lookup(ENV_RECONNECT_DELAY_MS) {
            config.reconnect_delay_ms = delay.trim().parse().map_err(|_| {
                StatusError::config(format!("{ENV_RECONNECT_DELAY_MS} must be an integer, got '{delay}'"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| StatusError::config(format!("{}: {e}", path.as_ref().display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values the transport cannot use.
    pub fn validate(&self) -> Result<()> {
        if !(self.endpoint_url.starts_with("ws://") || self.endpoint_url.starts_with("wss://")) {
            return Err(StatusError::config(format!(
                "endpoint_url must use ws:// or wss://, got '{}'",
                self.endpoint_url
            )));
        }
        if !self.topic_prefix.starts_with('/') {
            return Err(StatusError::config(format!(
                "topic_prefix must start with '/', got '{}'",
                self.topic_prefix
            )));
        }
        Ok(())
    }
}
