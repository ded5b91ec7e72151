//! Error types for the status tracker.
//!
//! Only transport-level problems are modelled as errors. Malformed stage
//! events are dropped by the aggregator and a `FAILED` stage is ordinary
//! snapshot data, so neither appears here.

use thiserror::Error;

/// The main error type for status tracking operations.
#[derive(Debug, Error)]
pub enum StatusError {
    /// The user identity cannot scope a channel.
    #[error("{0}")]
    InvalidIdentity(#[from] InvalidIdentityError),

    /// The transport failed to open or close.
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// A STOMP frame could not be decoded.
    #[error("{0}")]
    Frame(#[from] FrameError),

    /// The configuration is invalid or could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The tracker task has stopped and no longer accepts commands.
    #[error("Status tracker is closed")]
    TrackerClosed,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StatusError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Error raised when an identity cannot be used to build a channel name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid identity '{identity}': {reason}")]
pub struct InvalidIdentityError {
    /// The rejected identity.
    pub identity: String,
    /// Why it was rejected.
    pub reason: String,
}

impl InvalidIdentityError {
    /// Creates a new invalid identity error.
    #[must_use]
    pub fn new(identity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            reason: reason.into(),
        }
    }

    /// The identity was empty.
    #[must_use]
    pub fn empty() -> Self {
        Self::new("", "identity must not be empty")
    }
}

/// Errors reported by a transport implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The endpoint URL is unusable.
    #[error("Invalid endpoint '{url}': {reason}")]
    InvalidEndpoint {
        /// The configured endpoint.
        url: String,
        /// Parser or scheme complaint.
        reason: String,
    },

    /// The socket could not be established.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The broker answered with something we do not understand.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The transport was already closed.
    #[error("Transport closed")]
    Closed,
}

impl TransportError {
    /// Creates an invalid endpoint error.
    #[must_use]
    pub fn invalid_endpoint(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while decoding STOMP frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The frame had no command line.
    #[error("Frame is missing a command")]
    MissingCommand,

    /// The command is not a STOMP command.
    #[error("Unknown STOMP command: {0}")]
    UnknownCommand(String),

    /// A header line had no colon.
    #[error("Malformed header line: {0}")]
    MalformedHeader(String),

    /// A header used an escape sequence outside the STOMP 1.2 set.
    #[error("Invalid escape sequence in header: {0}")]
    InvalidEscape(String),

    /// The frame was not terminated by a NUL octet.
    #[error("Frame is not NUL-terminated")]
    Unterminated,

    /// `content-length` was not a number or exceeded the body.
    #[error("Invalid content-length: {0}")]
    InvalidContentLength(String),
}

/// Result type alias for status tracking operations.
pub type Result<T> = std::result::Result<T, StatusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_identity_display() {
        let err = InvalidIdentityError::new("a/b", "identity must not contain '/'");
        assert_eq!(
            err.to_string(),
            "Invalid identity 'a/b': identity must not contain '/'"
        );
    }

    #[test]
    fn test_status_error_from_transport() {
        let err: StatusError = TransportError::Connect("refused".to_string()).into();
        assert!(matches!(err, StatusError::Transport(_)));
        assert_eq!(err.to_string(), "Connection failed: refused");
    }

    #[test]
    fn test_status_error_from_frame() {
        let err: StatusError = FrameError::UnknownCommand("HELLO".to_string()).into();
        assert_eq!(err.to_string(), "Unknown STOMP command: HELLO");
    }

    #[test]
    fn test_config_error() {
        let err = StatusError::config("bad url");
        assert_eq!(err.to_string(), "Configuration error: bad url");
    }

    #[test]
    fn test_invalid_endpoint() {
        let err = TransportError::invalid_endpoint("ftp://x", "unsupported scheme");
        assert_eq!(err.to_string(), "Invalid endpoint 'ftp://x': unsupported scheme");
    }
}
