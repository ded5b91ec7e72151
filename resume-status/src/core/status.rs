//! Stage lifecycle and connection state enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The last known lifecycle state of a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    /// The stage has begun running.
    Started,
    /// The stage finished successfully.
    Success,
    /// The stage failed.
    Failed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleState {
    type Err = UnknownLifecycleState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STARTED" => Ok(Self::Started),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            other => Err(UnknownLifecycleState(other.to_string())),
        }
    }
}

impl LifecycleState {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "STARTED",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }

    /// Returns true if the stage has finished, successfully or not.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// A lifecycle value outside `STARTED | SUCCESS | FAILED`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLifecycleState(pub String);

impl fmt::Display for UnknownLifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown lifecycle state: {}", self.0)
    }
}

impl std::error::Error for UnknownLifecycleState {}

/// The state of the transport connection owned by a connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection is open.
    #[default]
    Disconnected,
    /// `open` was called and the transport has not confirmed yet.
    Connecting,
    /// The transport is connected and subscribed.
    Connected,
    /// The transport reported a failure. It may still reconnect.
    Errored,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Errored => write!(f, "errored"),
        }
    }
}

impl ConnectionState {
    /// Returns true while a connection is open or being established.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_display() {
        assert_eq!(LifecycleState::Started.to_string(), "STARTED");
        assert_eq!(LifecycleState::Success.to_string(), "SUCCESS");
        assert_eq!(LifecycleState::Failed.to_string(), "FAILED");
    }

    #[test]
    fn test_lifecycle_from_str() {
        assert_eq!("SUCCESS".parse::<LifecycleState>(), Ok(LifecycleState::Success));
        assert_eq!(
            "success".parse::<LifecycleState>(),
            Err(UnknownLifecycleState("success".to_string()))
        );
        assert!("UNKNOWN".parse::<LifecycleState>().is_err());
    }

    #[test]
    fn test_lifecycle_is_terminal() {
        assert!(!LifecycleState::Started.is_terminal());
        assert!(LifecycleState::Success.is_terminal());
        assert!(LifecycleState::Failed.is_terminal());
    }

    #[test]
    fn test_lifecycle_serialize() {
        let json = serde_json::to_string(&LifecycleState::Failed).unwrap();
        assert_eq!(json, r#""FAILED""#);

        let state: LifecycleState = serde_json::from_str(r#""STARTED""#).unwrap();
        assert_eq!(state, LifecycleState::Started);
    }

    #[test]
    fn test_connection_state_default() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert!(!ConnectionState::Disconnected.is_open());
        assert!(ConnectionState::Errored.is_open());
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionState::Errored.to_string(), "errored");
    }
}
