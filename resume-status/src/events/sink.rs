//! Tracker events and the sinks that receive them.

use parking_lot::RwLock;
use serde_json::json;
use tracing::{debug, info, warn, Level};

use crate::core::LifecycleState;

/// Something noteworthy the tracker did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    /// The aggregator attached to an identity.
    Attached {
        /// The identity whose channel is tracked.
        identity: String,
    },
    /// The aggregator detached.
    Detached {
        /// The identity that was tracked, if any.
        identity: Option<String>,
    },
    /// The subscription became live.
    Connected {
        /// The tracked identity.
        identity: Option<String>,
    },
    /// A transport failure was surfaced as the connection error.
    ConnectionErrored {
        /// The human readable error.
        message: String,
    },
    /// A stage's state changed.
    StageUpdated {
        /// The stage name.
        stage: String,
        /// The new state.
        state: LifecycleState,
        /// The state it replaced.
        previous: Option<LifecycleState>,
    },
    /// A message was ignored because it was not a valid stage event.
    EventDropped {
        /// Why it was ignored.
        reason: String,
    },
    /// A reset token change started a fresh tracking session.
    Reset {
        /// The new token.
        token: u64,
        /// Queued messages that were thrown away.
        discarded: usize,
    },
}

impl TrackerEvent {
    /// Returns the dotted event type.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::Attached { .. } => "status.attached",
            Self::Detached { .. } => "status.detached",
            Self::Connected { .. } => "connection.connected",
            Self::ConnectionErrored { .. } => "connection.errored",
            Self::StageUpdated { .. } => "status.stage_updated",
            Self::EventDropped { .. } => "status.event_dropped",
            Self::Reset { .. } => "status.reset",
        }
    }

    /// Returns the event payload as JSON.
    #[must_use]
    pub fn data(&self) -> serde_json::Value {
        match self {
            Self::Attached { identity } => json!({ "identity": identity }),
            Self::Detached { identity } | Self::Connected { identity } => {
                json!({ "identity": identity })
            }
            Self::ConnectionErrored { message } => json!({ "message": message }),
            Self::StageUpdated {
                stage,
                state,
                previous,
            } => json!({ "stage": stage, "state": state, "previous": previous }),
            Self::EventDropped { reason } => json!({ "reason": reason }),
            Self::Reset { token, discarded } => json!({ "token": token, "discarded": discarded }),
        }
    }
}

/// Receives tracker events for logging, monitoring or tests.
///
/// Implementations must not block and must never panic; they are called
/// inline while the aggregator applies an update.
pub trait EventSink: Send + Sync {
    /// Emits an event.
    fn emit(&self, event: &TrackerEvent);
}

/// A no-op event sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn emit(&self, _event: &TrackerEvent) {}
}

/// An event sink that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl EventSink for LoggingEventSink {
    fn emit(&self, event: &TrackerEvent) {
        let event_type = event.event_type();
        let data = event.data();
        // Connection failures are always worth a warning.
        if matches!(event, TrackerEvent::ConnectionErrored { .. }) {
            warn!(event_type = %event_type, event_data = %data, "Event: {}", event_type);
            return;
        }
        if self.level == Level::DEBUG {
            debug!(event_type = %event_type, event_data = %data, "Event: {}", event_type);
        } else {
            info!(event_type = %event_type, event_data = %data, "Event: {}", event_type);
        }
    }
}

/// A collecting event sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<TrackerEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<TrackerEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events matching a type prefix.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<TrackerEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type().starts_with(type_prefix))
            .cloned()
            .collect()
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event: &TrackerEvent) {
        self.events.write().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_sink() {
        let sink = NoOpEventSink;
        sink.emit(&TrackerEvent::EventDropped {
            reason: "missing agentName".to_string(),
        });
    }

    #[test]
    fn test_logging_sink() {
        let sink = LoggingEventSink::default();
        sink.emit(&TrackerEvent::Attached {
            identity: "u1".to_string(),
        });
        LoggingEventSink::debug().emit(&TrackerEvent::ConnectionErrored {
            message: "WebSocket connection failed.".to_string(),
        });
    }

    #[test]
    fn test_collecting_sink_filter() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit(&TrackerEvent::StageUpdated {
            stage: "MatchingAgent".to_string(),
            state: LifecycleState::Started,
            previous: None,
        });
        sink.emit(&TrackerEvent::Reset {
            token: 1,
            discarded: 0,
        });
        sink.emit(&TrackerEvent::Connected { identity: None });

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.events_of_type("status.").len(), 2);
        assert_eq!(sink.events_of_type("connection.").len(), 1);

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_event_data() {
        let event = TrackerEvent::StageUpdated {
            stage: "MatchingAgent".to_string(),
            state: LifecycleState::Success,
            previous: Some(LifecycleState::Started),
        };
        assert_eq!(event.event_type(), "status.stage_updated");
        assert_eq!(
            event.data(),
            json!({ "stage": "MatchingAgent", "state": "SUCCESS", "previous": "STARTED" })
        );
    }
}
