//! The status aggregator.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

use super::snapshot::{ResetToken, StatusSnapshot};
use super::state::AggregateState;
use crate::config::TrackerConfig;
use crate::connection::{ConnectionEvent, ConnectionManager};
use crate::core::{ConnectionState, StageEvent};
use crate::errors::{Result, StatusError};
use crate::events::{EventSink, NoOpEventSink, TrackerEvent};
use crate::transport::Transport;

/// Turns the event stream of one identity into a [`StatusSnapshot`].
///
/// The aggregator is the only writer of its state. Events are applied in
/// the order the transport delivered them; every change is published to
/// the watchers returned by [`StatusAggregator::subscribe`].
pub struct StatusAggregator {
    manager: ConnectionManager,
    state: AggregateState,
    connection_error: Option<String>,
    reset_token: Option<ResetToken>,
    attached: bool,
    sink: Arc<dyn EventSink>,
    snapshots: watch::Sender<StatusSnapshot>,
    updated_at: Option<DateTime<Utc>>,
}

impl StatusAggregator {
    /// Creates an aggregator around a connection manager.
    #[must_use]
    pub fn new(manager: ConnectionManager) -> Self {
        let (snapshots, _) = watch::channel(StatusSnapshot::default());
        Self {
            manager,
            state: AggregateState::new(),
            connection_error: None,
            reset_token: None,
            attached: false,
            sink: Arc::new(NoOpEventSink),
            snapshots,
            updated_at: None,
        }
    }

    /// Creates an aggregator that owns a fresh manager over `transport`.
    #[must_use]
    pub fn with_transport(transport: Arc<dyn Transport>, config: &TrackerConfig) -> Self {
        Self::new(ConnectionManager::new(transport, config))
    }

    /// Routes tracker events to `sink`.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns a receiver that sees every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.snapshots.subscribe()
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Returns true between `attach` and `detach`.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Returns true if there is a live event feed to wait on.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.attached && self.manager.is_receiving()
    }

    /// Returns the identity currently tracked.
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        self.manager.identity()
    }

    /// Returns the connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Returns the last reset token seen.
    #[must_use]
    pub fn reset_token(&self) -> Option<ResetToken> {
        self.reset_token
    }

    /// Starts or continues tracking `identity`.
    ///
    /// Opens the connection unless it is already open for this identity.
    /// A changed `reset` token starts a fresh session first. A new
    /// subscription always starts from an empty snapshot, so nothing seen
    /// on another identity's channel carries over.
    pub async fn attach(&mut self, identity: &str, reset: Option<ResetToken>) -> Result<()> {
        if let Some(token) = reset {
            self.reset(token);
        }

        let subscribing = !self.manager.is_open_for(identity);
        if let Err(e) = self.manager.open(identity).await {
            if let StatusError::Transport(ref transport_error) = e {
                self.record_connection_error(transport_error.to_string());
            }
            return Err(e);
        }
        if subscribing {
            self.state.clear();
            self.connection_error = None;
            self.touch();
        }

        if !self.attached {
            self.attached = true;
            info!(identity = %identity, "Status aggregator attached");
            self.sink.emit(&TrackerEvent::Attached {
                identity: identity.to_string(),
            });
        }
        self.publish();
        Ok(())
    }

    /// Starts a fresh session if `token` differs from the last one seen.
    ///
    /// Clears every stage and the connection error, and throws away events
    /// that were delivered but not yet applied. The connection is kept.
    /// Returns whether a reset happened.
    pub fn reset(&mut self, token: ResetToken) -> bool {
        if self.reset_token == Some(token) {
            return false;
        }
        self.reset_token = Some(token);

        let discarded = self.manager.discard_pending();
        self.state.clear();
        self.connection_error = None;
        debug!(token = %token, discarded, "Status session reset");
        self.sink.emit(&TrackerEvent::Reset {
            token: token.0,
            discarded,
        });
        self.touch();
        self.publish();
        true
    }

    /// Stops tracking and closes the connection. Safe to call repeatedly.
    ///
    /// The last snapshot stays visible; nothing delivered afterwards can
    /// change it.
    pub async fn detach(&mut self) {
        if !self.attached && !self.manager.state().is_open() {
            return;
        }
        let identity = self.manager.identity().map(str::to_string);
        self.attached = false;
        self.manager.close().await;
        info!(identity = ?identity, "Status aggregator detached");
        self.sink.emit(&TrackerEvent::Detached { identity });
        self.publish();
    }

    /// Detaches and publishes an empty snapshot, for when the identity
    /// goes away.
    pub async fn clear_identity(&mut self) {
        self.detach().await;
        self.state.clear();
        self.connection_error = None;
        self.touch();
        self.publish();
    }

    /// Applies every event already delivered, in order.
    ///
    /// Returns how many events were taken off the queue.
    pub fn process_pending(&mut self) -> usize {
        let mut processed = 0;
        while self.attached {
            let Some(event) = self.manager.try_next_event() else {
                break;
            };
            self.handle(event);
            processed += 1;
        }
        processed
    }

    /// Waits for the next event and applies it.
    ///
    /// Returns `false` without waiting when detached, or once the feed has
    /// ended. Cancel safe.
    pub async fn process_next(&mut self) -> bool {
        if !self.attached {
            return false;
        }
        match self.manager.next_event().await {
            Some(event) => {
                self.handle(event);
                true
            }
            None => false,
        }
    }

    /// Applies one connection event. Returns whether the snapshot changed.
    pub fn handle(&mut self, event: ConnectionEvent) -> bool {
        if !self.attached {
            debug!("Ignoring event delivered after detach");
            return false;
        }
        match event {
            ConnectionEvent::Connected => {
                self.connection_error = None;
                self.sink.emit(&TrackerEvent::Connected {
                    identity: self.manager.identity().map(str::to_string),
                });
            }
            ConnectionEvent::Error(message) => {
                self.record_connection_error(message);
                return true;
            }
            ConnectionEvent::Message(body) => match StageEvent::decode(&body) {
                Ok(event) => {
                    let previous = self.state.apply(&event);
                    debug!(stage = %event.stage_name, state = %event.state, "Stage updated");
                    self.sink.emit(&TrackerEvent::StageUpdated {
                        stage: event.stage_name,
                        state: event.state,
                        previous,
                    });
                }
                Err(rejection) => {
                    debug!(reason = %rejection, "Dropping malformed stage event");
                    self.sink.emit(&TrackerEvent::EventDropped {
                        reason: rejection.to_string(),
                    });
                    return false;
                }
            },
        }
        self.touch();
        self.publish();
        true
    }

    fn record_connection_error(&mut self, message: String) {
        self.sink.emit(&TrackerEvent::ConnectionErrored {
            message: message.clone(),
        });
        self.connection_error = Some(message);
        self.touch();
        self.publish();
    }

    fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }

    fn publish(&self) {
        self.snapshots.send_replace(StatusSnapshot {
            per_stage: self.state.clone(),
            connection_error: self.connection_error.clone(),
            connection_state: self.manager.state(),
            updated_at: self.updated_at,
        });
    }
}

impl std::fmt::Debug for StatusAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusAggregator")
            .field("manager", &self.manager)
            .field("state", &self.state)
            .field("connection_error", &self.connection_error)
            .field("reset_token", &self.reset_token)
            .field("attached", &self.attached)
            .finish_non_exhaustive()
    }
}
