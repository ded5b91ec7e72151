//! Connection manager owning one transport connection per identity.

use std::sync::Arc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info, warn};

use super::identity::validate_identity;
use crate::config::TrackerConfig;
use crate::core::ConnectionState;
use crate::errors::Result;
use crate::transport::{
    event_channel, Transport, TransportEvent, TransportReceiver, UNEXPECTED_CLOSE_MESSAGE,
};

/// What the manager hands on to its consumer after applying a transport event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The subscription became live (again).
    Connected,
    /// A raw message body from the identity's channel.
    Message(String),
    /// A transport-level failure.
    Error(String),
}

/// Owns the lifecycle of one transport connection scoped to a user identity.
///
/// State moves `Disconnected → Connecting → Connected`, any open state may
/// move to `Errored` on a failure and back to `Connected` when the
/// transport recovers, and `close` always returns to `Disconnected`.
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    topic_prefix: String,
    state: ConnectionState,
    identity: Option<String>,
    last_error: Option<String>,
    inbox: Option<TransportReceiver>,
}

impl ConnectionManager {
    /// Creates a manager using the configured topic prefix.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: &TrackerConfig) -> Self {
        Self {
            transport,
            topic_prefix: config.topic_prefix.clone(),
            state: ConnectionState::Disconnected,
            identity: None,
            last_error: None,
            inbox: None,
        }
    }

    /// Returns the connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns true while there is an event feed to read from.
    #[must_use]
    pub fn is_receiving(&self) -> bool {
        self.inbox.is_some()
    }

    /// Returns the identity the connection is bound to.
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Returns the latest transport error, cleared on reconnect.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Returns true if a connection is open for `identity`.
    #[must_use]
    pub fn is_open_for(&self, identity: &str) -> bool {
        self.state.is_open() && self.identity.as_deref() == Some(identity)
    }

    /// Builds the channel name for an identity.
    #[must_use]
    pub fn destination_for(&self, identity: &str) -> String {
        format!("{}/{}", self.topic_prefix.trim_end_matches('/'), identity)
    }

    /// Opens a connection bound to `identity`.
    ///
    /// A no-op when already open for the same identity. A connection for a
    /// different identity is closed first.
    pub async fn open(&mut self, identity: &str) -> Result<()> {
        validate_identity(identity)?;
        if self.is_open_for(identity) {
            debug!(identity = %identity, "Connection already open");
            return Ok(());
        }
        if self.state.is_open() {
            self.close().await;
        }

        let destination = self.destination_for(identity);
        let (tx, rx) = event_channel();
        self.state = ConnectionState::Connecting;
        self.identity = Some(identity.to_string());
        self.last_error = None;
        self.inbox = Some(rx);

        info!(identity = %identity, destination = %destination, "Opening status connection");
        if let Err(e) = self.transport.open(&destination, tx).await {
            warn!(identity = %identity, error = %e, "Transport refused to open");
            self.inbox = None;
            self.identity = None;
            self.state = ConnectionState::Disconnected;
            return Err(e.into());
        }
        Ok(())
    }

    /// Closes the connection. Safe to call any number of times.
    pub async fn close(&mut self) {
        if !self.state.is_open() && self.inbox.is_none() {
            return;
        }
        // Drop the receiver first so nothing delivered from here on is seen.
        self.inbox = None;
        self.transport.close().await;
        info!(identity = ?self.identity, "Status connection closed");
        self.state = ConnectionState::Disconnected;
        self.identity = None;
        self.last_error = None;
    }

    /// Waits for the next meaningful event.
    ///
    /// Returns `None` once the connection is closed or the transport has
    /// dropped its sender. Cancel safe.
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        loop {
            let event = self.inbox.as_mut()?.recv().await;
            let Some(event) = event else {
                self.inbox = None;
                return None;
            };
            if let Some(event) = self.apply(event) {
                return Some(event);
            }
        }
    }

    /// Returns the next already-delivered event without waiting.
    pub fn try_next_event(&mut self) -> Option<ConnectionEvent> {
        loop {
            let event = match self.inbox.as_mut()?.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    self.inbox = None;
                    return None;
                }
            };
            if let Some(event) = self.apply(event) {
                return Some(event);
            }
        }
    }

    /// Drops every event delivered but not yet consumed.
    ///
    /// Connection state changes among them are still applied so the state
    /// machine stays in step with the transport.
    pub fn discard_pending(&mut self) -> usize {
        let mut discarded = 0;
        while let Some(inbox) = self.inbox.as_mut() {
            match inbox.try_recv() {
                Ok(TransportEvent::Message(_)) => discarded += 1,
                Ok(other) => {
                    self.apply(other);
                }
                Err(_) => break,
            }
        }
        if discarded > 0 {
            debug!(discarded, "Discarded queued messages");
        }
        discarded
    }

    fn apply(&mut self, event: TransportEvent) -> Option<ConnectionEvent> {
        match event {
            TransportEvent::Connected => {
                if self.state != ConnectionState::Connected {
                    info!(identity = ?self.identity, "Status connection established");
                }
                self.state = ConnectionState::Connected;
                self.last_error = None;
                Some(ConnectionEvent::Connected)
            }
            TransportEvent::Message(body) => Some(ConnectionEvent::Message(body)),
            TransportEvent::Error(message) => {
                warn!(identity = ?self.identity, error = %message, "Status connection error");
                self.state = ConnectionState::Errored;
                self.last_error = Some(message.clone());
                Some(ConnectionEvent::Error(message))
            }
            TransportEvent::Disconnected => {
                if self.state == ConnectionState::Errored {
                    // The failure that caused this was already reported.
                    return None;
                }
                warn!(identity = ?self.identity, "Status connection dropped");
                self.state = ConnectionState::Errored;
                self.last_error = Some(UNEXPECTED_CLOSE_MESSAGE.to_string());
                Some(ConnectionEvent::Error(UNEXPECTED_CLOSE_MESSAGE.to_string()))
            }
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if self.state.is_open() {
            warn!(identity = ?self.identity, "ConnectionManager dropped without close");
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state)
            .field("identity", &self.identity)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}
