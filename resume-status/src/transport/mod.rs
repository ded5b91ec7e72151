//! Publish/subscribe transports.
//!
//! A transport opens one connection, subscribes to one destination and
//! reports everything that happens on it as [`TransportEvent`]s pushed into
//! a channel owned by the caller. Reconnect policy, if any, lives entirely
//! inside the transport.

mod frame;
#[cfg(feature = "stomp")]
mod stomp;

pub use frame::{StompCommand, StompFrame};
#[cfg(feature = "stomp")]
pub use stomp::StompTransport;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::TransportError;

/// Error text for a socket-level failure.
pub const SOCKET_FAILED_MESSAGE: &str = "WebSocket connection failed.";
/// Error text for a broker error frame that carries no message.
pub const BROKER_ERROR_FALLBACK: &str = "WebSocket error while receiving resume status.";
/// Error text for a connection that ended without being closed by us.
pub const UNEXPECTED_CLOSE_MESSAGE: &str = "WebSocket connection closed unexpectedly.";

/// Something that happened on a transport connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is up and the subscription is active.
    Connected,
    /// A message body arrived on the subscribed destination.
    Message(String),
    /// A transport-level failure, as human readable text.
    Error(String),
    /// The connection ended.
    Disconnected,
}

/// Sending half handed to a transport when it is opened.
pub type TransportSender = mpsc::UnboundedSender<TransportEvent>;
/// Receiving half kept by the connection manager.
pub type TransportReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Creates a transport event channel.
#[must_use]
pub fn event_channel() -> (TransportSender, TransportReceiver) {
    mpsc::unbounded_channel()
}

/// A publish/subscribe connection.
///
/// Implementations must tolerate `close` without a prior `open` and
/// repeated `close` calls. Events sent after the receiver is dropped are
/// simply lost.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens a connection and subscribes to `destination`.
    ///
    /// Returns once the connection attempt is underway; progress is reported
    /// through `events`.
    async fn open(&self, destination: &str, events: TransportSender) -> Result<(), TransportError>;

    /// Closes the connection and releases the subscription.
    async fn close(&self);
}
