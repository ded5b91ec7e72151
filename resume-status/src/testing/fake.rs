//! A deterministic in-memory transport.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::core::StageEvent;
use crate::errors::TransportError;
use crate::transport::{Transport, TransportEvent, TransportSender};

#[derive(Default)]
struct FakeState {
    sender: Option<TransportSender>,
    open: bool,
    destinations: Vec<String>,
    open_count: usize,
    close_count: usize,
    fail_next_open: Option<TransportError>,
}

/// A [`Transport`] driven by the test instead of a network.
///
/// The sender from the most recent `open` is kept after `close`, so a test
/// can simulate a message that was already in flight when the connection
/// was torn down. Every delivery method returns whether a receiver was
/// still there to take it.
#[derive(Default)]
pub struct FakeTransport {
    state: Mutex<FakeState>,
}

impl FakeTransport {
    /// Creates a shared fake transport.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes the next `open` fail with `error`.
    pub fn fail_next_open(&self, error: TransportError) {
        self.state.lock().fail_next_open = Some(error);
    }

    /// Reports the subscription as live.
    pub fn connect(&self) -> bool {
        self.send(TransportEvent::Connected)
    }

    /// Delivers a stage event encoded as the pipeline would.
    pub fn deliver(&self, event: &StageEvent) -> bool {
        self.send(TransportEvent::Message(event.to_json()))
    }

    /// Delivers a raw message body.
    pub fn deliver_raw(&self, body: impl Into<String>) -> bool {
        self.send(TransportEvent::Message(body.into()))
    }

    /// Reports a transport failure.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.send(TransportEvent::Error(message.into()))
    }

    /// Reports the connection as ended.
    pub fn drop_connection(&self) -> bool {
        self.send(TransportEvent::Disconnected)
    }

    /// Returns true between `open` and `close`.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Returns how often `open` succeeded.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.state.lock().open_count
    }

    /// Returns how often `close` was called on an open connection.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.state.lock().close_count
    }

    /// Returns every destination opened, in order.
    #[must_use]
    pub fn destinations(&self) -> Vec<String> {
        self.state.lock().destinations.clone()
    }

    fn send(&self, event: TransportEvent) -> bool {
        let state = self.state.lock();
        state
            .sender
            .as_ref()
            .is_some_and(|sender| sender.send(event).is_ok())
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn open(&self, destination: &str, events: TransportSender) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some(error) = state.fail_next_open.take() {
            return Err(error);
        }
        state.sender = Some(events);
        state.open = true;
        state.open_count += 1;
        state.destinations.push(destination.to_string());
        Ok(())
    }

    async fn close(&self) {
        let mut state = self.state.lock();
        if state.open {
            state.open = false;
            state.close_count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::event_channel;

    #[tokio::test]
    async fn test_delivery_reaches_receiver() {
        let fake = FakeTransport::new();
        let (tx, mut rx) = event_channel();
        fake.open("/topic/resume-status/u1", tx).await.unwrap();

        assert!(fake.deliver(&StageEvent::started("MatchingAgent")));
        assert_eq!(
            rx.recv().await,
            Some(TransportEvent::Message(StageEvent::started("MatchingAgent").to_json()))
        );
    }

    #[tokio::test]
    async fn test_delivery_without_open() {
        let fake = FakeTransport::new();
        assert!(!fake.connect());
    }

    #[tokio::test]
    async fn test_close_counts_once() {
        let fake = FakeTransport::new();
        let (tx, _rx) = event_channel();
        fake.open("/topic/resume-status/u1", tx).await.unwrap();

        fake.close().await;
        fake.close().await;

        assert_eq!(fake.close_count(), 1);
        assert!(!fake.is_open());
    }

    #[tokio::test]
    async fn test_fail_next_open() {
        let fake = FakeTransport::new();
        fake.fail_next_open(TransportError::Closed);
        let (tx, _rx) = event_channel();

        assert_eq!(fake.open("/t/u1", tx.clone()).await, Err(TransportError::Closed));
        assert!(fake.open("/t/u1", tx).await.is_ok());
        assert_eq!(fake.open_count(), 1);
    }
}
