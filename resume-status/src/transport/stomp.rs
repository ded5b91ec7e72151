//! STOMP over WebSocket transport with fixed-delay reconnects.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use super::frame::{StompCommand, StompFrame};
use super::{
    Transport, TransportEvent, TransportSender, BROKER_ERROR_FALLBACK, SOCKET_FAILED_MESSAGE,
};
use crate::cancellation::CancellationToken;
use crate::config::TrackerConfig;
use crate::errors::TransportError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SUBSCRIPTION_ID: &str = "sub-0";

/// A [`Transport`] speaking STOMP 1.2 over a raw WebSocket.
///
/// Each `open` spawns one background task that connects, subscribes and
/// forwards frames. After any failure it waits the configured reconnect
/// delay and tries again until `close` is called.
pub struct StompTransport {
    config: TrackerConfig,
    session: Mutex<Option<Session>>,
}

struct Session {
    token: Arc<CancellationToken>,
    handle: JoinHandle<()>,
}

impl StompTransport {
    /// Creates a transport for the configured endpoint.
    #[must_use]
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
        }
    }

    /// Returns the transport configuration.
    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Returns true while a background session task is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|session| !session.handle.is_finished())
    }

    fn parse_endpoint(&self) -> Result<Url, TransportError> {
        let raw = &self.config.endpoint_url;
        let url = Url::parse(raw).map_err(|e| TransportError::invalid_endpoint(raw, e.to_string()))?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(TransportError::invalid_endpoint(
                raw,
                format!("unsupported scheme '{other}'"),
            )),
        }
    }
}

#[async_trait]
impl Transport for StompTransport {
    async fn open(&self, destination: &str, events: TransportSender) -> Result<(), TransportError> {
        let url = self.parse_endpoint()?;
        self.close().await;

        let token = Arc::new(CancellationToken::new());
        let worker = SessionWorker {
            url,
            destination: destination.to_string(),
            events,
            token: token.clone(),
            reconnect_delay: self.config.reconnect_delay(),
            reconnect_jitter: self.config.reconnect_jitter(),
            connect_timeout: self.config.connect_timeout(),
        };
        info!(
            endpoint = %self.config.endpoint_url,
            destination = %destination,
            "Opening STOMP session"
        );
        let handle = tokio::spawn(worker.run());
        *self.session.lock() = Some(Session { token, handle });
        Ok(())
    }

    async fn close(&self) {
        let session = self.session.lock().take();
        if let Some(session) = session {
            session.token.cancel("transport closed");
            if let Err(e) = session.handle.await {
                warn!(error = %e, "STOMP session task ended abnormally");
            }
        }
    }
}

/// How one connection attempt ended.
enum SessionEnd {
    /// `close` was requested.
    Cancelled,
    /// Nobody is listening for events any more.
    ReceiverGone,
    /// The connection failed or ended; reconnect after the delay.
    Retry,
}

struct SessionWorker {
    url: Url,
    destination: String,
    events: TransportSender,
    token: Arc<CancellationToken>,
    reconnect_delay: Duration,
    reconnect_jitter: Duration,
    connect_timeout: Duration,
}

impl SessionWorker {
    async fn run(self) {
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            match self.connect_once(attempt).await {
                SessionEnd::Cancelled | SessionEnd::ReceiverGone => break,
                SessionEnd::Retry => {}
            }

            let delay = self.next_delay();
            let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            debug!(attempt, delay_ms, "Reconnecting after delay");
            tokio::select! {
                () = self.token.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }
        debug!(
            destination = %self.destination,
            reason = self.token.reason().as_deref().unwrap_or("receiver dropped"),
            "STOMP session stopped"
        );
    }

    fn next_delay(&self) -> Duration {
        let jitter_ms = u64::try_from(self.reconnect_jitter.as_millis()).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            return self.reconnect_delay;
        }
        let extra = rand::thread_rng().gen_range(0..=jitter_ms);
        self.reconnect_delay + Duration::from_millis(extra)
    }

    fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).is_ok()
    }

    async fn connect_once(&self, attempt: u64) -> SessionEnd {
        let handshake = tokio::time::timeout(self.connect_timeout, self.handshake());
        let result = tokio::select! {
            () = self.token.cancelled() => return SessionEnd::Cancelled,
            result = handshake => result,
        };
        let ws = match result {
            Ok(Ok(ws)) => ws,
            Ok(Err(message)) => {
                return if self.emit(TransportEvent::Error(message)) {
                    SessionEnd::Retry
                } else {
                    SessionEnd::ReceiverGone
                };
            }
            Err(_) => {
                warn!(attempt, url = %self.url, "STOMP handshake timed out");
                return if self.emit(TransportEvent::Error(SOCKET_FAILED_MESSAGE.to_string())) {
                    SessionEnd::Retry
                } else {
                    SessionEnd::ReceiverGone
                };
            }
        };

        info!(attempt, destination = %self.destination, "STOMP subscription active");
        if !self.emit(TransportEvent::Connected) {
            return SessionEnd::ReceiverGone;
        }
        self.pump(ws).await
    }

    /// Connects the socket, performs the STOMP handshake and subscribes.
    async fn handshake(&self) -> Result<WsStream, String> {
        let (mut ws, _) = connect_async(self.url.as_str()).await.map_err(|e| {
            warn!(url = %self.url, error = %e, "WebSocket connect failed");
            SOCKET_FAILED_MESSAGE.to_string()
        })?;

        let host = self.url.host_str().unwrap_or("localhost");
        send_frame(&mut ws, &StompFrame::connect(host)).await?;

        loop {
            let Some(next) = ws.next().await else {
                return Err(SOCKET_FAILED_MESSAGE.to_string());
            };
            let text = match next {
                Ok(message) => match message_text(message) {
                    Some(text) => text,
                    None => continue,
                },
                Err(e) => {
                    warn!(error = %e, "WebSocket error during STOMP handshake");
                    return Err(SOCKET_FAILED_MESSAGE.to_string());
                }
            };
            match StompFrame::decode(&text) {
                Ok(Some(frame)) if frame.command == StompCommand::Connected => break,
                Ok(Some(frame)) if frame.command == StompCommand::Error => {
                    return Err(broker_error_message(&frame));
                }
                Ok(Some(frame)) => {
                    debug!(command = %frame.command, "Ignoring frame before CONNECTED");
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "Undecodable frame during STOMP handshake");
                    return Err(BROKER_ERROR_FALLBACK.to_string());
                }
            }
        }

        send_frame(&mut ws, &StompFrame::subscribe(SUBSCRIPTION_ID, &self.destination)).await?;
        Ok(ws)
    }

    async fn pump(&self, mut ws: WsStream) -> SessionEnd {
        loop {
            let next = tokio::select! {
                () = self.token.cancelled() => {
                    self.shutdown(&mut ws).await;
                    return SessionEnd::Cancelled;
                }
                next = ws.next() => next,
            };

            let event = match next {
                None => TransportEvent::Disconnected,
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket read failed");
                    if !self.emit(TransportEvent::Error(SOCKET_FAILED_MESSAGE.to_string())) {
                        return SessionEnd::ReceiverGone;
                    }
                    TransportEvent::Disconnected
                }
                Some(Ok(Message::Close(_))) => TransportEvent::Disconnected,
                Some(Ok(message)) => {
                    let Some(text) = message_text(message) else {
                        continue;
                    };
                    match self.handle_frame(&text) {
                        Some(event) => event,
                        None => continue,
                    }
                }
            };

            let disconnected = event == TransportEvent::Disconnected;
            if !self.emit(event) {
                return SessionEnd::ReceiverGone;
            }
            if disconnected {
                return SessionEnd::Retry;
            }
        }
    }

    fn handle_frame(&self, text: &str) -> Option<TransportEvent> {
        match StompFrame::decode(text) {
            Ok(Some(frame)) => match frame.command {
                StompCommand::Message => {
                    let subscription = frame.get_header("subscription");
                    if subscription.is_some_and(|id| id != SUBSCRIPTION_ID) {
                        debug!(subscription = ?subscription, "Ignoring message for another subscription");
                        return None;
                    }
                    Some(TransportEvent::Message(frame.body))
                }
                StompCommand::Error => {
                    let message = broker_error_message(&frame);
                    warn!(error = %message, "STOMP broker reported an error");
                    Some(TransportEvent::Error(message))
                }
                other => {
                    debug!(command = %other, "Ignoring STOMP frame");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                debug!(error = %e, "Dropping undecodable STOMP frame");
                None
            }
        }
    }

    async fn shutdown(&self, ws: &mut WsStream) {
        for frame in [StompFrame::unsubscribe(SUBSCRIPTION_ID), StompFrame::disconnect()] {
            if send_frame(ws, &frame).await.is_err() {
                break;
            }
        }
        if let Err(e) = ws.close(None).await {
            debug!(error = %e, "WebSocket close failed");
        }
    }
}

async fn send_frame(ws: &mut WsStream, frame: &StompFrame) -> Result<(), String> {
    ws.send(Message::Text(frame.encode())).await.map_err(|e| {
        warn!(command = %frame.command, error = %e, "Failed to send STOMP frame");
        SOCKET_FAILED_MESSAGE.to_string()
    })
}

fn message_text(message: Message) -> Option<String> {
    match message {
        Message::Text(text) => Some(text),
        Message::Binary(bytes) => String::from_utf8(bytes).ok(),
        _ => None,
    }
}

/// Picks the human readable text of an ERROR frame.
fn broker_error_message(frame: &StompFrame) -> String {
    frame
        .get_header("message")
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
        .or_else(|| Some(frame.body.clone()).filter(|b| !b.trim().is_empty()))
        .unwrap_or_else(|| BROKER_ERROR_FALLBACK.to_string())
}
