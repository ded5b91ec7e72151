//! A background task that owns a [`StatusAggregator`].
//!
//! The task applies commands from any number of [`TrackerHandle`]s and
//! events from the transport one at a time, so the aggregator never needs
//! a lock. Snapshots reach readers through a `watch` channel.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::aggregator::{ResetToken, StatusAggregator, StatusSnapshot};
use crate::errors::{Result, StatusError};

const COMMAND_BUFFER: usize = 32;

enum Command {
    Attach {
        identity: String,
        reset: Option<ResetToken>,
        reply: oneshot::Sender<Result<()>>,
    },
    Reset {
        token: ResetToken,
        reply: oneshot::Sender<bool>,
    },
    ClearIdentity {
        reply: oneshot::Sender<()>,
    },
    Detach {
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Spawns status tracking tasks.
pub struct StatusTracker;

impl StatusTracker {
    /// Moves `aggregator` into a new task and returns a handle to it.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(aggregator: StatusAggregator) -> TrackerHandle {
        let tracker_id = Uuid::new_v4();
        let snapshots = aggregator.subscribe();
        let (commands, inbox) = mpsc::channel(COMMAND_BUFFER);

        let span = tracing::info_span!("status_tracker", tracker_id = %tracker_id);
        let task = tokio::spawn(run(aggregator, inbox).instrument(span));
        debug!(tracker_id = %tracker_id, "Status tracker spawned");

        TrackerHandle {
            tracker_id,
            commands,
            snapshots,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }
}

async fn run(mut aggregator: StatusAggregator, mut inbox: mpsc::Receiver<Command>) {
    loop {
        tokio::select! {
            biased;
            command = inbox.recv() => {
                let Some(command) = command else {
                    debug!("All tracker handles dropped");
                    aggregator.detach().await;
                    break;
                };
                if !execute(&mut aggregator, command).await {
                    break;
                }
            }
            _ = aggregator.process_next(), if aggregator.is_listening() => {}
        }
    }
    info!("Status tracker stopped");
}

/// Applies one command. Returns `false` when the task should stop.
async fn execute(aggregator: &mut StatusAggregator, command: Command) -> bool {
    match command {
        Command::Attach {
            identity,
            reset,
            reply,
        } => {
            let result = aggregator.attach(&identity, reset).await;
            if let Err(ref e) = result {
                warn!(identity = %identity, error = %e, "Attach failed");
            }
            let _ = reply.send(result);
        }
        Command::Reset { token, reply } => {
            let _ = reply.send(aggregator.reset(token));
        }
        Command::ClearIdentity { reply } => {
            aggregator.clear_identity().await;
            let _ = reply.send(());
        }
        Command::Detach { reply } => {
            aggregator.detach().await;
            let _ = reply.send(());
        }
        Command::Shutdown { reply } => {
            aggregator.detach().await;
            let _ = reply.send(());
            return false;
        }
    }
    true
}

/// A cloneable handle to a running tracker.
///
/// Every method fails with [`StatusError::TrackerClosed`] once the task
/// has stopped. The task stops after `shutdown`, or when the last handle
/// is dropped.
#[derive(Clone)]
pub struct TrackerHandle {
    tracker_id: Uuid,
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<StatusSnapshot>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl TrackerHandle {
    /// Returns the id used to tag this tracker's log lines.
    #[must_use]
    pub fn tracker_id(&self) -> Uuid {
        self.tracker_id
    }

    /// Starts or continues tracking `identity`. See [`StatusAggregator::attach`].
    pub async fn attach(&self, identity: impl Into<String>, reset: Option<ResetToken>) -> Result<()> {
        let identity = identity.into();
        self.request(|reply| Command::Attach {
            identity,
            reset,
            reply,
        })
        .await?
    }

    /// Applies the caller's current inputs.
    ///
    /// `Some` attaches to the identity; `None` clears the tracked identity
    /// and its snapshot.
    pub async fn set_identity(&self, identity: Option<String>, reset: Option<ResetToken>) -> Result<()> {
        match identity {
            Some(identity) => self.attach(identity, reset).await,
            None => self.clear_identity().await,
        }
    }

    /// Starts a fresh session if `token` changed. Returns whether it did.
    pub async fn reset(&self, token: ResetToken) -> Result<bool> {
        self.request(|reply| Command::Reset { token, reply }).await
    }

    /// Detaches and empties the snapshot.
    pub async fn clear_identity(&self) -> Result<()> {
        self.request(|reply| Command::ClearIdentity { reply }).await
    }

    /// Detaches, keeping the last snapshot visible.
    pub async fn detach(&self) -> Result<()> {
        self.request(|reply| Command::Detach { reply }).await
    }

    /// Returns a receiver that sees every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.snapshots.clone()
    }

    /// Returns the latest snapshot.
    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Returns true while the task accepts commands.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Detaches and waits for the task to finish.
    ///
    /// Calling it again, from any clone, is a no-op.
    pub async fn shutdown(&self) -> Result<()> {
        let stopped = self.request(|reply| Command::Shutdown { reply }).await;
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(tracker_id = %self.tracker_id, error = %e, "Status tracker task failed");
            }
        }
        match stopped {
            Ok(()) | Err(StatusError::TrackerClosed) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| StatusError::TrackerClosed)?;
        response.await.map_err(|_| StatusError::TrackerClosed)
    }
}

impl std::fmt::Debug for TrackerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerHandle")
            .field("tracker_id", &self.tracker_id)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::core::{ConnectionState, LifecycleState, StageEvent, StepCatalog};
    use crate::testing::{stages_of, successful_run, wait_for_snapshot, FakeTransport};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);

    fn spawn(fake: &Arc<FakeTransport>) -> TrackerHandle {
        StatusTracker::spawn(StatusAggregator::with_transport(
            fake.clone(),
            &TrackerConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_events_reach_watchers() {
        let fake = FakeTransport::new();
        let handle = spawn(&fake);
        let mut watcher = handle.subscribe();

        handle.attach("user-1", None).await.unwrap();
        fake.connect();
        fake.deliver(&StageEvent::started("stageA"));
        fake.deliver(&StageEvent::started("stageB"));
        fake.deliver(&StageEvent::success("stageA"));

        let snapshot = wait_for_snapshot(&mut watcher, WAIT, |s| s.completed_count() == 1)
            .await
            .unwrap();
        assert_eq!(
            stages_of(&snapshot),
            vec![
                ("stageA".to_string(), LifecycleState::Success),
                ("stageB".to_string(), LifecycleState::Started),
            ]
        );
        assert_eq!(snapshot.connection_state, ConnectionState::Connected);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_full_run_completes() {
        let fake = FakeTransport::new();
        let handle = spawn(&fake);
        let mut watcher = handle.subscribe();
        handle.attach("user-1", Some(ResetToken(1))).await.unwrap();
        for event in successful_run() {
            fake.deliver(&event);
        }

        let catalog = StepCatalog::resume_pipeline();
        let snapshot = wait_for_snapshot(&mut watcher, WAIT, |s| s.all_complete(&catalog)).await;
        assert!(snapshot.is_some());
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_reset_through_handle() {
        let fake = FakeTransport::new();
        let handle = spawn(&fake);
        let mut watcher = handle.subscribe();
        handle.attach("user-1", Some(ResetToken(1))).await.unwrap();
        fake.deliver(&StageEvent::success("stageA"));
        wait_for_snapshot(&mut watcher, WAIT, |s| !s.is_empty()).await.unwrap();

        assert!(handle.reset(ResetToken(2)).await.unwrap());
        assert!(!handle.reset(ResetToken(2)).await.unwrap());

        assert!(handle.snapshot().is_empty());
        assert_eq!(fake.open_count(), 1);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_set_identity_none_clears() {
        let fake = FakeTransport::new();
        let handle = spawn(&fake);
        let mut watcher = handle.subscribe();
        handle.set_identity(Some("user-1".to_string()), None).await.unwrap();
        fake.deliver(&StageEvent::started("stageA"));
        wait_for_snapshot(&mut watcher, WAIT, |s| !s.is_empty()).await.unwrap();

        handle.set_identity(None, None).await.unwrap();

        let snapshot = handle.snapshot();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.connection_state, ConnectionState::Disconnected);
        assert!(!fake.is_open());
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_detach_freezes_snapshot() {
        let fake = FakeTransport::new();
        let handle = spawn(&fake);
        let mut watcher = handle.subscribe();
        handle.attach("user-1", None).await.unwrap();
        fake.deliver(&StageEvent::started("stageA"));
        wait_for_snapshot(&mut watcher, WAIT, |s| !s.is_empty()).await.unwrap();

        handle.detach().await.unwrap();
        handle.detach().await.unwrap();
        assert!(!fake.deliver(&StageEvent::success("stageA")));

        assert_eq!(handle.snapshot().state_of("stageA"), Some(LifecycleState::Started));
        assert_eq!(fake.close_count(), 1);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_attach_error_is_returned() {
        let fake = FakeTransport::new();
        let handle = spawn(&fake);

        let err = handle.attach("a/b", None).await.unwrap_err();
        assert!(matches!(err, StatusError::InvalidIdentity(_)));
        assert!(handle.is_running());
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_commands_after_shutdown_fail() {
        let fake = FakeTransport::new();
        let handle = spawn(&fake);
        let other = handle.clone();
        handle.attach("user-1", None).await.unwrap();

        handle.shutdown().await.unwrap();
        other.shutdown().await.unwrap();

        assert!(!fake.is_open());
        assert!(!other.is_running());
        assert!(matches!(
            other.attach("user-1", None).await,
            Err(StatusError::TrackerClosed)
        ));
        assert!(matches!(
            other.reset(ResetToken(1)).await,
            Err(StatusError::TrackerClosed)
        ));
    }

    #[tokio::test]
    async fn test_dropping_handles_detaches() {
        let fake = FakeTransport::new();
        let handle = spawn(&fake);
        let mut watcher = handle.subscribe();
        handle.attach("user-1", None).await.unwrap();
        drop(handle);

        let closed = wait_for_snapshot(&mut watcher, WAIT, |s| {
            s.connection_state == ConnectionState::Disconnected
        })
        .await;
        assert!(closed.is_some());
        assert_eq!(fake.close_count(), 1);
    }

    #[tokio::test]
    async fn test_connection_error_reaches_watchers() {
        let fake = FakeTransport::new();
        let handle = spawn(&fake);
        let mut watcher = handle.subscribe();
        handle.attach("user-1", None).await.unwrap();

        fake.fail("WebSocket connection failed.");

        let snapshot = wait_for_snapshot(&mut watcher, WAIT, |s| s.has_connection_error())
            .await
            .unwrap();
        assert_eq!(
            snapshot.connection_error.as_deref(),
            Some("WebSocket connection failed.")
        );
        assert!(snapshot.is_empty());
        handle.shutdown().await.unwrap();
    }
}
