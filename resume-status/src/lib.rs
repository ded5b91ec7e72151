//! # resume-status
//!
//! Live status tracking for the resume generation pipeline.
//!
//! The backend runs a fixed sequence of agents for every generation request
//! and publishes `{agentName, status}` messages on a per-user topic. This
//! crate subscribes to that topic and keeps the latest state of each stage:
//!
//! - **Transport**: a STOMP-over-WebSocket client with fixed-delay reconnects
//! - **Connection management**: one subscription per user identity
//! - **Aggregation**: last-write-wins state per stage, reset tokens, and
//!   connection errors kept apart from stage failures
//! - **Tracker task**: an actor that owns the aggregator and publishes
//!   snapshots on a `watch` channel
//! - **Progress**: headline, percentage and per-step badges for a view
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use resume_status::prelude::*;
//!
//! let config = TrackerConfig::from_env()?;
//! let transport = Arc::new(StompTransport::new(config.clone()));
//! let tracker = StatusTracker::spawn(StatusAggregator::with_transport(transport, &config));
//!
//! tracker.attach("user-42", Some(ResetToken(1))).await?;
//! let mut snapshots = tracker.subscribe();
//! while snapshots.changed().await.is_ok() {
//!     let summary = ProgressSummary::derive(
//!         &StepCatalog::resume_pipeline(),
//!         &snapshots.borrow_and_update(),
//!         true,
//!     );
//!     println!("{} ({}%)", summary.headline, summary.progress_percent);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod aggregator;
pub mod cancellation;
pub mod config;
pub mod connection;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod progress;
pub mod testing;
pub mod tracker;
pub mod transport;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::aggregator::{AggregateState, ResetToken, StatusAggregator, StatusSnapshot};
    pub use crate::config::TrackerConfig;
    pub use crate::connection::{ConnectionEvent, ConnectionManager};
    pub use crate::core::{
        ConnectionState, LifecycleState, PipelineStep, StageEvent, StepCatalog,
    };
    pub use crate::errors::{InvalidIdentityError, Result, StatusError, TransportError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::progress::{ProgressSummary, StepBadge};
    pub use crate::tracker::{StatusTracker, TrackerHandle};
    pub use crate::transport::{Transport, TransportEvent};
    #[cfg(feature = "stomp")]
    pub use crate::transport::StompTransport;
}
