//! Event sink system for observability.
//!
//! The aggregator reports what it does as [`TrackerEvent`]s. Sinks decide
//! what to do with them; the default discards everything.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, TrackerEvent};
