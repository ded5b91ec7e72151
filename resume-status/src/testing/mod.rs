//! Test support.
//!
//! [`FakeTransport`] stands in for the network so the connection manager,
//! the aggregator and the tracker can be driven deterministically.

mod fake;
mod fixtures;

pub use fake::FakeTransport;
pub use fixtures::{stages_of, successful_run, wait_for_snapshot, RESUME_STAGES};
