//! Status aggregation.
//!
//! [`StatusAggregator`] folds the events of one identity's channel into a
//! [`StatusSnapshot`]: the latest [`LifecycleState`](crate::core::LifecycleState)
//! per stage plus the current connection error.

#[allow(clippy::module_inception)]
mod aggregator;
mod snapshot;
mod state;

pub use aggregator::StatusAggregator;
pub use snapshot::{ResetToken, StatusSnapshot};
pub use state::AggregateState;
