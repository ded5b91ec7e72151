//! Read-only views handed to the presentation layer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use super::state::AggregateState;
use crate::core::{ConnectionState, LifecycleState, StepCatalog};

/// An opaque value whose change starts a fresh tracking session.
///
/// Callers typically bump it each time a new generation request is
/// submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct ResetToken(pub u64);

impl ResetToken {
    /// Returns the following token.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl From<u64> for ResetToken {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ResetToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The current state of one tracking session.
///
/// `connection_error` is kept apart from stage failures so a view can tell
/// "the pipeline failed" from "the live feed was lost".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Latest state per stage.
    pub per_stage: AggregateState,
    /// The latest transport error, if the feed is currently impaired.
    pub connection_error: Option<String>,
    /// The connection state when the snapshot was taken.
    pub connection_state: ConnectionState,
    /// When the snapshot last changed.
    pub updated_at: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    /// Returns the state of a stage.
    #[must_use]
    pub fn state_of(&self, stage: &str) -> Option<LifecycleState> {
        self.per_stage.get(stage)
    }

    /// Whether no stage event has been seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.per_stage.is_empty()
    }

    /// Number of stages in `SUCCESS`.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.per_stage.completed_count()
    }

    /// Whether any stage is `FAILED`.
    #[must_use]
    pub fn any_failed(&self) -> bool {
        self.per_stage.any_failed()
    }

    /// Whether any stage is `STARTED`.
    #[must_use]
    pub fn any_started(&self) -> bool {
        self.per_stage.any_started()
    }

    /// Whether every catalog step reached `SUCCESS`.
    #[must_use]
    pub fn all_complete(&self, catalog: &StepCatalog) -> bool {
        self.per_stage.all_complete(catalog)
    }

    /// Whether the live feed currently reports a problem.
    #[must_use]
    pub fn has_connection_error(&self) -> bool {
        self.connection_error.is_some()
    }
}
