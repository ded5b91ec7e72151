//! Fixtures shared by tests.

use std::time::Duration;
use tokio::sync::watch;

use crate::aggregator::StatusSnapshot;
use crate::core::{LifecycleState, StageEvent};

/// The stage names of the resume generation pipeline, in run order.
pub const RESUME_STAGES: [&str; 4] = [
    "JobDescriptionAnalyzerAgent",
    "MatchingAgent",
    "ResumeRewriteAgent",
    "ATSOptimizationAgent",
];

/// Returns the stages of a snapshot as owned pairs, in first-seen order.
#[must_use]
pub fn stages_of(snapshot: &StatusSnapshot) -> Vec<(String, LifecycleState)> {
    snapshot
        .per_stage
        .iter()
        .map(|(stage, state)| (stage.to_string(), state))
        .collect()
}

/// The events of a run where every stage succeeds.
#[must_use]
pub fn successful_run() -> Vec<StageEvent> {
    RESUME_STAGES
        .iter()
        .flat_map(|stage| [StageEvent::started(*stage), StageEvent::success(*stage)])
        .collect()
}

/// Waits until a published snapshot satisfies `predicate`.
///
/// Returns the matching snapshot, or `None` after `timeout` or once the
/// publisher is gone.
pub async fn wait_for_snapshot<F>(
    watcher: &mut watch::Receiver<StatusSnapshot>,
    timeout: Duration,
    predicate: F,
) -> Option<StatusSnapshot>
where
    F: FnMut(&StatusSnapshot) -> bool,
{
    tokio::time::timeout(timeout, watcher.wait_for(predicate))
        .await
        .ok()?
        .ok()
        .map(|snapshot| snapshot.clone())
}
