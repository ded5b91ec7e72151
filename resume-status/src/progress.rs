//! Presentation data derived from a snapshot.
//!
//! Nothing here touches the network or holds state: a [`ProgressSummary`]
//! is recomputed from `(catalog, snapshot, is_active)` whenever the
//! snapshot changes.

use serde::Serialize;
use std::fmt;

use crate::aggregator::StatusSnapshot;
use crate::core::{LifecycleState, PipelineStep, StepCatalog};

const INTERRUPTED_MESSAGE: &str =
    "Something interrupted the AI pipeline. Try regenerating after adjusting your input.";

/// The badge shown next to a pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StepBadge {
    /// The step succeeded.
    Done,
    /// The step failed.
    Failed,
    /// The step is running.
    Running,
    /// The run is underway but this step has not started.
    Queued,
    /// Nothing is known about the run yet.
    Waiting,
}

impl StepBadge {
    /// Returns the badge text.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Done => "Done",
            Self::Failed => "Failed",
            Self::Running => "Running",
            Self::Queued => "Queued",
            Self::Waiting => "Waiting",
        }
    }

    fn for_state(state: Option<LifecycleState>, run_known: bool) -> Self {
        match state {
            Some(LifecycleState::Success) => Self::Done,
            Some(LifecycleState::Failed) => Self::Failed,
            Some(LifecycleState::Started) => Self::Running,
            None if run_known => Self::Queued,
            None => Self::Waiting,
        }
    }
}

impl fmt::Display for StepBadge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of the step list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepProgress {
    /// 1-based position in the pipeline.
    pub position: usize,
    /// The stage name.
    pub key: String,
    /// The human readable label.
    pub label: String,
    /// The latest known state.
    pub state: Option<LifecycleState>,
    /// The badge to show.
    pub badge: StepBadge,
}

/// Everything a progress view needs, derived from one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSummary {
    /// Catalog steps in `SUCCESS`.
    pub completed_steps: usize,
    /// Catalog size.
    pub total_steps: usize,
    /// A catalog step failed or the live feed reports an error.
    pub has_failure: bool,
    /// A catalog step is running.
    pub has_in_progress: bool,
    /// Any stage event has been seen.
    pub has_status: bool,
    /// The run looks underway.
    pub is_running: bool,
    /// Whether anything should be shown at all.
    pub should_render: bool,
    /// The first running step, in catalog order.
    pub current_step: Option<PipelineStep>,
    /// Completion, rounded to a whole percent.
    pub progress_percent: u8,
    /// The title line.
    pub headline: String,
    /// The line under the title.
    pub note: &'static str,
    /// One entry per catalog step.
    pub steps: Vec<StepProgress>,
    /// Shown when `has_failure` is set.
    pub failure_message: Option<String>,
}

impl ProgressSummary {
    /// Derives the summary.
    ///
    /// `is_active` is the caller's own "a request is in flight" flag; it
    /// keeps the view visible before the first event arrives.
    #[must_use]
    pub fn derive(catalog: &StepCatalog, snapshot: &StatusSnapshot, is_active: bool) -> Self {
        let state_of = |step: &PipelineStep| snapshot.state_of(&step.key);
        let count = |wanted: LifecycleState| {
            catalog
                .iter()
                .filter(|&step| state_of(step) == Some(wanted))
                .count()
        };

        let total_steps = catalog.len();
        let completed_steps = count(LifecycleState::Success);
        let has_failure = count(LifecycleState::Failed) > 0 || snapshot.has_connection_error();
        let has_in_progress = count(LifecycleState::Started) > 0;
        let has_status = !snapshot.is_empty();
        let is_running = (is_active
            || has_in_progress
            || (has_status && completed_steps < total_steps))
            && !has_failure;
        let is_complete = has_status && completed_steps == total_steps;

        let current_step = catalog
            .iter()
            .find(|&step| state_of(step) == Some(LifecycleState::Started))
            .cloned();

        let headline = if has_failure {
            "Generation failed".to_string()
        } else if is_complete {
            "Generation complete".to_string()
        } else if let Some(step) = &current_step {
            format!("Working on {}", step.label)
        } else if is_running {
            "Preparing resume generation".to_string()
        } else {
            "Resume generation status".to_string()
        };

        let note = if has_failure {
            "We hit an issue while generating your resume."
        } else if is_complete {
            "All steps finished successfully."
        } else {
            "Live status updates from the AI pipeline."
        };

        let run_known = has_status || is_running;
        let steps = catalog
            .iter()
            .enumerate()
            .map(|(index, step)| {
                let state = state_of(step);
                StepProgress {
                    position: index + 1,
                    key: step.key.clone(),
                    label: step.label.clone(),
                    state,
                    badge: StepBadge::for_state(state, run_known),
                }
            })
            .collect();

        let failure_message = has_failure.then(|| match &snapshot.connection_error {
            Some(message) => format!("Connection error: {message}"),
            None => INTERRUPTED_MESSAGE.to_string(),
        });

        Self {
            completed_steps,
            total_steps,
            has_failure,
            has_in_progress,
            has_status,
            is_running,
            should_render: has_status || is_active,
            current_step,
            progress_percent: percent(completed_steps, total_steps),
            headline,
            note,
            steps,
            failure_message,
        }
    }

    /// Whether every step finished successfully.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.has_failure && self.has_status && self.completed_steps == self.total_steps
    }
}

/// Rounds half up, like the progress bar always has.
fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let rounded = (completed.min(total) * 200 + total) / (2 * total);
    u8::try_from(rounded).unwrap_or(100)
}
