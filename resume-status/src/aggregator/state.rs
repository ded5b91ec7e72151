//! Per-stage aggregate state.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::core::{LifecycleState, StageEvent, StepCatalog};

/// Latest known lifecycle state per stage.
///
/// Later events for a stage overwrite earlier ones. Stages keep the
/// position of their first event so iteration order is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateState {
    stages: Vec<(String, LifecycleState)>,
}

impl AggregateState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an event and returns the state it replaced.
    pub fn apply(&mut self, event: &StageEvent) -> Option<LifecycleState> {
        self.set(&event.stage_name, event.state)
    }

    /// Sets a stage's state and returns the state it replaced.
    pub fn set(&mut self, stage: &str, state: LifecycleState) -> Option<LifecycleState> {
        if let Some(entry) = self.stages.iter_mut().find(|(name, _)| name == stage) {
            return Some(std::mem::replace(&mut entry.1, state));
        }
        self.stages.push((stage.to_string(), state));
        None
    }

    /// Returns the state of a stage.
    #[must_use]
    pub fn get(&self, stage: &str) -> Option<LifecycleState> {
        self.stages
            .iter()
            .find(|(name, _)| name == stage)
            .map(|(_, state)| *state)
    }

    /// Iterates over `(stage, state)` in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, LifecycleState)> {
        self.stages.iter().map(|(name, state)| (name.as_str(), *state))
    }

    /// Returns the number of stages seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if no event has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Forgets every stage.
    pub fn clear(&mut self) {
        self.stages.clear();
    }

    /// Number of stages in `SUCCESS`.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.count(LifecycleState::Success)
    }

    /// Whether any stage is `FAILED`.
    #[must_use]
    pub fn any_failed(&self) -> bool {
        self.count(LifecycleState::Failed) > 0
    }

    /// Whether any stage is `STARTED`.
    #[must_use]
    pub fn any_started(&self) -> bool {
        self.count(LifecycleState::Started) > 0
    }

    /// Whether every step of `catalog` reached `SUCCESS`.
    ///
    /// An empty catalog is never complete.
    #[must_use]
    pub fn all_complete(&self, catalog: &StepCatalog) -> bool {
        !catalog.is_empty()
            && catalog
                .iter()
                .all(|step| self.get(&step.key) == Some(LifecycleState::Success))
    }

    fn count(&self, wanted: LifecycleState) -> usize {
        self.stages.iter().filter(|(_, state)| *state == wanted).count()
    }
}

impl Serialize for AggregateState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.stages.len()))?;
        for (stage, state) in &self.stages {
            map.serialize_entry(stage, state)?;
        }
        map.end()
    }
}
