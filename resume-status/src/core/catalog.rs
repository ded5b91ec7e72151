//! The ordered set of pipeline steps known to the presentation layer.

use serde::{Deserialize, Serialize};

/// One named step of the generation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStep {
    /// The stage name carried in `agentName`.
    pub key: String,
    /// A short human readable label.
    pub label: String,
}

impl PipelineStep {
    /// Creates a new pipeline step.
    #[must_use]
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }
}

/// An ordered catalog of pipeline steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCatalog {
    steps: Vec<PipelineStep>,
}

impl Default for StepCatalog {
    fn default() -> Self {
        Self::resume_pipeline()
    }
}

impl StepCatalog {
    /// Creates a catalog from steps in pipeline order.
    #[must_use]
    pub fn new(steps: Vec<PipelineStep>) -> Self {
        Self { steps }
    }

    /// The four agents of the resume generation pipeline.
    #[must_use]
    pub fn resume_pipeline() -> Self {
        Self::new(vec![
            PipelineStep::new("JobDescriptionAnalyzerAgent", "Analyze job description"),
            PipelineStep::new("MatchingAgent", "Match with master resume"),
            PipelineStep::new("ResumeRewriteAgent", "Rewrite resume"),
            PipelineStep::new("ATSOptimizationAgent", "Optimize for ATS"),
        ])
    }

    /// Returns the steps in order.
    #[must_use]
    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the catalog has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Looks up a step by stage name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PipelineStep> {
        self.steps.iter().find(|step| step.key == key)
    }

    /// Returns true if the stage name belongs to the catalog.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterates over the steps in order.
    pub fn iter(&self) -> impl Iterator<Item = &PipelineStep> {
        self.steps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_pipeline_order() {
        let catalog = StepCatalog::resume_pipeline();
        let keys: Vec<_> = catalog.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "JobDescriptionAnalyzerAgent",
                "MatchingAgent",
                "ResumeRewriteAgent",
                "ATSOptimizationAgent"
            ]
        );
    }

    #[test]
    fn test_lookup() {
        let catalog = StepCatalog::default();
        assert_eq!(catalog.get("MatchingAgent").map(|s| s.label.as_str()), Some("Match with master resume"));
        assert!(!catalog.contains("UnknownAgent"));
        assert_eq!(catalog.len(), 4);
    }

    #[test]
    fn test_custom_catalog() {
        let catalog = StepCatalog::new(vec![PipelineStep::new("a", "A")]);
        assert_eq!(catalog.len(), 1);
        assert!(!catalog.is_empty());
        assert!(StepCatalog::new(Vec::new()).is_empty());
    }
}
