//! Stage status events as they arrive on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::status::LifecycleState;

/// A stage status notification published by the generation pipeline.
///
/// On the wire this is `{"agentName": "...", "status": "STARTED"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEvent {
    /// The pipeline stage the event refers to.
    #[serde(rename = "agentName")]
    pub stage_name: String,

    /// The stage's new lifecycle state.
    #[serde(rename = "status")]
    pub state: LifecycleState,
}

/// Why a payload was not turned into a [`StageEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventRejection {
    /// The payload was not a JSON object with string fields.
    InvalidPayload(String),
    /// `agentName` was missing or blank.
    MissingStageName,
    /// `status` was missing.
    MissingState,
    /// `status` was not one of the known lifecycle states.
    UnknownState(String),
}

impl fmt::Display for EventRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPayload(reason) => write!(f, "invalid payload: {reason}"),
            Self::MissingStageName => write!(f, "missing agentName"),
            Self::MissingState => write!(f, "missing status"),
            Self::UnknownState(state) => write!(f, "unknown status '{state}'"),
        }
    }
}

#[derive(Deserialize)]
struct RawStageEvent {
    #[serde(rename = "agentName")]
    agent_name: Option<String>,
    status: Option<String>,
}

impl StageEvent {
    /// Creates a new stage event.
    #[must_use]
    pub fn new(stage_name: impl Into<String>, state: LifecycleState) -> Self {
        Self {
            stage_name: stage_name.into(),
            state,
        }
    }

    /// Creates a `STARTED` event.
    #[must_use]
    pub fn started(stage_name: impl Into<String>) -> Self {
        Self::new(stage_name, LifecycleState::Started)
    }

    /// Creates a `SUCCESS` event.
    #[must_use]
    pub fn success(stage_name: impl Into<String>) -> Self {
        Self::new(stage_name, LifecycleState::Success)
    }

    /// Creates a `FAILED` event.
    #[must_use]
    pub fn failed(stage_name: impl Into<String>) -> Self {
        Self::new(stage_name, LifecycleState::Failed)
    }

    /// Decodes a JSON text payload.
    ///
    /// Unknown fields are ignored. Anything else that does not describe a
    /// known stage state is rejected rather than partially applied.
    pub fn decode(payload: &str) -> Result<Self, EventRejection> {
        let raw: RawStageEvent = serde_json::from_str(payload)
            .map_err(|e| EventRejection::InvalidPayload(e.to_string()))?;

        let stage_name = raw
            .agent_name
            .filter(|name| !name.trim().is_empty())
            .ok_or(EventRejection::MissingStageName)?;
        let status = raw.status.ok_or(EventRejection::MissingState)?;
        let state = status
            .parse::<LifecycleState>()
            .map_err(|e| EventRejection::UnknownState(e.0))?;

        Ok(Self { stage_name, state })
    }

    /// Encodes the event as the JSON text the pipeline publishes.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "agentName": self.stage_name,
            "status": self.state.as_str(),
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid() {
        let event = StageEvent::decode(r#"{"agentName":"MatchingAgent","status":"STARTED"}"#).unwrap();
        assert_eq!(event, StageEvent::started("MatchingAgent"));
    }

    #[test]
    fn test_decode_ignores_extra_fields() {
        let event = StageEvent::decode(
            r#"{"agentName":"MatchingAgent","status":"SUCCESS","resumeId":"r-1"}"#,
        )
        .unwrap();
        assert_eq!(event.state, LifecycleState::Success);
    }

    #[test]
    fn test_decode_unknown_state() {
        let rejection =
            StageEvent::decode(r#"{"agentName":"MatchingAgent","status":"UNKNOWN"}"#).unwrap_err();
        assert_eq!(rejection, EventRejection::UnknownState("UNKNOWN".to_string()));
    }

    #[test]
    fn test_decode_missing_fields() {
        assert_eq!(
            StageEvent::decode(r#"{"status":"STARTED"}"#).unwrap_err(),
            EventRejection::MissingStageName
        );
        assert_eq!(
            StageEvent::decode(r#"{"agentName":"  ","status":"STARTED"}"#).unwrap_err(),
            EventRejection::MissingStageName
        );
        assert_eq!(
            StageEvent::decode(r#"{"agentName":"MatchingAgent"}"#).unwrap_err(),
            EventRejection::MissingState
        );
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            StageEvent::decode("not json"),
            Err(EventRejection::InvalidPayload(_))
        ));
        assert!(matches!(
            StageEvent::decode(r#"{"agentName":42,"status":"STARTED"}"#),
            Err(EventRejection::InvalidPayload(_))
        ));
        assert!(matches!(
            StageEvent::decode("[]"),
            Err(EventRejection::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_to_json_decodes_back() {
        let event = StageEvent::failed("ResumeRewriteAgent");
        let value: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(value["agentName"], "ResumeRewriteAgent");
        assert_eq!(value["status"], "FAILED");
    }
}
