//! Events emitted during pipeline execution.
//!
//! Events are raised for external observers (logs, UIs, the JSONL event log).
//! They are not part of the run's control flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stage::Stage;

/// A single pipeline event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// The run this event belongs to
    pub run_id: Uuid,

    /// Stage the event concerns (if applicable)
    pub stage: Option<Stage>,

    /// Type of event
    pub event_type: EventType,

    /// Human-readable summary
    pub summary: String,

    /// Time taken in milliseconds (stage or run completion)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Error message if something failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineEvent {
    /// Create a new event with the current timestamp
    pub fn new(
        run_id: Uuid,
        stage: Option<Stage>,
        event_type: EventType,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            run_id,
            stage,
            event_type,
            summary: summary.into(),
            duration_ms: None,
            error: None,
        }
    }

    /// Attach duration information
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Attach error information
    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }
}

/// Types of events raised by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RunStarted,
    RunCompleted,
    RunFailed,

    StageStarted,
    StageCompleted,
    StageFailed,

    /// A stage output failed its quality gate (advisory)
    QualityGateWarning,

    /// A stage output failed document validation (advisory)
    ValidationFailed,

    CheckpointSaved,

    RecoveryAttempted,
    RecoverySucceeded,
    RecoveryFailed,

    Paused,
    Resumed,
    Cancelled,
}

impl EventType {
    /// Whether the event reports a failure of some kind
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            EventType::RunFailed | EventType::StageFailed | EventType::RecoveryFailed
        )
    }

    /// Whether the event is an advisory warning
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            EventType::QualityGateWarning
                | EventType::ValidationFailed
                | EventType::RecoveryAttempted
                | EventType::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = PipelineEvent::new(
            Uuid::new_v4(),
            Some(Stage::Scholar),
            EventType::QualityGateWarning,
            "confidence below threshold",
        );

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"quality_gate_warning\""));
        assert!(!json.contains("duration_ms"));

        let parsed: PipelineEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.event_type, EventType::QualityGateWarning);
        assert_eq!(parsed.stage, Some(Stage::Scholar));
    }

    #[test]
    fn test_event_builders() {
        let event = PipelineEvent::new(Uuid::new_v4(), None, EventType::StageFailed, "failed")
            .with_duration(1500)
            .with_error("Connection timeout".to_string());

        assert_eq!(event.duration_ms, Some(1500));
        assert_eq!(event.error.as_deref(), Some("Connection timeout"));
        assert!(event.event_type.is_error());
    }
}
