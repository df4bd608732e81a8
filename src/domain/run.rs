//! Run state for a single pipeline execution.
//!
//! The state is owned and mutated by the orchestrator only; checkpoints and
//! results hand out clones.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::StageData;
use super::events::{EventType, PipelineEvent};
use super::stage::Stage;
use super::validation::ValidationReport;

/// A pipeline execution run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRunState {
    /// Unique identifier for this run
    pub run_id: Uuid,

    /// Current status of the run
    pub status: RunStatus,

    /// Stage currently (or last) executing
    pub current_agent: Option<Stage>,

    /// Progress percentage (0-100)
    pub progress: u8,

    /// Wall-clock duration per stage, in milliseconds
    pub stage_durations: BTreeMap<Stage, u64>,

    /// Quality score per stage
    pub quality_scores: BTreeMap<Stage, f64>,

    /// Errors raised during the run, in order
    pub errors: Vec<RunError>,

    /// Output of every stage that produced something usable
    pub documents: BTreeMap<Stage, StageData>,

    /// Validation reports per stage, one per produced document
    pub validation: BTreeMap<Stage, Vec<ValidationReport>>,

    /// Aggregate counters
    pub metrics: RunMetrics,

    /// When the run started
    pub started_at: Option<DateTime<Utc>>,

    /// When the run ended (completed, failed or cancelled)
    pub ended_at: Option<DateTime<Utc>>,
}

impl Default for PipelineRunState {
    fn default() -> Self {
        Self::new(Uuid::new_v4())
    }
}

impl PipelineRunState {
    /// Create an idle run state
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            status: RunStatus::Idle,
            current_agent: None,
            progress: 0,
            stage_durations: BTreeMap::new(),
            quality_scores: BTreeMap::new(),
            errors: Vec::new(),
            documents: BTreeMap::new(),
            validation: BTreeMap::new(),
            metrics: RunMetrics::default(),
            started_at: None,
            ended_at: None,
        }
    }

    /// Record an error against a stage
    pub fn record_error(&mut self, stage: Option<Stage>, kind: RunErrorKind, message: impl Into<String>) {
        self.errors.push(RunError {
            stage,
            kind,
            message: message.into(),
            timestamp: Utc::now(),
        });
        self.metrics.error_count += 1;
    }

    /// Completed or failed
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Reconstruct a coarse run state from a logged event stream.
    ///
    /// Documents are not part of the event log, so only status, progress,
    /// durations and errors are restored.
    pub fn from_events(events: &[PipelineEvent]) -> Option<Self> {
        let first = events.first()?;
        let mut state = Self::new(first.run_id);

        for event in events {
            state.apply_event(event);
        }

        Some(state)
    }

    /// Apply a single event to update run state
    pub fn apply_event(&mut self, event: &PipelineEvent) {
        match event.event_type {
            EventType::RunStarted => {
                self.status = RunStatus::Running;
                self.started_at = Some(event.timestamp);
            }
            EventType::RunCompleted => {
                self.status = RunStatus::Completed;
                self.progress = 100;
                self.ended_at = Some(event.timestamp);
                self.metrics.total_duration_ms = event.duration_ms;
            }
            EventType::RunFailed | EventType::Cancelled => {
                self.status = RunStatus::Failed;
                self.ended_at = Some(event.timestamp);
            }
            EventType::Paused => self.status = RunStatus::Paused,
            EventType::Resumed => self.status = RunStatus::Running,
            EventType::StageStarted => {
                if let Some(stage) = event.stage {
                    self.current_agent = Some(stage);
                    self.progress = stage.progress();
                }
            }
            EventType::StageCompleted => {
                if let (Some(stage), Some(ms)) = (event.stage, event.duration_ms) {
                    self.stage_durations.insert(stage, ms);
                }
            }
            EventType::StageFailed => {
                self.record_error(
                    event.stage,
                    RunErrorKind::StageExecution,
                    event.error.clone().unwrap_or_default(),
                );
            }
            EventType::RecoverySucceeded => {
                self.metrics.recovery_count += 1;
                if let Some(stage) = event.stage {
                    self.metrics.degraded_stages.push(stage);
                }
            }
            EventType::QualityGateWarning => self.metrics.gate_warnings += 1,
            EventType::CheckpointSaved
            | EventType::RecoveryAttempted
            | EventType::RecoveryFailed
            | EventType::ValidationFailed => {}
        }
    }
}

/// Status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Running,
    Paused,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Paused => "paused",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::Idle
    }
}

/// An error raised during a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    pub stage: Option<Stage>,
    pub kind: RunErrorKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Error taxonomy as recorded in run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunErrorKind {
    StageExecution,
    UnknownAgent,
    UnknownDocumentType,
    Cancelled,
}

/// Aggregate counters for a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Errors recorded (one per failed stage attempt)
    pub error_count: u32,

    /// Successful recoveries
    pub recovery_count: u32,

    /// Quality gate failures (advisory)
    pub gate_warnings: u32,

    /// Stages whose output came from a recovery strategy
    #[serde(default)]
    pub degraded_stages: Vec<Stage>,

    /// Total run time in milliseconds (set on completion)
    pub total_duration_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_idle() {
        let state = PipelineRunState::default();
        assert_eq!(state.status, RunStatus::Idle);
        assert_eq!(state.progress, 0);
        assert!(state.current_agent.is_none());
        assert!(!state.is_finished());
    }

    #[test]
    fn test_record_error_counts() {
        let mut state = PipelineRunState::default();
        state.record_error(Some(Stage::Scholar), RunErrorKind::StageExecution, "boom");
        assert_eq!(state.errors.len(), 1);
        assert_eq!(state.metrics.error_count, 1);
        assert_eq!(state.errors[0].stage, Some(Stage::Scholar));
    }

    #[test]
    fn test_state_from_events() {
        let run_id = Uuid::new_v4();
        let events = vec![
            PipelineEvent::new(run_id, None, EventType::RunStarted, "started"),
            PipelineEvent::new(run_id, Some(Stage::Collector), EventType::StageStarted, "collector"),
            PipelineEvent::new(run_id, Some(Stage::Collector), EventType::StageCompleted, "done")
                .with_duration(120),
            PipelineEvent::new(run_id, Some(Stage::Scholar), EventType::StageStarted, "scholar"),
            PipelineEvent::new(run_id, Some(Stage::Scholar), EventType::StageFailed, "failed")
                .with_error("timeout".to_string()),
            PipelineEvent::new(run_id, None, EventType::RunFailed, "run failed"),
        ];

        let state = PipelineRunState::from_events(&events).unwrap();

        assert_eq!(state.run_id, run_id);
        assert_eq!(state.status, RunStatus::Failed);
        assert_eq!(state.current_agent, Some(Stage::Scholar));
        assert_eq!(state.stage_durations.get(&Stage::Collector), Some(&120));
        assert_eq!(state.errors.len(), 1);
        assert_eq!(state.errors[0].message, "timeout");
    }

    #[test]
    fn test_from_empty_events() {
        assert!(PipelineRunState::from_events(&[]).is_none());
    }
}
