//! Core orchestration logic.
//!
//! This module contains:
//! - Validator: rule-based document validation
//! - Gates / Recovery: per-stage quality thresholds and fallbacks
//! - Checkpoints: named run-state snapshots
//! - Modes: run configuration presets
//! - Sinks / EventLog: event observers
//! - Orchestrator: Main execution engine

pub mod checkpoint;
pub mod error;
pub mod event_log;
pub mod gates;
pub mod modes;
pub mod orchestrator;
pub mod recovery;
pub mod sink;
pub mod validator;

// Re-export commonly used types
pub use checkpoint::CheckpointStore;
pub use error::PipelineError;
pub use event_log::EventLog;
pub use gates::{GateFailure, GateViolation, QualityThresholds};
pub use modes::{
    AdapterConfig, CollectorConfig, CreatorConfig, Mode, PipelineConfig, ScholarConfig,
    StageConfig,
};
pub use orchestrator::{Orchestrator, PipelineResult};
pub use recovery::{RecoveryPolicy, RecoveryStrategy};
pub use sink::{ChannelSink, EventSink, TracingSink};
pub use validator::{IssueCode, Severity, ValidationIssue, ValidationReport, Validator};
