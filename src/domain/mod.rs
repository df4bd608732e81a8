//! Domain types for the flcm pipeline.
//!
//! This module contains the core data structures:
//! - Stage / Platform: the fixed pipeline steps and publishing targets
//! - Document: the typed unit of work flowing between stages
//! - PipelineRunState: execution state of a run
//! - PipelineEvent: observer notifications
//! - ValidationReport: findings from document validation

pub mod document;
pub mod events;
pub mod run;
pub mod stage;
pub mod validation;

// Re-export commonly used types
pub use document::{
    ContentDraft, DepthLayer, Document, DocumentContent, DocumentMetadata, DocumentType,
    DraftSection, Insight, KnowledgeSynthesis, PlatformAdaptation, ProcessingStatus,
    ResearchBrief, SignalScores, StageData, TopicSeed,
};
pub use events::{EventType, PipelineEvent};
pub use run::{PipelineRunState, RunError, RunErrorKind, RunMetrics, RunStatus};
pub use stage::{Platform, Stage};
pub use validation::{IssueCode, Severity, ValidationIssue, ValidationReport};
