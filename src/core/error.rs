//! Pipeline error taxonomy.

use thiserror::Error;

use crate::domain::{RunErrorKind, Stage};

/// Errors that end (or refuse to start) a pipeline run
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// No adapter registered for a stage, or an unknown stage name
    #[error("Agent not found: {name}")]
    AgentNotFound { name: String },

    /// A document type outside the closed set was encountered
    #[error("Unknown document type: {name}")]
    UnknownDocumentType { name: String },

    /// A stage adapter failed and recovery did not produce a usable document
    #[error("Stage '{stage}' failed: {message}")]
    StageExecution { stage: Stage, message: String },

    /// A document failed schema validation
    #[error("Document {document_id} failed validation with {error_count} error(s)")]
    Validation {
        document_id: String,
        error_count: usize,
    },

    /// The run was cancelled before it finished
    #[error("Run cancelled")]
    Cancelled,

    /// `execute` was called while a run is in progress
    #[error("A run is already in progress")]
    AlreadyRunning,

    /// Every stage was disabled or the custom list was empty
    #[error("No stages enabled for this run")]
    EmptyStageList,

    /// A custom stage list repeats a stage or runs stages out of order
    #[error("Invalid stage order: {stages}")]
    InvalidStageOrder { stages: String },
}

impl PipelineError {
    /// Configuration errors are fatal and never retried or recovered
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::AgentNotFound { .. }
                | PipelineError::UnknownDocumentType { .. }
                | PipelineError::EmptyStageList
                | PipelineError::InvalidStageOrder { .. }
                | PipelineError::AlreadyRunning
        )
    }

    /// Classification recorded in run state
    pub fn kind(&self) -> RunErrorKind {
        match self {
            PipelineError::AgentNotFound { .. } => RunErrorKind::UnknownAgent,
            PipelineError::UnknownDocumentType { .. } => RunErrorKind::UnknownDocumentType,
            PipelineError::Cancelled => RunErrorKind::Cancelled,
            PipelineError::StageExecution { .. }
            | PipelineError::Validation { .. }
            | PipelineError::AlreadyRunning
            | PipelineError::EmptyStageList
            | PipelineError::InvalidStageOrder { .. } => RunErrorKind::StageExecution,
        }
    }
}
