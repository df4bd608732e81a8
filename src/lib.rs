//! flcm - staged content pipeline engine
//!
//! Turns a topic into publishable content through four fixed stages:
//! collector (research brief), scholar (knowledge synthesis), creator
//! (content draft) and adapter (per-platform adaptations).
//!
//! # Architecture
//!
//! - Every stage output is a typed `Document` from a closed set of four types
//! - The orchestrator runs stages in sequence, validating, gating and
//!   checkpointing each output, with one recovery pass per failed stage
//! - Progress is reported as events to injected sinks (tracing, JSONL log,
//!   channels)
//!
//! # Modules
//!
//! - `adapters`: Stage adapter trait, registry and the Fabric backend
//! - `core`: Orchestrator, validator, gates, recovery, checkpoints, modes
//! - `domain`: Data structures (Document, PipelineRunState, PipelineEvent)
//! - `metadata`: Frontmatter codec, document index and store
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the pipeline
//! flcm run "ownership in rust" --mode quick
//!
//! # Check run status
//! flcm status <run-id>
//!
//! # Query stored documents
//! flcm search --type content_draft --tag rust
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod metadata;

// Re-export main types at crate root for convenience
pub use adapters::{AgentRegistry, StageAdapter};
pub use core::{Mode, Orchestrator, PipelineConfig, PipelineError, PipelineResult, Validator};
pub use domain::{Document, DocumentContent, DocumentType, PipelineRunState, RunStatus, Stage, StageData};
pub use metadata::{DocumentIndex, DocumentStore, SearchCriteria};
