//! Command-line interface for flcm.
//!
//! Provides commands for running the pipeline, checking run status,
//! validating document files, and querying the document store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::adapters::{FabricClient, FabricStage};
use crate::config::ResolvedConfig;
use crate::core::{EventLog, Mode, Orchestrator, PipelineConfig, TracingSink, ValidationReport, Validator};
use crate::domain::{DocumentType, PipelineRunState, ProcessingStatus, Stage, StageData};
use crate::metadata::{frontmatter, DocumentStore, SearchCriteria};

/// flcm - staged content pipeline: research, synthesis, drafting, adaptation
#[derive(Parser, Debug)]
#[command(name = "flcm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline for a topic
    Run {
        /// Topic to research and write about
        topic: String,

        /// Mode preset (quick or standard)
        #[arg(short, long)]
        mode: Option<Mode>,

        /// Explicit stage order (comma-separated)
        #[arg(long, value_delimiter = ',')]
        stages: Vec<String>,

        /// Do not persist stage outputs to the document store
        #[arg(long)]
        no_store: bool,
    },

    /// Check the status of a run
    Status {
        /// Run ID (UUID)
        run_id: String,
    },

    /// List recent runs
    Runs {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Validate a document file (frontmatter markdown or JSON)
    Validate {
        /// Path to the document
        file: PathBuf,
    },

    /// Search stored documents
    Search {
        /// Document type (e.g. research_brief)
        #[arg(short = 't', long = "type")]
        doc_type: Option<DocumentType>,

        /// Producing stage
        #[arg(short, long)]
        stage: Option<Stage>,

        /// Processing status
        #[arg(long)]
        status: Option<ProcessingStatus>,

        /// Required tags (all must match)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Show a stored document
    Show {
        /// Document ID
        id: String,

        /// Print the predecessor chain instead of the body
        #[arg(long)]
        lineage: bool,
    },

    /// Rebuild the document index from stored files
    Reindex,

    /// Print the mode presets
    Modes,

    /// Show current configuration
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = ResolvedConfig::load()?;

        match self.command {
            Commands::Run {
                topic,
                mode,
                stages,
                no_store,
            } => run_pipeline(&config, &topic, mode, stages, no_store).await,
            Commands::Status { run_id } => show_status(&config, &run_id).await,
            Commands::Runs { limit } => list_runs(&config, limit).await,
            Commands::Validate { file } => validate_file(&file).await,
            Commands::Search {
                doc_type,
                stage,
                status,
                tags,
            } => {
                let criteria = SearchCriteria {
                    doc_type,
                    stage,
                    status,
                    tags,
                };
                search_documents(&config, &criteria).await
            }
            Commands::Show { id, lineage } => show_document(&config, &id, lineage).await,
            Commands::Reindex => reindex(&config).await,
            Commands::Modes => show_modes(),
            Commands::Config => show_config(&config),
        }
    }
}

/// Run the pipeline for a topic
async fn run_pipeline(
    config: &ResolvedConfig,
    topic: &str,
    mode: Option<Mode>,
    stages: Vec<String>,
    no_store: bool,
) -> Result<()> {
    if topic.trim().is_empty() {
        anyhow::bail!("Topic is empty");
    }

    let mut pipeline = config.pipeline_config(mode)?;
    if !stages.is_empty() {
        pipeline = pipeline.with_stages(stages);
    }

    let client = match &config.fabric_binary {
        Some(binary) => FabricClient::with_binary_path(binary),
        None => FabricClient::new(),
    };
    client
        .health_check()
        .await
        .with_context(|| format!("Fabric is not available ({})", client.binary_path()))?;

    let mut orchestrator = Orchestrator::new(FabricStage::registry(client))
        .with_thresholds(config.thresholds.clone())
        .with_recovery(config.recovery.clone())
        .with_sink(Arc::new(TracingSink))
        .with_sink(Arc::new(EventLog::new(config.runs_dir())));
    if !no_store {
        orchestrator = orchestrator.with_store(DocumentStore::new(&config.documents));
    }

    let result = orchestrator.execute(topic, &pipeline).await;
    let state = &result.state;

    if let Some(output) = &result.final_content {
        print_output(output);
    }

    match &result.error {
        None => {
            eprintln!(
                "\n[Run {} completed: {} error(s), {} recovery(ies), {} gate warning(s)]",
                state.run_id,
                state.metrics.error_count,
                state.metrics.recovery_count,
                state.metrics.gate_warnings
            );
            Ok(())
        }
        Some(error) => {
            eprintln!("\n[Run {} failed: {}]", state.run_id, error);
            std::process::exit(1);
        }
    }
}

fn print_output(output: &StageData) {
    for doc in output.documents() {
        println!("=== {} ({}) ===", doc.id, doc.doc_type());
        println!("{}\n", doc.body_text());
    }
}

/// Show the status of a run
async fn show_status(config: &ResolvedConfig, run_id_str: &str) -> Result<()> {
    let run_id = Uuid::parse_str(run_id_str)
        .with_context(|| format!("Invalid run ID: {}", run_id_str))?;

    let log = EventLog::new(config.runs_dir());
    let events = log.replay(run_id).await?;
    let state = PipelineRunState::from_events(&events)
        .with_context(|| format!("Run {} not found", run_id))?;

    println!("Run ID: {}", state.run_id);
    println!("Status: {}", state.status.as_str());
    if let Some(started) = state.started_at {
        println!("Started: {}", started);
    }
    if let Some(ended) = state.ended_at {
        println!("Ended: {}", ended);
    }
    if let Some(stage) = state.current_agent {
        println!("Current stage: {} ({}%)", stage, state.progress);
    }
    println!("\nStage durations:");
    for (stage, ms) in &state.stage_durations {
        println!("  {}: {}ms", stage, ms);
    }
    if !state.errors.is_empty() {
        println!("\nErrors:");
        for error in &state.errors {
            let stage = error.stage.map(|s| s.as_str()).unwrap_or("-");
            println!("  [{}] {}", stage, error.message);
        }
    }

    Ok(())
}

/// List recent runs
async fn list_runs(config: &ResolvedConfig, limit: usize) -> Result<()> {
    let log = EventLog::new(config.runs_dir());
    let mut runs = Vec::new();

    for run_id in log.list_runs().await? {
        if let Some(state) = PipelineRunState::from_events(&log.replay(run_id).await?) {
            runs.push(state);
        }
    }

    if runs.is_empty() {
        println!("No runs found");
        return Ok(());
    }

    // Most recent first
    runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    runs.truncate(limit);

    println!("{:<38} {:<12} {:<10}", "RUN ID", "STATUS", "PROGRESS");
    println!("{}", "-".repeat(62));
    for state in runs {
        println!(
            "{:<38} {:<12} {:<10}",
            state.run_id,
            state.status.as_str(),
            format!("{}%", state.progress)
        );
    }

    Ok(())
}

/// Validate a document file
async fn validate_file(path: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    let validator = Validator::new();
    let report = if path.extension().is_some_and(|ext| ext == "json") {
        let value: serde_json::Value =
            serde_json::from_str(&content).context("Failed to parse document JSON")?;
        validator.validate_value(&value)
    } else {
        let (document, _body) = frontmatter::parse(&content)
            .with_context(|| format!("Failed to decode document: {}", path.display()))?;
        validator.validate(&document)
    };

    print_report(&report);
    if !report.valid {
        std::process::exit(1);
    }
    Ok(())
}

fn print_report(report: &ValidationReport) {
    println!(
        "{} (score {})",
        if report.valid { "VALID" } else { "INVALID" },
        report.score
    );
    for issue in report.errors.iter().chain(&report.warnings) {
        println!(
            "  {:?} {} {}: {}",
            issue.severity,
            issue.code,
            issue.field.as_deref().unwrap_or("-"),
            issue.message
        );
    }
}

/// Search stored documents
async fn search_documents(config: &ResolvedConfig, criteria: &SearchCriteria) -> Result<()> {
    let store = DocumentStore::new(&config.documents);
    let index = store.index().await?;
    let results = index.search(criteria);

    if results.is_empty() {
        println!("No documents found");
        return Ok(());
    }

    println!("{:<48} {:<22} {:<10} {:<10}", "ID", "TYPE", "STAGE", "STATUS");
    println!("{}", "-".repeat(92));
    for entry in &results {
        println!(
            "{:<48} {:<22} {:<10} {:<10}",
            entry.id,
            entry.doc_type.as_str(),
            entry.stage.as_str(),
            entry.status.as_str()
        );
    }
    println!("\nTotal: {} document(s)", results.len());

    Ok(())
}

/// Show a stored document (or its lineage)
async fn show_document(config: &ResolvedConfig, id: &str, lineage: bool) -> Result<()> {
    let store = DocumentStore::new(&config.documents);

    if lineage {
        let index = store.index().await?;
        let chain = index.lineage(id);
        if chain.is_empty() {
            anyhow::bail!("Document not found: {}", id);
        }
        for (depth, entry) in chain.iter().enumerate() {
            println!("{}{} ({})", "  ".repeat(depth), entry.id, entry.doc_type);
        }
        return Ok(());
    }

    let (document, body) = store.load(id).await?;
    println!("ID:       {}", document.id);
    println!("Type:     {}", document.doc_type());
    println!("Stage:    {}", document.metadata.stage);
    println!("Status:   {}", document.metadata.status);
    println!("Version:  {}", document.version);
    println!("Created:  {}", document.created);
    println!("Modified: {}", document.modified);
    if !document.metadata.tags.is_empty() {
        println!("Tags:     {}", document.metadata.tags.join(", "));
    }
    if let Some(parent) = document.predecessor() {
        println!("Derived from: {}", parent);
    }
    println!("\n{}", body);

    Ok(())
}

async fn reindex(config: &ResolvedConfig) -> Result<()> {
    let store = DocumentStore::new(&config.documents);
    let count = store.rebuild_index().await?;
    println!("Indexed {} document(s) in {}", count, store.root().display());
    Ok(())
}

/// Print both mode presets
fn show_modes() -> Result<()> {
    for mode in [Mode::Quick, Mode::Standard] {
        let yaml = serde_yaml::to_string(&PipelineConfig::for_mode(mode))
            .context("Failed to render mode preset")?;
        println!("# {}\n{}", mode, yaml);
    }
    Ok(())
}

/// Show current configuration
fn show_config(config: &ResolvedConfig) -> Result<()> {
    println!("flcm Configuration");
    println!("==================\n");

    if let Some(ref path) = config.config_file {
        println!("Config file: {}", path.display());
    } else {
        println!("Config file: (none, using defaults)");
    }

    println!("\nPaths:");
    println!("  Home:      {}", config.home.display());
    println!("  Runs:      {}", config.runs_dir().display());
    println!("  Documents: {}", config.documents.display());

    println!("\nPipeline:");
    println!("  Default mode: {}", config.default_mode);
    if let Some(ref path) = config.pipeline_file {
        println!("  Config file:  {}", path.display());
    }

    println!("\nQuality gates:");
    let t = &config.thresholds;
    println!("  Signal score:  >= {}", t.min_signal_score);
    println!("  Insights:      >= {}", t.min_insights);
    println!("  Confidence:    >= {}", t.min_confidence);
    println!("  Depth:         >= {}", t.min_depth);
    println!("  Engagement:    >= {}", t.min_engagement);
    println!("  Platform fit:  >= {}", t.min_platform_fit);

    println!("\nEnvironment overrides:");
    println!("  FLCM_HOME, FLCM_DOCUMENTS, FLCM_MODE");

    Ok(())
}
