//! Run configuration and mode presets.
//!
//! A `PipelineConfig` bundles per-stage knobs with orchestrator switches.
//! The `quick` and `standard` presets are plain data; configs can also be
//! loaded from YAML, where `mode` picks the preset and every other field
//! given overrides it.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use super::error::PipelineError;
use crate::domain::{Platform, Stage};

/// Named configuration preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Shallow research, single drafting pass, two platforms
    Quick,

    /// Full depth, iterative drafting, checkpoints and quality gates
    Standard,
}

impl Default for Mode {
    fn default() -> Self {
        Self::Standard
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Quick => f.write_str("quick"),
            Mode::Standard => f.write_str("standard"),
        }
    }
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "quick" => Ok(Mode::Quick),
            "standard" => Ok(Mode::Standard),
            _ => anyhow::bail!("Unknown mode: {}", s),
        }
    }
}

/// Complete configuration for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Preset this config was derived from
    pub mode: Mode,

    /// Explicit stage order; overrides the preset's stage list
    pub stages: Option<Vec<String>>,

    /// Snapshot run state after each stage
    pub save_checkpoints: bool,

    /// Evaluate quality gates on stage outputs
    pub quality_gates: bool,

    /// Overall run timeout in seconds (declarative; adapters enforce)
    pub timeout_seconds: u64,

    pub collector: CollectorConfig,
    pub scholar: ScholarConfig,
    pub creator: CreatorConfig,
    pub adapter: AdapterConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl PipelineConfig {
    /// Fast preset: shallow stages, no checkpoints, no gates
    pub fn quick() -> Self {
        Self {
            mode: Mode::Quick,
            stages: None,
            save_checkpoints: false,
            quality_gates: false,
            timeout_seconds: 300,
            collector: CollectorConfig {
                enabled: true,
                max_sources: 3,
                timeout_seconds: 60,
            },
            scholar: ScholarConfig {
                enabled: true,
                max_depth: 2,
                timeout_seconds: 60,
            },
            creator: CreatorConfig {
                enabled: true,
                iterations: 1,
                target_words: 300,
                timeout_seconds: 60,
            },
            adapter: AdapterConfig {
                enabled: true,
                platforms: vec![Platform::Twitter, Platform::LinkedIn],
                timeout_seconds: 30,
            },
        }
    }

    /// Full preset
    pub fn standard() -> Self {
        Self {
            mode: Mode::Standard,
            stages: None,
            save_checkpoints: true,
            quality_gates: true,
            timeout_seconds: 1800,
            collector: CollectorConfig {
                enabled: true,
                max_sources: 10,
                timeout_seconds: 180,
            },
            scholar: ScholarConfig {
                enabled: true,
                max_depth: 5,
                timeout_seconds: 300,
            },
            creator: CreatorConfig {
                enabled: true,
                iterations: 3,
                target_words: 1200,
                timeout_seconds: 300,
            },
            adapter: AdapterConfig {
                enabled: true,
                platforms: vec![
                    Platform::Twitter,
                    Platform::LinkedIn,
                    Platform::WeChat,
                    Platform::Xiaohongshu,
                ],
                timeout_seconds: 120,
            },
        }
    }

    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Quick => Self::quick(),
            Mode::Standard => Self::standard(),
        }
    }

    /// Load a config from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline config: {}", path.display()))?;

        Self::from_yaml(&content)
    }

    /// Parse a config from YAML content.
    ///
    /// Fields are laid over the preset named by `mode` (standard if absent).
    pub fn from_yaml(content: &str) -> Result<Self> {
        let overrides: Value =
            serde_yaml::from_str(content).context("Failed to parse pipeline config YAML")?;

        let mode = match overrides.get("mode") {
            Some(value) => serde_yaml::from_value(value.clone()).context("Invalid pipeline mode")?,
            None => Mode::default(),
        };

        let mut merged = serde_yaml::to_value(Self::for_mode(mode))
            .context("Failed to encode mode preset")?;
        if !overrides.is_null() {
            merge_yaml(&mut merged, overrides);
        }

        serde_yaml::from_value(merged).context("Invalid pipeline config")
    }

    /// Use an explicit stage list instead of the preset order
    pub fn with_stages<I, S>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stages = Some(stages.into_iter().map(Into::into).collect());
        self
    }

    /// Enable or disable a single stage
    pub fn set_enabled(&mut self, stage: Stage, enabled: bool) {
        match stage {
            Stage::Collector => self.collector.enabled = enabled,
            Stage::Scholar => self.scholar.enabled = enabled,
            Stage::Creator => self.creator.enabled = enabled,
            Stage::Adapter => self.adapter.enabled = enabled,
        }
    }

    pub fn is_enabled(&self, stage: Stage) -> bool {
        self.stage_config(stage).enabled()
    }

    /// Resolve the ordered list of stages to run.
    ///
    /// Unknown names, repeats and out-of-order stages in a custom list are
    /// configuration errors.
    pub fn resolve_stages(&self) -> Result<Vec<Stage>, PipelineError> {
        let ordered = match &self.stages {
            Some(names) => names
                .iter()
                .map(|name| {
                    name.parse::<Stage>()
                        .map_err(|_| PipelineError::AgentNotFound { name: name.clone() })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Stage::ALL.to_vec(),
        };

        // Each stage consumes the previous stage's output type
        if ordered.windows(2).any(|pair| pair[0] >= pair[1]) {
            let stages = ordered.iter().map(Stage::as_str).collect::<Vec<_>>().join(",");
            return Err(PipelineError::InvalidStageOrder { stages });
        }

        let enabled: Vec<Stage> = ordered
            .into_iter()
            .filter(|stage| self.is_enabled(*stage))
            .collect();

        if enabled.is_empty() {
            return Err(PipelineError::EmptyStageList);
        }
        Ok(enabled)
    }

    /// Configuration handed to a stage adapter
    pub fn stage_config(&self, stage: Stage) -> StageConfig {
        match stage {
            Stage::Collector => StageConfig::Collector(self.collector.clone()),
            Stage::Scholar => StageConfig::Scholar(self.scholar.clone()),
            Stage::Creator => StageConfig::Creator(self.creator.clone()),
            Stage::Adapter => StageConfig::Adapter(self.adapter.clone()),
        }
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Maximum number of sources to gather
    pub max_sources: u32,

    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScholarConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Deepest layer to attempt (1-5)
    pub max_depth: u8,

    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatorConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Drafting passes
    pub iterations: u32,

    /// Target draft length in words
    pub target_words: u32,

    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Platforms to produce adaptations for
    pub platforms: Vec<Platform>,

    pub timeout_seconds: u64,
}

fn default_enabled() -> bool {
    true
}

/// Recursively overlay `overrides` onto `base`; non-mapping values replace
fn merge_yaml(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Mapping(base), Value::Mapping(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(slot) => merge_yaml(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Per-stage configuration passed to the stage adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageConfig {
    Collector(CollectorConfig),
    Scholar(ScholarConfig),
    Creator(CreatorConfig),
    Adapter(AdapterConfig),
}

impl StageConfig {
    pub fn stage(&self) -> Stage {
        match self {
            StageConfig::Collector(_) => Stage::Collector,
            StageConfig::Scholar(_) => Stage::Scholar,
            StageConfig::Creator(_) => Stage::Creator,
            StageConfig::Adapter(_) => Stage::Adapter,
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            StageConfig::Collector(c) => c.enabled,
            StageConfig::Scholar(c) => c.enabled,
            StageConfig::Creator(c) => c.enabled,
            StageConfig::Adapter(c) => c.enabled,
        }
    }

    /// Declared timeout for this stage
    pub fn timeout(&self) -> Duration {
        let seconds = match self {
            StageConfig::Collector(c) => c.timeout_seconds,
            StageConfig::Scholar(c) => c.timeout_seconds,
            StageConfig::Creator(c) => c.timeout_seconds,
            StageConfig::Adapter(c) => c.timeout_seconds,
        };
        Duration::from_secs(seconds)
    }

    /// Target platforms (empty for every stage but the adapter)
    pub fn platforms(&self) -> &[Platform] {
        match self {
            StageConfig::Adapter(c) => &c.platforms,
            _ => &[],
        }
    }
}
