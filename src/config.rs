//! Configuration for flcm paths and run defaults.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (FLCM_HOME, FLCM_DOCUMENTS, FLCM_MODE)
//! 2. Config file (.flcm/config.yaml)
//! 3. Defaults (~/.flcm, ~/.flcm/documents, standard mode)
//!
//! Config file discovery:
//! - Searches current directory and parents for .flcm/config.yaml
//! - `home` is relative to the .flcm/ directory, other paths to its parent
//!
//! The resolved config is a plain value; callers pass it where needed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::{Mode, PipelineConfig, QualityThresholds, RecoveryPolicy};

pub const ENV_HOME: &str = "FLCM_HOME";
pub const ENV_DOCUMENTS: &str = "FLCM_DOCUMENTS";
pub const ENV_MODE: &str = "FLCM_MODE";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub quality: Option<QualityThresholds>,
    #[serde(default)]
    pub recovery: Option<RecoveryPolicy>,
    #[serde(default)]
    pub fabric: Option<FabricConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory (relative to .flcm/)
    pub home: Option<String>,
    /// Document store directory (relative to the project root)
    pub documents: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineSection {
    /// Default mode preset
    pub mode: Option<Mode>,
    /// Full pipeline config file (relative to the project root)
    pub config: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FabricConfig {
    /// Path to the fabric binary
    pub binary: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Engine state (event logs)
    pub home: PathBuf,
    /// Document store root
    pub documents: PathBuf,
    /// Mode used when the caller does not choose one
    pub default_mode: Mode,
    /// Full pipeline config file, if configured
    pub pipeline_file: Option<PathBuf>,
    pub thresholds: QualityThresholds,
    pub recovery: RecoveryPolicy,
    pub fabric_binary: Option<String>,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Load configuration from the environment, discovered config file and defaults
    pub fn load() -> Result<Self> {
        let start = std::env::current_dir().context("Failed to determine current directory")?;
        Self::resolve(find_config_file(&start), |key| std::env::var(key).ok())
    }

    /// Resolve from an optional config file and an environment lookup
    pub fn resolve(
        config_file: Option<PathBuf>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let default_home = dirs::home_dir()
            .context("Failed to determine home directory")?
            .join(".flcm");

        let file = config_file.as_deref().map(load_config_file).transpose()?;

        // .flcm/ and the project root containing it
        let flcm_dir = config_file
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or(Path::new("."));
        let base_dir = flcm_dir.parent().unwrap_or(Path::new("."));

        let home = match (env(ENV_HOME), file.as_ref().and_then(|f| f.paths.home.as_deref())) {
            (Some(env_home), _) => PathBuf::from(env_home),
            (None, Some(home)) => resolve_path(flcm_dir, home),
            (None, None) => default_home,
        };

        let documents = match (
            env(ENV_DOCUMENTS),
            file.as_ref().and_then(|f| f.paths.documents.as_deref()),
        ) {
            (Some(env_docs), _) => PathBuf::from(env_docs),
            (None, Some(docs)) => resolve_path(base_dir, docs),
            (None, None) => home.join("documents"),
        };

        let default_mode = match env(ENV_MODE) {
            Some(mode) => mode
                .parse()
                .with_context(|| format!("Invalid {} value", ENV_MODE))?,
            None => file
                .as_ref()
                .and_then(|f| f.pipeline.mode)
                .unwrap_or_default(),
        };

        let pipeline_file = file
            .as_ref()
            .and_then(|f| f.pipeline.config.as_deref())
            .map(|p| resolve_path(base_dir, p));

        Ok(Self {
            home,
            documents,
            default_mode,
            pipeline_file,
            thresholds: file.as_ref().and_then(|f| f.quality.clone()).unwrap_or_default(),
            recovery: file.as_ref().and_then(|f| f.recovery.clone()).unwrap_or_default(),
            fabric_binary: file
                .as_ref()
                .and_then(|f| f.fabric.as_ref())
                .and_then(|f| f.binary.clone()),
            config_file,
        })
    }

    /// Directory holding one event log per run ($FLCM_HOME/runs)
    pub fn runs_dir(&self) -> PathBuf {
        self.home.join("runs")
    }

    pub fn documents_dir(&self) -> &Path {
        &self.documents
    }

    /// Pipeline config for a run.
    ///
    /// An explicit mode selects that preset; otherwise the configured
    /// pipeline file wins over the default mode preset.
    pub fn pipeline_config(&self, mode: Option<Mode>) -> Result<PipelineConfig> {
        match (mode, &self.pipeline_file) {
            (Some(mode), _) => Ok(PipelineConfig::for_mode(mode)),
            (None, Some(path)) => PipelineConfig::from_file(path),
            (None, None) => Ok(PipelineConfig::for_mode(self.default_mode)),
        }
    }
}

/// Find config file by searching `start` and its parents
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".flcm").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RecoveryStrategy;
    use crate::domain::Stage;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_config(root: &Path, yaml: &str) -> PathBuf {
        let flcm_dir = root.join(".flcm");
        std::fs::create_dir_all(&flcm_dir).unwrap();
        let config_path = flcm_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "{}", yaml).unwrap();
        config_path
    }

    #[test]
    fn test_defaults_without_file() {
        let config = ResolvedConfig::resolve(None, no_env).unwrap();

        let expected_home = dirs::home_dir().unwrap().join(".flcm");
        assert_eq!(config.home, expected_home);
        assert_eq!(config.documents, expected_home.join("documents"));
        assert_eq!(config.runs_dir(), expected_home.join("runs"));
        assert_eq!(config.default_mode, Mode::Standard);
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_config_file_values() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(
            temp.path(),
            r#"
version: "1.0"
paths:
  home: ./state
  documents: content
pipeline:
  mode: quick
quality:
  min_signal_score: 0.4
recovery:
  default: placeholder
  stages:
    adapter: abort
"#,
        );

        let config = ResolvedConfig::resolve(Some(config_path.clone()), no_env).unwrap();

        assert_eq!(config.home, temp.path().join(".flcm").join("state"));
        assert_eq!(config.documents, temp.path().join("content"));
        assert_eq!(config.default_mode, Mode::Quick);
        assert_eq!(config.thresholds.min_signal_score, 0.4);
        assert_eq!(config.recovery.strategy(Stage::Adapter), RecoveryStrategy::Abort);
        assert_eq!(config.recovery.strategy(Stage::Scholar), RecoveryStrategy::Placeholder);
        assert_eq!(config.config_file, Some(config_path));
        assert_eq!(config.pipeline_config(None).unwrap().mode, Mode::Quick);
        assert_eq!(
            config.pipeline_config(Some(Mode::Standard)).unwrap().mode,
            Mode::Standard
        );
    }

    #[test]
    fn test_env_overrides_file() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(
            temp.path(),
            "version: \"1.0\"\npaths:\n  home: ./state\npipeline:\n  mode: quick\n",
        );
        let env = |key: &str| match key {
            ENV_HOME => Some("/srv/flcm".to_string()),
            ENV_MODE => Some("standard".to_string()),
            _ => None,
        };

        let config = ResolvedConfig::resolve(Some(config_path), env).unwrap();

        assert_eq!(config.home, PathBuf::from("/srv/flcm"));
        assert_eq!(config.documents, PathBuf::from("/srv/flcm/documents"));
        assert_eq!(config.default_mode, Mode::Standard);
    }

    #[test]
    fn test_invalid_env_mode() {
        let env = |key: &str| (key == ENV_MODE).then(|| "turbo".to_string());
        assert!(ResolvedConfig::resolve(None, env).is_err());
    }

    #[test]
    fn test_find_config_file_walks_up() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(temp.path(), "version: \"1.0\"");
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_config_file(&nested), Some(config_path));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
