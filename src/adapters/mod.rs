//! Stage adapters.
//!
//! A stage adapter turns the previous stage's output into the next document
//! type. The orchestrator looks adapters up by stage in an `AgentRegistry`;
//! a stage with no adapter is a fatal configuration error.

pub mod fabric;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::core::{PipelineError, StageConfig};
use crate::domain::{Stage, StageData};

pub use fabric::{FabricClient, FabricStage};

/// Trait for pluggable stage implementations
#[async_trait]
pub trait StageAdapter: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Stage this adapter implements
    fn stage(&self) -> Stage;

    /// Transform the previous stage's output into this stage's output
    async fn process(&self, input: &StageData, config: &StageConfig) -> Result<StageData>;
}

/// Adapters keyed by stage
#[derive(Clone, Default)]
pub struct AgentRegistry {
    adapters: HashMap<Stage, Arc<dyn StageAdapter>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing any previous one for its stage
    pub fn register(&mut self, adapter: Arc<dyn StageAdapter>) {
        self.adapters.insert(adapter.stage(), adapter);
    }

    /// Builder-style `register`
    pub fn with(mut self, adapter: Arc<dyn StageAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// Look up the adapter for a stage
    pub fn get(&self, stage: Stage) -> Result<Arc<dyn StageAdapter>, PipelineError> {
        self.adapters
            .get(&stage)
            .cloned()
            .ok_or_else(|| PipelineError::AgentNotFound {
                name: stage.to_string(),
            })
    }

    /// Look up an adapter by stage name
    pub fn get_by_name(&self, name: &str) -> Result<Arc<dyn StageAdapter>, PipelineError> {
        let stage = name
            .parse::<Stage>()
            .map_err(|_| PipelineError::AgentNotFound {
                name: name.to_string(),
            })?;
        self.get(stage)
    }

    pub fn contains(&self, stage: Stage) -> bool {
        self.adapters.contains_key(&stage)
    }

    /// Registered stages in pipeline order
    pub fn stages(&self) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|s| self.adapters.contains_key(s))
            .collect()
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("stages", &self.stages())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(Stage);

    #[async_trait]
    impl StageAdapter for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn stage(&self) -> Stage {
            self.0
        }

        async fn process(&self, input: &StageData, _config: &StageConfig) -> Result<StageData> {
            Ok(input.clone())
        }
    }

    #[test]
    fn test_registry_lookup() {
        let registry = AgentRegistry::new()
            .with(Arc::new(Echo(Stage::Scholar)))
            .with(Arc::new(Echo(Stage::Collector)));

        assert_eq!(registry.stages(), vec![Stage::Collector, Stage::Scholar]);
        assert_eq!(registry.get(Stage::Scholar).unwrap().name(), "echo");
        assert!(registry.get_by_name("collector").is_ok());
    }

    #[test]
    fn test_missing_adapter_is_agent_not_found() {
        let registry = AgentRegistry::new();
        assert!(matches!(
            registry.get(Stage::Creator),
            Err(PipelineError::AgentNotFound { .. })
        ));
        assert!(matches!(
            registry.get_by_name("editor"),
            Err(PipelineError::AgentNotFound { name }) if name == "editor"
        ));
    }
}
