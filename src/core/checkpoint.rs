//! Named run-state snapshots.
//!
//! A checkpoint is a deep copy of the run state taken after a stage
//! completes. Snapshots are immutable once stored and shared by `Arc`, so
//! readers never observe later mutation of the live run.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::domain::PipelineRunState;

/// In-memory checkpoint arena keyed by name (e.g. `after_scholar`)
#[derive(Debug, Default)]
pub struct CheckpointStore {
    snapshots: RwLock<HashMap<String, Arc<PipelineRunState>>>,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot `state` under `name`, replacing any previous snapshot
    pub fn save(&self, name: impl Into<String>, state: &PipelineRunState) {
        let snapshot = Arc::new(state.clone());
        let mut snapshots = self
            .snapshots
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        snapshots.insert(name.into(), snapshot);
    }

    /// Load a snapshot by name
    pub fn load(&self, name: &str) -> Option<Arc<PipelineRunState>> {
        self.snapshots
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
    }

    /// Names of all stored snapshots, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .snapshots
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Drop every snapshot
    pub fn clear(&self) {
        self.snapshots
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.snapshots
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
