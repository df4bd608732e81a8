//! Append-only event log with file-based persistence.
//!
//! Events are stored per run as newline-delimited JSON (JSONL) for
//! simplicity and easy debugging/inspection:
//!
//! ```text
//! <runs_dir>/
//! └── <run_id>/
//!     └── events.jsonl
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

use super::sink::EventSink;
use crate::domain::{EventType, PipelineEvent};

/// File-based event log routing events by run id
#[derive(Debug, Clone)]
pub struct EventLog {
    /// Directory holding one subdirectory per run
    runs_dir: PathBuf,
}

impl EventLog {
    pub fn new(runs_dir: impl Into<PathBuf>) -> Self {
        Self {
            runs_dir: runs_dir.into(),
        }
    }

    pub fn runs_dir(&self) -> &Path {
        &self.runs_dir
    }

    /// Path to a run's events file
    pub fn events_path(&self, run_id: Uuid) -> PathBuf {
        self.runs_dir.join(run_id.to_string()).join("events.jsonl")
    }

    /// Append an event to its run's log
    pub async fn append(&self, event: &PipelineEvent) -> Result<()> {
        let events_path = self.events_path(event.run_id);
        if let Some(run_dir) = events_path.parent() {
            fs::create_dir_all(run_dir)
                .await
                .with_context(|| format!("Failed to create run directory: {}", run_dir.display()))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&events_path)
            .await
            .with_context(|| format!("Failed to open events file: {}", events_path.display()))?;

        let json = serde_json::to_string(event).context("Failed to serialize event")?;
        file.write_all(format!("{}\n", json).as_bytes())
            .await
            .context("Failed to write event")?;
        file.flush().await.context("Failed to flush event")?;

        Ok(())
    }

    /// Replay all events of a run in order
    pub async fn replay(&self, run_id: Uuid) -> Result<Vec<PipelineEvent>> {
        let events_path = self.events_path(run_id);
        if !events_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&events_path)
            .await
            .with_context(|| format!("Failed to open events file: {}", events_path.display()))?;

        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut events = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let event: PipelineEvent = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse event: {}", line))?;
            events.push(event);
        }

        Ok(events)
    }

    /// Get the last event of a specific type for a run
    pub async fn last_event_of_type(
        &self,
        run_id: Uuid,
        event_type: EventType,
    ) -> Result<Option<PipelineEvent>> {
        let events = self.replay(run_id).await?;
        Ok(events.into_iter().rev().find(|e| e.event_type == event_type))
    }

    /// List all run ids with a log directory
    pub async fn list_runs(&self) -> Result<Vec<Uuid>> {
        if !self.runs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        let mut entries = fs::read_dir(&self.runs_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    if let Ok(uuid) = Uuid::parse_str(name) {
                        runs.push(uuid);
                    }
                }
            }
        }

        Ok(runs)
    }
}

#[async_trait]
impl EventSink for EventLog {
    async fn emit(&self, event: &PipelineEvent) -> Result<()> {
        self.append(event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Stage;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_event_append_and_replay() {
        let temp = TempDir::new().unwrap();
        let log = EventLog::new(temp.path());
        let run_id = Uuid::new_v4();

        log.append(&PipelineEvent::new(run_id, None, EventType::RunStarted, "started"))
            .await
            .unwrap();
        log.append(&PipelineEvent::new(
            run_id,
            Some(Stage::Collector),
            EventType::StageStarted,
            "collector",
        ))
        .await
        .unwrap();

        let events = log.replay(run_id).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, EventType::RunStarted);
        assert_eq!(events[1].stage, Some(Stage::Collector));
    }

    #[tokio::test]
    async fn test_runs_are_separated() {
        let temp = TempDir::new().unwrap();
        let log = EventLog::new(temp.path());
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        log.emit(&PipelineEvent::new(a, None, EventType::RunStarted, "a"))
            .await
            .unwrap();
        log.emit(&PipelineEvent::new(b, None, EventType::RunStarted, "b"))
            .await
            .unwrap();
        log.emit(&PipelineEvent::new(b, None, EventType::RunCompleted, "b done"))
            .await
            .unwrap();

        assert_eq!(log.replay(a).await.unwrap().len(), 1);
        assert_eq!(log.replay(b).await.unwrap().len(), 2);

        let mut runs = log.list_runs().await.unwrap();
        runs.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(runs, expected);

        let last = log
            .last_event_of_type(b, EventType::RunCompleted)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last.summary, "b done");
    }

    #[tokio::test]
    async fn test_replay_missing_run() {
        let temp = TempDir::new().unwrap();
        let log = EventLog::new(temp.path().join("runs"));
        assert!(log.replay(Uuid::new_v4()).await.unwrap().is_empty());
        assert!(log.list_runs().await.unwrap().is_empty());
    }
}
