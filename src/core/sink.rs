//! Observers for pipeline events.
//!
//! The orchestrator emits events to every registered sink. Sink failures
//! are logged and otherwise ignored; they never affect a run.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use crate::domain::PipelineEvent;

/// Receives pipeline events
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: &PipelineEvent) -> Result<()>;
}

/// Logs events through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl EventSink for TracingSink {
    async fn emit(&self, event: &PipelineEvent) -> Result<()> {
        let stage = event.stage.map(|s| s.as_str()).unwrap_or("-");
        let kind = event.event_type;

        if kind.is_error() {
            error!(run_id = %event.run_id, stage, event = ?kind, error = ?event.error, "{}", event.summary);
        } else if kind.is_warning() {
            warn!(run_id = %event.run_id, stage, event = ?kind, "{}", event.summary);
        } else {
            info!(run_id = %event.run_id, stage, event = ?kind, duration_ms = ?event.duration_ms, "{}", event.summary);
        }
        Ok(())
    }
}

/// Forwards events over an unbounded channel (UI observers, tests)
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: UnboundedSender<PipelineEvent>,
}

impl ChannelSink {
    pub fn new(sender: UnboundedSender<PipelineEvent>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&self, event: &PipelineEvent) -> Result<()> {
        self.sender
            .send(event.clone())
            .map_err(|_| anyhow::anyhow!("Event channel closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EventType;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = ChannelSink::new(tx);
        let event = PipelineEvent::new(Uuid::new_v4(), None, EventType::Paused, "paused");

        sink.emit(&event).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, event.id);
    }

    #[tokio::test]
    async fn test_channel_sink_closed() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let sink = ChannelSink::new(tx);
        let event = PipelineEvent::new(Uuid::new_v4(), None, EventType::Resumed, "resumed");
        assert!(sink.emit(&event).await.is_err());
    }

    #[tokio::test]
    async fn test_tracing_sink_never_fails() {
        let event = PipelineEvent::new(Uuid::new_v4(), None, EventType::RunFailed, "failed")
            .with_error("boom".to_string());
        assert!(TracingSink.emit(&event).await.is_ok());
    }
}
