//! Fabric-backed stage adapters.
//!
//! Each stage runs a Fabric pattern via subprocess (`fabric -p <pattern>`),
//! piping a stage-specific prompt to stdin and shaping stdout into the
//! stage's document type. The per-stage timeout is enforced here; the
//! orchestrator never preempts a stage.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use super::{AgentRegistry, StageAdapter};
use crate::core::StageConfig;
use crate::domain::{
    ContentDraft, DepthLayer, Document, DocumentContent, DraftSection, Insight,
    KnowledgeSynthesis, Platform, PlatformAdaptation, ResearchBrief, SignalScores, Stage,
    StageData,
};

/// Neutral score used for insights Fabric does not score itself
const NEUTRAL_SCORE: f64 = 0.5;

/// Thin wrapper over the `fabric` CLI
#[derive(Debug, Clone)]
pub struct FabricClient {
    /// Path to the fabric binary (default: "fabric")
    binary_path: String,
}

impl Default for FabricClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FabricClient {
    /// Create a client, preferring `fabric-ai` (Homebrew install name)
    pub fn new() -> Self {
        let binary_path = if std::process::Command::new("fabric-ai")
            .arg("--help")
            .output()
            .is_ok()
        {
            "fabric-ai".to_string()
        } else {
            "fabric".to_string()
        };

        Self { binary_path }
    }

    /// Create a client with a custom binary path
    pub fn with_binary_path(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    pub fn binary_path(&self) -> &str {
        &self.binary_path
    }

    /// Run a pattern, feeding `input` on stdin
    pub async fn run_pattern(&self, pattern: &str, input: &str, step_timeout: Duration) -> Result<String> {
        let mut child = Command::new(&self.binary_path)
            .args(["-p", pattern])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn fabric process for pattern '{}'", pattern))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .await
                .context("Failed to write to fabric stdin")?;
            // Drop stdin to signal EOF
        }

        let output = timeout(step_timeout, child.wait_with_output())
            .await
            .with_context(|| {
                format!(
                    "Fabric pattern '{}' timed out after {:?}",
                    pattern, step_timeout
                )
            })?
            .with_context(|| format!("Failed to wait for fabric process for pattern '{}'", pattern))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            anyhow::bail!(
                "Fabric pattern '{}' failed with exit code {}: {}",
                pattern,
                exit_code,
                stderr.trim()
            );
        }

        String::from_utf8(output.stdout).context("Fabric output is not valid UTF-8")
    }

    /// Check that fabric is available and can list patterns
    pub async fn health_check(&self) -> Result<()> {
        let output = Command::new(&self.binary_path)
            .arg("-l")
            .output()
            .await
            .context("Failed to run fabric health check")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Fabric health check failed: {}", stderr);
        }

        Ok(())
    }
}

/// A pipeline stage implemented by one Fabric pattern
#[derive(Debug, Clone)]
pub struct FabricStage {
    stage: Stage,
    pattern: String,
    client: FabricClient,
}

impl FabricStage {
    pub fn new(stage: Stage, pattern: impl Into<String>, client: FabricClient) -> Self {
        Self {
            stage,
            pattern: pattern.into(),
            client,
        }
    }

    /// Pattern used for a stage when none is configured
    pub fn default_pattern(stage: Stage) -> &'static str {
        match stage {
            Stage::Collector => "extract_insights",
            Stage::Scholar => "explain_terms",
            Stage::Creator => "write_essay",
            Stage::Adapter => "create_social_post",
        }
    }

    /// Registry with a Fabric stage for every pipeline stage
    pub fn registry(client: FabricClient) -> AgentRegistry {
        Stage::ALL.into_iter().fold(AgentRegistry::new(), |registry, stage| {
            registry.with(Arc::new(FabricStage::new(
                stage,
                Self::default_pattern(stage),
                client.clone(),
            )))
        })
    }

    async fn collect(&self, topic: &str, max_sources: u32, limit: Duration) -> Result<StageData> {
        let prompt = format!("Topic: {}\nList at most {} key insights as bullet points.", topic, max_sources);
        let output = self.client.run_pattern(&self.pattern, &prompt, limit).await?;

        let source = format!("fabric:{}", self.pattern);
        let insights = bullet_lines(&output)
            .into_iter()
            .take(max_sources as usize)
            .map(|text| {
                let scores = SignalScores::new(NEUTRAL_SCORE, NEUTRAL_SCORE, NEUTRAL_SCORE, NEUTRAL_SCORE);
                Insight::new(text, source.clone(), scores)
            })
            .collect();

        Ok(Document::research_brief(ResearchBrief::new(topic, insights)).into())
    }

    async fn study(&self, brief_doc: &Document, brief: &ResearchBrief, max_depth: u8, limit: Duration) -> Result<StageData> {
        let mut prompt = format!("Concept: {}\nExplain in up to {} layers of depth.\n", brief.topic, max_depth);
        for insight in &brief.insights {
            prompt.push_str(&format!("- {}\n", insight.text));
        }
        let output = self.client.run_pattern(&self.pattern, &prompt, limit).await?;

        let layers: Vec<DepthLayer> = split_sections(&output)
            .into_iter()
            .take(max_depth as usize)
            .enumerate()
            .map(|(i, (title, content))| DepthLayer::new(i as u8 + 1, title, content))
            .collect();
        let confidence = if max_depth == 0 {
            0.0
        } else {
            layers.len() as f64 / max_depth as f64
        };

        let synthesis = KnowledgeSynthesis::new(brief_doc.id.clone(), brief.topic.clone(), layers, confidence);
        Ok(Document::knowledge_synthesis(synthesis).into())
    }

    async fn draft(
        &self,
        synthesis_doc: &Document,
        synthesis: &KnowledgeSynthesis,
        target_words: u32,
        limit: Duration,
    ) -> Result<StageData> {
        let mut prompt = format!("Write about '{}' in roughly {} words.\n\n", synthesis.concept, target_words);
        for layer in &synthesis.depth_layers {
            prompt.push_str(&format!("## {}\n{}\n\n", layer.title, layer.content));
        }
        let output = self.client.run_pattern(&self.pattern, &prompt, limit).await?;

        let title = output
            .lines()
            .find_map(|l| l.strip_prefix("# "))
            .map(|t| t.trim().to_string())
            .unwrap_or_else(|| synthesis.concept.clone());
        let sections = split_sections(&output)
            .into_iter()
            .map(|(title, content)| DraftSection::new(title, content))
            .collect();

        let draft = ContentDraft::new(
            synthesis_doc.id.clone(),
            title,
            output.trim(),
            sections,
            synthesis.confidence,
        );
        Ok(Document::content_draft(draft).into())
    }

    async fn adapt(
        &self,
        draft_doc: &Document,
        draft: &ContentDraft,
        platforms: &[Platform],
        limit: Duration,
    ) -> Result<StageData> {
        if platforms.is_empty() {
            anyhow::bail!("No target platforms configured");
        }

        let mut adaptations = Vec::with_capacity(platforms.len());
        for &platform in platforms {
            let prompt = format!(
                "Platform: {}\nMaximum characters: {}\n\n{}",
                platform,
                platform.character_limit(),
                draft.content
            );
            let output = self.client.run_pattern(&self.pattern, &prompt, limit).await?;
            let adapted = output.trim().to_string();

            let hashtags = adapted
                .split_whitespace()
                .filter(|w| w.starts_with('#') && w.len() > 1)
                .map(str::to_string)
                .collect();
            let chars = adapted.chars().count().max(1);
            let fit = (platform.character_limit() as f64 / chars as f64).min(1.0);

            adaptations.push(Document::platform_adaptation(PlatformAdaptation::new(
                draft_doc.id.clone(),
                platform,
                draft.content.clone(),
                adapted,
                hashtags,
                fit,
            )));
        }

        Ok(StageData::Documents(adaptations))
    }
}

#[async_trait]
impl StageAdapter for FabricStage {
    fn name(&self) -> &str {
        &self.pattern
    }

    fn stage(&self) -> Stage {
        self.stage
    }

    async fn process(&self, input: &StageData, config: &StageConfig) -> Result<StageData> {
        let limit = config.timeout();
        let content = input.primary().map(|d| &d.content);

        match (config, input, content) {
            (StageConfig::Collector(c), StageData::Topic(seed), _) => {
                self.collect(&seed.topic, c.max_sources, limit).await
            }
            (StageConfig::Scholar(c), StageData::Document(doc), Some(DocumentContent::ResearchBrief(brief))) => {
                self.study(doc, brief, c.max_depth, limit).await
            }
            (StageConfig::Creator(c), StageData::Document(doc), Some(DocumentContent::KnowledgeSynthesis(s))) => {
                self.draft(doc, s, c.target_words, limit).await
            }
            (StageConfig::Adapter(c), StageData::Document(doc), Some(DocumentContent::ContentDraft(draft))) => {
                self.adapt(doc, draft, &c.platforms, limit).await
            }
            _ => anyhow::bail!(
                "Stage '{}' cannot process {:?} input",
                self.stage,
                input.doc_type()
            ),
        }
    }
}

/// Bullet or numbered list items, markers stripped
fn bullet_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter_map(|line| {
            let stripped = line
                .strip_prefix("- ")
                .or_else(|| line.strip_prefix("* "))
                .or_else(|| {
                    let (number, rest) = line.split_once(". ")?;
                    number.chars().all(|c| c.is_ascii_digit()).then_some(rest)
                })?;
            let stripped = stripped.trim();
            (!stripped.is_empty()).then(|| stripped.to_string())
        })
        .collect()
}

/// Split markdown on `## ` headings into (title, body) pairs
fn split_sections(text: &str) -> Vec<(String, String)> {
    let mut sections: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if let Some(title) = line.strip_prefix("## ") {
            sections.push((title.trim().to_string(), String::new()));
        } else if let Some((_, body)) = sections.last_mut() {
            if !body.is_empty() || !line.trim().is_empty() {
                body.push_str(line);
                body.push('\n');
            }
        }
    }

    for (_, body) in sections.iter_mut() {
        *body = body.trim_end().to_string();
    }

    if sections.is_empty() && !text.trim().is_empty() {
        sections.push(("Overview".to_string(), text.trim().to_string()));
    }
    sections
}
