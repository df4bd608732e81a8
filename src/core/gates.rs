//! Quality gates for stage outputs.
//!
//! A gate is a stage-specific threshold check on what a stage produced.
//! Gate failures are advisory: the orchestrator reports them and carries on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{DocumentContent, Stage, StageData};

/// Thresholds for each stage's quality gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Minimum brief signal score (default: 0.6)
    #[serde(default = "default_min_signal_score")]
    pub min_signal_score: f64,

    /// Minimum number of insights in a brief (default: 3)
    #[serde(default = "default_min_insights")]
    pub min_insights: usize,

    /// Minimum synthesis confidence (default: 0.7)
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Minimum depth level a synthesis must reach (default: 3)
    #[serde(default = "default_min_depth")]
    pub min_depth: u8,

    /// Minimum draft engagement score (default: 0.7)
    #[serde(default = "default_min_engagement")]
    pub min_engagement: f64,

    /// Minimum platform fit for every adaptation (default: 0.8)
    #[serde(default = "default_min_platform_fit")]
    pub min_platform_fit: f64,
}

fn default_min_signal_score() -> f64 {
    0.6
}
fn default_min_insights() -> usize {
    3
}
fn default_min_confidence() -> f64 {
    0.7
}
fn default_min_depth() -> u8 {
    3
}
fn default_min_engagement() -> f64 {
    0.7
}
fn default_min_platform_fit() -> f64 {
    0.8
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_signal_score: default_min_signal_score(),
            min_insights: default_min_insights(),
            min_confidence: default_min_confidence(),
            min_depth: default_min_depth(),
            min_engagement: default_min_engagement(),
            min_platform_fit: default_min_platform_fit(),
        }
    }
}

impl QualityThresholds {
    /// Evaluate a stage's output against its gate.
    ///
    /// Returns the stage quality score on success, or every violated
    /// threshold on failure.
    pub fn check(&self, stage: Stage, output: &StageData) -> Result<f64, GateFailure> {
        let documents = output.documents();
        if documents.is_empty() {
            return Err(GateFailure {
                stage,
                score: 0.0,
                violations: vec![GateViolation::NoOutput],
            });
        }

        let mut violations = Vec::new();
        for document in &documents {
            match &document.content {
                DocumentContent::ResearchBrief(brief) => {
                    if brief.signal_score < self.min_signal_score {
                        violations.push(GateViolation::SignalScore {
                            actual: brief.signal_score,
                            minimum: self.min_signal_score,
                        });
                    }
                    if brief.insights.len() < self.min_insights {
                        violations.push(GateViolation::InsightCount {
                            actual: brief.insights.len(),
                            minimum: self.min_insights,
                        });
                    }
                }
                DocumentContent::KnowledgeSynthesis(synthesis) => {
                    if synthesis.confidence < self.min_confidence {
                        violations.push(GateViolation::Confidence {
                            actual: synthesis.confidence,
                            minimum: self.min_confidence,
                        });
                    }
                    if synthesis.depth_level < self.min_depth {
                        violations.push(GateViolation::Depth {
                            actual: synthesis.depth_level,
                            minimum: self.min_depth,
                        });
                    }
                }
                DocumentContent::ContentDraft(draft) => {
                    if draft.engagement_score < self.min_engagement {
                        violations.push(GateViolation::Engagement {
                            actual: draft.engagement_score,
                            minimum: self.min_engagement,
                        });
                    }
                }
                DocumentContent::PlatformAdaptation(adaptation) => {
                    if adaptation.platform_fit < self.min_platform_fit {
                        violations.push(GateViolation::PlatformFit {
                            platform: adaptation.platform.to_string(),
                            actual: adaptation.platform_fit,
                            minimum: self.min_platform_fit,
                        });
                    }
                }
            }
        }

        let score = quality_score(output);
        if violations.is_empty() {
            Ok(score)
        } else {
            Err(GateFailure {
                stage,
                score,
                violations,
            })
        }
    }
}

/// Mean quality score over the documents a stage produced
pub fn quality_score(output: &StageData) -> f64 {
    let documents = output.documents();
    if documents.is_empty() {
        return 0.0;
    }
    documents.iter().map(|d| d.quality_score()).sum::<f64>() / documents.len() as f64
}

/// A failed quality gate
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Quality gate failed for '{stage}' (score {score:.2}): {}", describe(.violations))]
pub struct GateFailure {
    pub stage: Stage,
    pub score: f64,
    pub violations: Vec<GateViolation>,
}

fn describe(violations: &[GateViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A single threshold that was not met
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GateViolation {
    #[error("stage produced no documents")]
    NoOutput,

    #[error("signal score {actual:.2} < {minimum:.2}")]
    SignalScore { actual: f64, minimum: f64 },

    #[error("{actual} insights < {minimum}")]
    InsightCount { actual: usize, minimum: usize },

    #[error("confidence {actual:.2} < {minimum:.2}")]
    Confidence { actual: f64, minimum: f64 },

    #[error("depth {actual} < {minimum}")]
    Depth { actual: u8, minimum: u8 },

    #[error("engagement {actual:.2} < {minimum:.2}")]
    Engagement { actual: f64, minimum: f64 },

    #[error("{platform} fit {actual:.2} < {minimum:.2}")]
    PlatformFit {
        platform: String,
        actual: f64,
        minimum: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ContentDraft, Document, Insight, Platform, PlatformAdaptation, ResearchBrief,
        SignalScores, TopicSeed,
    };

    fn brief(insights: usize, score: f64) -> StageData {
        let insights = (0..insights)
            .map(|i| {
                Insight::new(
                    format!("insight {}", i),
                    "source",
                    SignalScores::new(score, score, score, score),
                )
            })
            .collect();
        Document::research_brief(ResearchBrief::new("topic", insights)).into()
    }

    #[test]
    fn test_default_thresholds() {
        let gates = QualityThresholds::default();
        assert_eq!(gates.min_insights, 3);
        assert_eq!(gates.min_depth, 3);
        assert_eq!(gates.min_platform_fit, 0.8);
    }

    #[test]
    fn test_brief_gate() {
        let gates = QualityThresholds::default();

        let score = gates.check(Stage::Collector, &brief(3, 0.8)).unwrap();
        assert!((score - 0.8).abs() < 1e-9);

        let failure = gates.check(Stage::Collector, &brief(1, 0.4)).unwrap_err();
        assert_eq!(failure.violations.len(), 2);
        assert!(failure.to_string().contains("collector"));
    }

    #[test]
    fn test_draft_gate() {
        let gates = QualityThresholds::default();
        let draft: StageData = Document::content_draft(ContentDraft::new(
            "synthesis-1",
            "Title",
            "body",
            Vec::new(),
            0.5,
        ))
        .into();

        let failure = gates.check(Stage::Creator, &draft).unwrap_err();
        assert!(matches!(failure.violations[0], GateViolation::Engagement { .. }));
    }

    #[test]
    fn test_adaptation_gate_checks_every_platform() {
        let gates = QualityThresholds::default();
        let batch = StageData::Documents(vec![
            Document::platform_adaptation(PlatformAdaptation::new(
                "d", Platform::Twitter, "o", "a", Vec::new(), 0.9,
            )),
            Document::platform_adaptation(PlatformAdaptation::new(
                "d", Platform::LinkedIn, "o", "a", Vec::new(), 0.5,
            )),
        ]);

        let failure = gates.check(Stage::Adapter, &batch).unwrap_err();
        assert_eq!(failure.violations.len(), 1);
        assert!((failure.score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_topic_has_no_output() {
        let gates = QualityThresholds::default();
        let failure = gates
            .check(Stage::Collector, &StageData::Topic(TopicSeed::new("x")))
            .unwrap_err();
        assert_eq!(failure.violations, vec![GateViolation::NoOutput]);
    }
}
