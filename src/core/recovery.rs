//! Per-stage recovery after an adapter failure.
//!
//! Recovery runs at most once per failed stage. Anything it produces is
//! marked degraded so downstream consumers can tell a fallback from a real
//! stage result.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{
    ContentDraft, DepthLayer, Document, DocumentContent, DraftSection, KnowledgeSynthesis,
    Platform, PlatformAdaptation, ResearchBrief, Stage, StageData,
};

/// What to do when a stage adapter fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    /// Build a minimal document of the stage's output type from its input
    Placeholder,

    /// Forward the last good data unchanged (tagged degraded)
    PassThrough,

    /// No recovery; the run fails
    Abort,
}

impl Default for RecoveryStrategy {
    fn default() -> Self {
        Self::Placeholder
    }
}

/// Recovery strategy per stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecoveryPolicy {
    /// Strategy used for stages without an override
    #[serde(default)]
    pub default: RecoveryStrategy,

    /// Per-stage overrides
    #[serde(default)]
    pub stages: BTreeMap<Stage, RecoveryStrategy>,
}

impl RecoveryPolicy {
    /// Same strategy for every stage
    pub fn uniform(strategy: RecoveryStrategy) -> Self {
        Self {
            default: strategy,
            stages: BTreeMap::new(),
        }
    }

    /// Override the strategy for one stage
    pub fn with_stage(mut self, stage: Stage, strategy: RecoveryStrategy) -> Self {
        self.stages.insert(stage, strategy);
        self
    }

    pub fn strategy(&self, stage: Stage) -> RecoveryStrategy {
        self.stages.get(&stage).copied().unwrap_or(self.default)
    }

    /// Attempt recovery for a failed stage.
    ///
    /// `input` is the data the stage was given; `platforms` is only consulted
    /// for the adapter stage. Returns `None` when nothing usable can be built.
    pub fn recover(&self, stage: Stage, input: &StageData, platforms: &[Platform]) -> Option<StageData> {
        let strategy = self.strategy(stage);
        debug!(%stage, ?strategy, "Applying recovery strategy");

        let mut recovered = match strategy {
            RecoveryStrategy::Abort => return None,
            RecoveryStrategy::PassThrough => match input {
                StageData::Topic(_) => return None,
                other => other.clone(),
            },
            RecoveryStrategy::Placeholder => placeholder(stage, input, platforms)?,
        };

        recovered.for_each_document_mut(Document::mark_degraded);
        Some(recovered)
    }
}

/// Minimal next-stage document derived from the stage input
fn placeholder(stage: Stage, input: &StageData, platforms: &[Platform]) -> Option<StageData> {
    match (stage, input) {
        (Stage::Collector, StageData::Topic(seed)) => {
            let brief = ResearchBrief::new(seed.topic.clone(), Vec::new());
            Some(Document::research_brief(brief).into())
        }
        (Stage::Scholar, StageData::Document(doc)) => {
            let DocumentContent::ResearchBrief(brief) = &doc.content else {
                return None;
            };
            let summary = if brief.insights.is_empty() {
                brief.topic.clone()
            } else {
                brief
                    .insights
                    .iter()
                    .map(|i| i.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            let synthesis = KnowledgeSynthesis::new(
                doc.id.clone(),
                brief.topic.clone(),
                vec![DepthLayer::new(1, "Overview", summary)],
                0.0,
            );
            Some(Document::knowledge_synthesis(synthesis).into())
        }
        (Stage::Creator, StageData::Document(doc)) => {
            let DocumentContent::KnowledgeSynthesis(synthesis) = &doc.content else {
                return None;
            };
            let sections: Vec<DraftSection> = synthesis
                .depth_layers
                .iter()
                .map(|l| DraftSection::new(l.title.clone(), l.content.clone()))
                .collect();
            let content = sections
                .iter()
                .map(|s| s.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            let draft = ContentDraft::new(
                doc.id.clone(),
                synthesis.concept.clone(),
                content,
                sections,
                0.0,
            );
            Some(Document::content_draft(draft).into())
        }
        (Stage::Adapter, StageData::Document(doc)) => {
            let DocumentContent::ContentDraft(draft) = &doc.content else {
                return None;
            };
            if platforms.is_empty() {
                return None;
            }
            let adaptations = platforms
                .iter()
                .map(|&platform| {
                    let adapted = truncate_chars(&draft.content, platform.character_limit());
                    Document::platform_adaptation(PlatformAdaptation::new(
                        doc.id.clone(),
                        platform,
                        draft.content.clone(),
                        adapted,
                        Vec::new(),
                        0.0,
                    ))
                })
                .collect();
            Some(StageData::Documents(adaptations))
        }
        _ => None,
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Insight, SignalScores, TopicSeed};

    fn brief_data() -> StageData {
        Document::research_brief(ResearchBrief::new(
            "traits",
            vec![Insight::new("dyn vs impl", "book", SignalScores::new(0.5, 0.5, 0.5, 0.5))],
        ))
        .into()
    }

    #[test]
    fn test_default_is_placeholder() {
        let policy = RecoveryPolicy::default();
        assert_eq!(policy.strategy(Stage::Scholar), RecoveryStrategy::Placeholder);

        let policy = policy.with_stage(Stage::Scholar, RecoveryStrategy::Abort);
        assert_eq!(policy.strategy(Stage::Scholar), RecoveryStrategy::Abort);
        assert_eq!(policy.strategy(Stage::Creator), RecoveryStrategy::Placeholder);
    }

    #[test]
    fn test_collector_placeholder_from_topic() {
        let policy = RecoveryPolicy::default();
        let seed = StageData::Topic(TopicSeed::new("borrowing"));

        let recovered = policy.recover(Stage::Collector, &seed, &[]).unwrap();
        let doc = recovered.primary().unwrap();
        assert!(doc.is_degraded());
        assert_eq!(recovered.topic(), Some("borrowing"));
    }

    #[test]
    fn test_scholar_placeholder_links_predecessor() {
        let policy = RecoveryPolicy::default();
        let input = brief_data();
        let brief_id = input.primary().unwrap().id.clone();

        let recovered = policy.recover(Stage::Scholar, &input, &[]).unwrap();
        let doc = recovered.primary().unwrap();
        assert_eq!(doc.predecessor(), Some(brief_id.as_str()));
        assert_eq!(recovered.doc_type(), Some(Stage::Scholar.output_type()));
    }

    #[test]
    fn test_adapter_placeholder_respects_limits() {
        let policy = RecoveryPolicy::default();
        let draft: StageData = Document::content_draft(ContentDraft::new(
            "synthesis-1",
            "Title",
            "x".repeat(500),
            Vec::new(),
            0.8,
        ))
        .into();

        let recovered = policy
            .recover(Stage::Adapter, &draft, &[Platform::Twitter, Platform::LinkedIn])
            .unwrap();
        let docs = recovered.documents();
        assert_eq!(docs.len(), 2);
        match &docs[0].content {
            DocumentContent::PlatformAdaptation(a) => assert_eq!(a.character_count, 280),
            other => panic!("unexpected content: {:?}", other),
        }
    }

    #[test]
    fn test_pass_through_marks_degraded() {
        let policy = RecoveryPolicy::uniform(RecoveryStrategy::PassThrough);
        let input = brief_data();

        let recovered = policy.recover(Stage::Scholar, &input, &[]).unwrap();
        let doc = recovered.primary().unwrap();
        assert_eq!(doc.id, input.primary().unwrap().id);
        assert!(doc.is_degraded());
        assert_eq!(doc.version, 2);
    }

    #[test]
    fn test_mismatched_input_cannot_recover() {
        let policy = RecoveryPolicy::default();
        assert!(policy.recover(Stage::Creator, &brief_data(), &[]).is_none());
        assert!(RecoveryPolicy::uniform(RecoveryStrategy::Abort)
            .recover(Stage::Scholar, &brief_data(), &[])
            .is_none());
    }
}
