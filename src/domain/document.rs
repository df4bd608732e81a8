//! Documents flowing through the pipeline.
//!
//! Every stage produces exactly one document type. The set of types is closed:
//! a `Document` is the shared envelope (identity, timestamps, version,
//! metadata) around one of four stage payloads.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stage::{Platform, Stage};

/// Reading speed used to derive draft reading time
pub const WORDS_PER_MINUTE: u32 = 200;

/// Tag attached to documents produced by a recovery strategy
pub const DEGRADED_TAG: &str = "degraded";

/// A typed unit of work passed between stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier, generated by the producing stage
    pub id: String,

    /// When the document was created
    pub created: DateTime<Utc>,

    /// When the document was last modified (never before `created`)
    pub modified: DateTime<Utc>,

    /// Starts at 1, incremented on every mutation
    pub version: u32,

    /// Producing stage, processing status and tags
    pub metadata: DocumentMetadata,

    /// Stage-specific payload, tagged by `type`
    #[serde(flatten)]
    pub content: DocumentContent,
}

impl Document {
    /// Create a fresh version-1 document for a stage payload
    pub fn new(content: DocumentContent) -> Self {
        let now = Utc::now();
        let doc_type = content.doc_type();
        Self {
            id: format!("{}-{}", doc_type.id_prefix(), Uuid::new_v4()),
            created: now,
            modified: now,
            version: 1,
            metadata: DocumentMetadata::new(doc_type.producing_stage()),
            content,
        }
    }

    pub fn research_brief(brief: ResearchBrief) -> Self {
        Self::new(DocumentContent::ResearchBrief(brief))
    }

    pub fn knowledge_synthesis(synthesis: KnowledgeSynthesis) -> Self {
        Self::new(DocumentContent::KnowledgeSynthesis(synthesis))
    }

    pub fn content_draft(draft: ContentDraft) -> Self {
        Self::new(DocumentContent::ContentDraft(draft))
    }

    pub fn platform_adaptation(adaptation: PlatformAdaptation) -> Self {
        Self::new(DocumentContent::PlatformAdaptation(adaptation))
    }

    /// Add a tag (no duplicates)
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.metadata.tags.contains(&tag) {
            self.metadata.tags.push(tag);
        }
        self
    }

    /// Set the confidence score carried in metadata
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.metadata.confidence = Some(confidence);
        self
    }

    pub fn doc_type(&self) -> DocumentType {
        self.content.doc_type()
    }

    /// Id of the document this one was derived from (`None` for briefs)
    pub fn predecessor(&self) -> Option<&str> {
        match &self.content {
            DocumentContent::ResearchBrief(_) => None,
            DocumentContent::KnowledgeSynthesis(s) => Some(&s.brief_id),
            DocumentContent::ContentDraft(d) => Some(&d.synthesis_id),
            DocumentContent::PlatformAdaptation(a) => Some(&a.draft_id),
        }
    }

    /// Record a mutation: bump version and modified timestamp
    pub fn touch(&mut self) {
        self.version = self.version.saturating_add(1);
        let now = Utc::now();
        self.modified = if now < self.created { self.created } else { now };
    }

    /// Mark this document as produced by a fallback path
    pub fn mark_degraded(&mut self) {
        self.metadata.status = ProcessingStatus::Degraded;
        if !self.metadata.tags.iter().any(|t| t == DEGRADED_TAG) {
            self.metadata.tags.push(DEGRADED_TAG.to_string());
        }
        self.touch();
    }

    pub fn is_degraded(&self) -> bool {
        self.metadata.status == ProcessingStatus::Degraded
    }

    /// Stage-level quality score used by gates and run metrics
    pub fn quality_score(&self) -> f64 {
        match &self.content {
            DocumentContent::ResearchBrief(b) => b.signal_score,
            DocumentContent::KnowledgeSynthesis(s) => s.confidence,
            DocumentContent::ContentDraft(d) => d.engagement_score,
            DocumentContent::PlatformAdaptation(a) => a.platform_fit,
        }
    }

    /// Free-text body persisted after the metadata header
    pub fn body_text(&self) -> String {
        match &self.content {
            DocumentContent::ResearchBrief(b) => b
                .insights
                .iter()
                .map(|i| format!("- {} ({})", i.text, i.source))
                .collect::<Vec<_>>()
                .join("\n"),
            DocumentContent::KnowledgeSynthesis(s) => s
                .depth_layers
                .iter()
                .map(|l| format!("## Level {}: {}\n\n{}", l.level, l.title, l.content))
                .collect::<Vec<_>>()
                .join("\n\n"),
            DocumentContent::ContentDraft(d) => d.content.clone(),
            DocumentContent::PlatformAdaptation(a) => a.adapted.clone(),
        }
    }
}

/// Metadata common to every document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Stage that produced the document
    pub stage: Stage,

    /// Processing status
    pub status: ProcessingStatus,

    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Optional confidence score (0-1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl DocumentMetadata {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            status: ProcessingStatus::Completed,
            tags: Vec::new(),
            confidence: None,
        }
    }
}

/// Processing status of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    /// Produced by a recovery strategy instead of the stage itself
    Degraded,
}

impl ProcessingStatus {
    pub const ALL: [ProcessingStatus; 5] = [
        ProcessingStatus::Pending,
        ProcessingStatus::Processing,
        ProcessingStatus::Completed,
        ProcessingStatus::Failed,
        ProcessingStatus::Degraded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
            ProcessingStatus::Degraded => "degraded",
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| anyhow::anyhow!("Unknown processing status: {}", s))
    }
}

/// The closed set of document types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    ResearchBrief,
    KnowledgeSynthesis,
    ContentDraft,
    PlatformAdaptation,
}

impl DocumentType {
    pub const ALL: [DocumentType; 4] = [
        DocumentType::ResearchBrief,
        DocumentType::KnowledgeSynthesis,
        DocumentType::ContentDraft,
        DocumentType::PlatformAdaptation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::ResearchBrief => "research_brief",
            DocumentType::KnowledgeSynthesis => "knowledge_synthesis",
            DocumentType::ContentDraft => "content_draft",
            DocumentType::PlatformAdaptation => "platform_adaptation",
        }
    }

    fn id_prefix(&self) -> &'static str {
        match self {
            DocumentType::ResearchBrief => "brief",
            DocumentType::KnowledgeSynthesis => "synthesis",
            DocumentType::ContentDraft => "draft",
            DocumentType::PlatformAdaptation => "adaptation",
        }
    }

    pub fn producing_stage(&self) -> Stage {
        match self {
            DocumentType::ResearchBrief => Stage::Collector,
            DocumentType::KnowledgeSynthesis => Stage::Scholar,
            DocumentType::ContentDraft => Stage::Creator,
            DocumentType::PlatformAdaptation => Stage::Adapter,
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| anyhow::anyhow!("Unknown document type: {}", s))
    }
}

/// Stage payload, internally tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentContent {
    ResearchBrief(ResearchBrief),
    KnowledgeSynthesis(KnowledgeSynthesis),
    ContentDraft(ContentDraft),
    PlatformAdaptation(PlatformAdaptation),
}

impl DocumentContent {
    pub fn doc_type(&self) -> DocumentType {
        match self {
            DocumentContent::ResearchBrief(_) => DocumentType::ResearchBrief,
            DocumentContent::KnowledgeSynthesis(_) => DocumentType::KnowledgeSynthesis,
            DocumentContent::ContentDraft(_) => DocumentType::ContentDraft,
            DocumentContent::PlatformAdaptation(_) => DocumentType::PlatformAdaptation,
        }
    }
}

// ============================================================================
// Stage payloads
// ============================================================================

/// Collector output: scored insights about a topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchBrief {
    pub topic: String,

    #[serde(default)]
    pub insights: Vec<Insight>,

    /// Mean of the insight aggregate scores
    pub signal_score: f64,
}

impl ResearchBrief {
    pub fn new(topic: impl Into<String>, insights: Vec<Insight>) -> Self {
        let signal_score = Self::combine(&insights);
        Self {
            topic: topic.into(),
            insights,
            signal_score,
        }
    }

    /// Declared combination of insight scores into the brief signal score
    pub fn combine(insights: &[Insight]) -> f64 {
        if insights.is_empty() {
            return 0.0;
        }
        insights.iter().map(|i| i.score).sum::<f64>() / insights.len() as f64
    }
}

/// A single sourced insight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub text: String,
    pub source: String,
    pub scores: SignalScores,

    /// Aggregate of `scores`
    pub score: f64,
}

impl Insight {
    pub fn new(text: impl Into<String>, source: impl Into<String>, scores: SignalScores) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            score: scores.aggregate(),
            scores,
        }
    }
}

/// Four independent 0-1 scoring axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalScores {
    pub reach: f64,
    pub impact: f64,
    pub confidence: f64,
    /// Inverse effort: 1.0 means trivial to act on
    pub effort: f64,
}

impl SignalScores {
    pub fn new(reach: f64, impact: f64, confidence: f64, effort: f64) -> Self {
        Self {
            reach,
            impact,
            confidence,
            effort,
        }
    }

    /// Arithmetic mean of the four axes
    pub fn aggregate(&self) -> f64 {
        (self.reach + self.impact + self.confidence + self.effort) / 4.0
    }
}

/// Scholar output: layered understanding of the topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSynthesis {
    pub brief_id: String,
    pub concept: String,

    #[serde(default)]
    pub depth_layers: Vec<DepthLayer>,

    /// Deepest layer reached (0 when there are no layers)
    pub depth_level: u8,

    pub confidence: f64,
}

impl KnowledgeSynthesis {
    pub fn new(
        brief_id: impl Into<String>,
        concept: impl Into<String>,
        depth_layers: Vec<DepthLayer>,
        confidence: f64,
    ) -> Self {
        let depth_level = depth_layers.iter().map(|l| l.level).max().unwrap_or(0);
        Self {
            brief_id: brief_id.into(),
            concept: concept.into(),
            depth_layers,
            depth_level,
            confidence,
        }
    }
}

/// One depth layer (levels 1-5)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthLayer {
    pub level: u8,
    pub title: String,
    pub content: String,
}

impl DepthLayer {
    pub fn new(level: u8, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Creator output: long-form draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentDraft {
    pub synthesis_id: String,
    pub title: String,
    pub content: String,
    pub word_count: u32,

    /// Minutes, derived from `word_count`
    pub reading_time: u32,

    #[serde(default)]
    pub sections: Vec<DraftSection>,

    pub engagement_score: f64,
}

impl ContentDraft {
    pub fn new(
        synthesis_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        sections: Vec<DraftSection>,
        engagement_score: f64,
    ) -> Self {
        let content = content.into();
        let word_count = count_words(&content);
        Self {
            synthesis_id: synthesis_id.into(),
            title: title.into(),
            reading_time: reading_time(word_count),
            word_count,
            content,
            sections,
            engagement_score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSection {
    pub title: String,
    pub content: String,
}

impl DraftSection {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Adapter output: a draft reshaped for one platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformAdaptation {
    pub draft_id: String,
    pub platform: Platform,
    pub original: String,
    pub adapted: String,
    pub character_count: u32,

    #[serde(default)]
    pub hashtags: Vec<String>,

    pub platform_fit: f64,
}

impl PlatformAdaptation {
    pub fn new(
        draft_id: impl Into<String>,
        platform: Platform,
        original: impl Into<String>,
        adapted: impl Into<String>,
        hashtags: Vec<String>,
        platform_fit: f64,
    ) -> Self {
        let adapted = adapted.into();
        Self {
            draft_id: draft_id.into(),
            platform,
            original: original.into(),
            character_count: adapted.chars().count() as u32,
            adapted,
            hashtags,
            platform_fit,
        }
    }
}

pub fn count_words(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

/// Reading time in whole minutes (at least 1 for non-empty text)
pub fn reading_time(word_count: u32) -> u32 {
    word_count.div_ceil(WORDS_PER_MINUTE)
}

// ============================================================================
// Pipeline carriers
// ============================================================================

/// The user-supplied topic wrapped as the pipeline's starting point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicSeed {
    pub id: String,
    pub topic: String,
    pub created: DateTime<Utc>,
}

impl TopicSeed {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            id: format!("seed-{}", Uuid::new_v4()),
            topic: topic.into(),
            created: Utc::now(),
        }
    }
}

/// What a stage consumes and produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StageData {
    /// Pipeline input before the first stage
    Topic(TopicSeed),

    /// A single stage document
    Document(Document),

    /// One document per target (e.g. platform adaptations)
    Documents(Vec<Document>),
}

impl StageData {
    /// All documents carried (empty for a topic)
    pub fn documents(&self) -> Vec<&Document> {
        match self {
            StageData::Topic(_) => Vec::new(),
            StageData::Document(doc) => vec![doc],
            StageData::Documents(docs) => docs.iter().collect(),
        }
    }

    /// The single document, or the first of a batch
    pub fn primary(&self) -> Option<&Document> {
        self.documents().into_iter().next()
    }

    /// Document type carried, if any and if uniform
    pub fn doc_type(&self) -> Option<DocumentType> {
        let docs = self.documents();
        let first = docs.first()?.doc_type();
        docs.iter().all(|d| d.doc_type() == first).then_some(first)
    }

    /// The topic this data ultimately derives from, when still known
    pub fn topic(&self) -> Option<&str> {
        match self {
            StageData::Topic(seed) => Some(&seed.topic),
            _ => match self.primary().map(|d| &d.content) {
                Some(DocumentContent::ResearchBrief(b)) => Some(&b.topic),
                Some(DocumentContent::KnowledgeSynthesis(s)) => Some(&s.concept),
                Some(DocumentContent::ContentDraft(d)) => Some(&d.title),
                _ => None,
            },
        }
    }

    /// Apply `f` to every carried document
    pub fn for_each_document_mut(&mut self, mut f: impl FnMut(&mut Document)) {
        match self {
            StageData::Topic(_) => {}
            StageData::Document(doc) => f(doc),
            StageData::Documents(docs) => docs.iter_mut().for_each(f),
        }
    }
}

impl From<Document> for StageData {
    fn from(doc: Document) -> Self {
        StageData::Document(doc)
    }
}
