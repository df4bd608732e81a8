//! Document index.
//!
//! JSON lookup table from document id to type, storage path, timestamps,
//! stage, status, tags and the predecessor ids it was derived from.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::domain::{Document, DocumentType, ProcessingStatus, Stage};

/// Index of persisted documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentIndex {
    /// Index format version
    pub version: u32,

    /// Entries keyed by document id
    #[serde(default)]
    pub entries: BTreeMap<String, IndexEntry>,
}

impl Default for DocumentIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentIndex {
    pub fn new() -> Self {
        Self {
            version: 1,
            entries: BTreeMap::new(),
        }
    }

    /// Load an index file (empty index if it does not exist yet)
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read index: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse index JSON")
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write index: {}", path.display()))?;

        Ok(())
    }

    /// Synchronous `load`, for callers already holding the index lock
    pub fn load_blocking(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read index: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse index JSON")
    }

    /// Synchronous `save`, for callers already holding the index lock
    pub fn save_blocking(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Write then rename so unlocked readers never see a partial index
        let content = serde_json::to_string_pretty(self)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write index: {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to replace index: {}", path.display()))?;

        Ok(())
    }

    /// Insert or replace the entry for its id
    pub fn upsert(&mut self, entry: IndexEntry) {
        self.entries.insert(entry.id.clone(), entry);
    }

    pub fn get(&self, id: &str) -> Option<&IndexEntry> {
        self.entries.get(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<IndexEntry> {
        self.entries.remove(id)
    }

    /// Exact match on type/stage/status; every listed tag must be present
    pub fn search(&self, criteria: &SearchCriteria) -> Vec<&IndexEntry> {
        self.entries
            .values()
            .filter(|entry| criteria.matches(entry))
            .collect()
    }

    /// Entries derived directly from `id`
    pub fn references_to(&self, id: &str) -> Vec<&IndexEntry> {
        self.entries
            .values()
            .filter(|entry| entry.references.iter().any(|r| r == id))
            .collect()
    }

    /// Walk predecessor references from `id` back to the root document.
    ///
    /// The first element is `id` itself. Stops at missing entries and cycles.
    pub fn lineage(&self, id: &str) -> Vec<&IndexEntry> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.entries.get(id);

        while let Some(entry) = current {
            if !seen.insert(entry.id.as_str()) {
                break;
            }
            chain.push(entry);
            current = entry
                .references
                .first()
                .and_then(|parent| self.entries.get(parent));
        }

        chain
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One indexed document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,

    #[serde(rename = "type")]
    pub doc_type: DocumentType,

    /// Storage path, relative to the store root
    pub path: PathBuf,

    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub stage: Stage,
    pub status: ProcessingStatus,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Predecessor document ids
    #[serde(default)]
    pub references: Vec<String>,

    /// SHA-256 of the persisted body (hex), for drift detection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_sha256: Option<String>,
}

impl IndexEntry {
    pub fn from_document(document: &Document, path: impl Into<PathBuf>) -> Self {
        Self {
            id: document.id.clone(),
            doc_type: document.doc_type(),
            path: path.into(),
            created: document.created,
            modified: document.modified,
            stage: document.metadata.stage,
            status: document.metadata.status,
            tags: document.metadata.tags.clone(),
            references: document.predecessor().map(str::to_string).into_iter().collect(),
            body_sha256: None,
        }
    }

    pub fn with_body_hash(mut self, hash: impl Into<String>) -> Self {
        self.body_sha256 = Some(hash.into());
        self
    }
}

/// Filter for `DocumentIndex::search`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchCriteria {
    pub doc_type: Option<DocumentType>,
    pub stage: Option<Stage>,
    pub status: Option<ProcessingStatus>,

    /// All must be present (AND)
    pub tags: Vec<String>,
}

impl SearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, doc_type: DocumentType) -> Self {
        self.doc_type = Some(doc_type);
        self
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_status(mut self, status: ProcessingStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn matches(&self, entry: &IndexEntry) -> bool {
        self.doc_type.map_or(true, |t| entry.doc_type == t)
            && self.stage.map_or(true, |s| entry.stage == s)
            && self.status.map_or(true, |s| entry.status == s)
            && self.tags.iter().all(|tag| entry.tags.contains(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContentDraft, KnowledgeSynthesis, ResearchBrief};
    use tempfile::TempDir;

    fn chain() -> (Document, Document, Document) {
        let brief = Document::research_brief(ResearchBrief::new("topic", Vec::new()))
            .with_tag("rust")
            .with_tag("async");
        let synthesis = Document::knowledge_synthesis(KnowledgeSynthesis::new(
            brief.id.clone(),
            "topic",
            Vec::new(),
            0.5,
        ))
        .with_tag("rust");
        let draft = Document::content_draft(ContentDraft::new(
            synthesis.id.clone(),
            "Title",
            "body",
            Vec::new(),
            0.5,
        ));
        (brief, synthesis, draft)
    }

    fn index_of(docs: &[&Document]) -> DocumentIndex {
        let mut index = DocumentIndex::new();
        for doc in docs {
            index.upsert(IndexEntry::from_document(doc, format!("{}.md", doc.id)));
        }
        index
    }

    #[test]
    fn test_search_tags_use_and_semantics() {
        let (brief, synthesis, draft) = chain();
        let index = index_of(&[&brief, &synthesis, &draft]);

        let rust = SearchCriteria::new().with_tag("rust");
        assert_eq!(index.search(&rust).len(), 2);

        let both = SearchCriteria::new().with_tag("rust").with_tag("async");
        let results = index.search(&both);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, brief.id);

        let none = SearchCriteria::new().with_tag("rust").with_tag("python");
        assert!(index.search(&none).is_empty());
    }

    #[test]
    fn test_search_exact_fields() {
        let (brief, synthesis, draft) = chain();
        let index = index_of(&[&brief, &synthesis, &draft]);

        let drafts = SearchCriteria::new().with_type(DocumentType::ContentDraft);
        assert_eq!(index.search(&drafts).len(), 1);

        let scholar = SearchCriteria::new()
            .with_stage(Stage::Scholar)
            .with_status(ProcessingStatus::Completed);
        assert_eq!(index.search(&scholar)[0].id, synthesis.id);

        let degraded = SearchCriteria::new().with_status(ProcessingStatus::Degraded);
        assert!(index.search(&degraded).is_empty());

        assert_eq!(index.search(&SearchCriteria::new()).len(), 3);
    }

    #[test]
    fn test_lineage_and_references() {
        let (brief, synthesis, draft) = chain();
        let index = index_of(&[&brief, &synthesis, &draft]);

        let lineage: Vec<_> = index.lineage(&draft.id).iter().map(|e| e.id.clone()).collect();
        assert_eq!(lineage, vec![draft.id.clone(), synthesis.id.clone(), brief.id.clone()]);

        let children = index.references_to(&brief.id);
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, synthesis.id);

        assert!(index.lineage("missing").is_empty());
    }

    #[test]
    fn test_upsert_and_remove() {
        let (brief, _, _) = chain();
        let mut index = index_of(&[&brief]);
        index.upsert(IndexEntry::from_document(&brief, "moved.md"));

        assert_eq!(index.len(), 1);
        assert_eq!(index.get(&brief.id).unwrap().path, PathBuf::from("moved.md"));
        assert!(index.remove(&brief.id).is_some());
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("index.json");
        let (brief, synthesis, _) = chain();
        let index = index_of(&[&brief, &synthesis]);

        index.save(&path).await.unwrap();
        let loaded = DocumentIndex::load(&path).await.unwrap();
        assert_eq!(loaded, index);

        let missing = DocumentIndex::load(&temp.path().join("none.json")).await.unwrap();
        assert!(missing.is_empty());
    }
}
