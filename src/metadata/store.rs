//! On-disk document store.
//!
//! Documents are persisted through the frontmatter codec:
//!
//! ```text
//! <root>/
//! ├── index.json
//! ├── .index.lock
//! ├── research_brief/<id>.md
//! ├── knowledge_synthesis/<id>.md
//! ├── content_draft/<id>.md
//! └── platform_adaptation/<id>.md
//! ```
//!
//! Index updates are read-modify-write under an exclusive file lock so
//! concurrent writers (CLI and a running pipeline) do not lose entries.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, warn};

use super::frontmatter;
use super::index::{DocumentIndex, IndexEntry};
use crate::domain::{Document, DocumentType};

/// Hex SHA-256 of a document body
pub fn body_sha256(body: &str) -> String {
    hex::encode(Sha256::digest(body.as_bytes()))
}

/// File-backed store of documents plus their index
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join("index.json")
    }

    fn lock_path(&self) -> PathBuf {
        self.root.join(".index.lock")
    }

    /// Path of a document relative to the store root
    pub fn relative_path(doc_type: DocumentType, id: &str) -> PathBuf {
        PathBuf::from(doc_type.as_str()).join(format!("{}.md", id))
    }

    /// Persist a document with its derived body and index it
    pub async fn save(&self, document: &Document) -> Result<PathBuf> {
        let body = document.body_text();
        self.save_with_body(document, &body).await
    }

    /// Persist a document with an explicit body and index it
    pub async fn save_with_body(&self, document: &Document, body: &str) -> Result<PathBuf> {
        let relative = Self::relative_path(document.doc_type(), &document.id);
        let path = self.root.join(&relative);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let text = frontmatter::serialize(document, body)
            .with_context(|| format!("Failed to encode document {}", document.id))?;
        fs::write(&path, text)
            .await
            .with_context(|| format!("Failed to write document: {}", path.display()))?;

        let entry = IndexEntry::from_document(document, relative).with_body_hash(body_sha256(body));
        self.update_index(move |index| index.upsert(entry)).await?;

        debug!(id = %document.id, path = %path.display(), "Stored document");
        Ok(path)
    }

    /// Read the current index
    pub async fn index(&self) -> Result<DocumentIndex> {
        DocumentIndex::load(&self.index_path()).await
    }

    /// Load a document and its body by id
    pub async fn load(&self, id: &str) -> Result<(Document, String)> {
        let index = self.index().await?;
        let entry = index
            .get(id)
            .with_context(|| format!("Document not found: {}", id))?;

        let (document, body) = self.read_file(&self.root.join(&entry.path)).await?;

        if let Some(expected) = &entry.body_sha256 {
            if &body_sha256(&body) != expected {
                warn!(id, "Document body changed since it was indexed");
            }
        }

        Ok((document, body))
    }

    async fn read_file(&self, path: &Path) -> Result<(Document, String)> {
        let text = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read document: {}", path.display()))?;

        frontmatter::parse(&text)
            .with_context(|| format!("Failed to decode document: {}", path.display()))
    }

    /// Rebuild the index from the stored files, returning the entry count
    pub async fn rebuild_index(&self) -> Result<usize> {
        let pattern = format!(
            "{}/*/*.md",
            glob::Pattern::escape(&self.root.to_string_lossy())
        );

        let mut rebuilt = DocumentIndex::new();
        for path in glob::glob(&pattern).context("Invalid document glob pattern")? {
            let path = path.context("Failed to read stored document path")?;

            match self.read_file(&path).await {
                Ok((document, body)) => {
                    let relative = path.strip_prefix(&self.root).unwrap_or(&path).to_path_buf();
                    rebuilt.upsert(
                        IndexEntry::from_document(&document, relative)
                            .with_body_hash(body_sha256(&body)),
                    );
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable document"),
            }
        }

        let count = rebuilt.len();
        self.update_index(move |index| *index = rebuilt).await?;
        Ok(count)
    }

    /// Read-modify-write the index under an exclusive lock.
    ///
    /// `lock_exclusive` blocks the calling thread, so the whole critical
    /// section runs on the blocking pool with synchronous I/O.
    async fn update_index<F>(&self, update: F) -> Result<()>
    where
        F: FnOnce(&mut DocumentIndex) + Send + 'static,
    {
        let root = self.root.clone();
        let lock_path = self.lock_path();
        let index_path = self.index_path();

        tokio::task::spawn_blocking(move || -> Result<()> {
            std::fs::create_dir_all(&root)
                .with_context(|| format!("Failed to create store root: {}", root.display()))?;

            let lock = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)
                .with_context(|| format!("Failed to open index lock: {}", lock_path.display()))?;
            lock.lock_exclusive()
                .context("Failed to acquire index lock")?;

            let mut index = DocumentIndex::load_blocking(&index_path)?;
            update(&mut index);
            index.save_blocking(&index_path)?;

            // Lock is released when file is dropped
            Ok(())
        })
        .await
        .context("Index update task panicked")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{KnowledgeSynthesis, ResearchBrief};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let store = DocumentStore::new(temp.path());
        let doc = Document::research_brief(ResearchBrief::new("caching", Vec::new()));

        let path = store.save_with_body(&doc, "free text\n").await.unwrap();
        assert!(path.ends_with(format!("research_brief/{}.md", doc.id)));

        let (loaded, body) = store.load(&doc.id).await.unwrap();
        assert_eq!(loaded, doc);
        assert_eq!(body, "free text\n");

        let index = store.index().await.unwrap();
        let entry = index.get(&doc.id).unwrap();
        assert_eq!(entry.body_sha256.as_deref(), Some(body_sha256("free text\n").as_str()));
    }

    #[tokio::test]
    async fn test_load_unknown_id() {
        let temp = TempDir::new().unwrap();
        let store = DocumentStore::new(temp.path());
        assert!(store.load("brief-missing").await.is_err());
    }

    #[tokio::test]
    async fn test_rebuild_index_from_files() {
        let temp = TempDir::new().unwrap();
        let store = DocumentStore::new(temp.path());
        let brief = Document::research_brief(ResearchBrief::new("caching", Vec::new()));
        let synthesis = Document::knowledge_synthesis(KnowledgeSynthesis::new(
            brief.id.clone(),
            "caching",
            Vec::new(),
            0.4,
        ));
        store.save(&brief).await.unwrap();
        store.save(&synthesis).await.unwrap();

        std::fs::remove_file(store.index_path()).unwrap();
        std::fs::write(temp.path().join("research_brief").join("junk.md"), "no header").unwrap();

        assert_eq!(store.rebuild_index().await.unwrap(), 2);
        let index = store.index().await.unwrap();
        assert_eq!(index.lineage(&synthesis.id).len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_writers_share_one_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().to_path_buf();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = DocumentStore::new(&root);
                tokio::spawn(async move {
                    let doc = Document::research_brief(ResearchBrief::new(
                        format!("topic {}", i),
                        Vec::new(),
                    ));
                    store.save(&doc).await.map(|_| doc.id)
                })
            })
            .collect();

        let ids = tokio::time::timeout(std::time::Duration::from_secs(10), async {
            let mut ids = Vec::new();
            for handle in handles {
                ids.push(handle.await.unwrap().unwrap());
            }
            ids
        })
        .await
        .expect("concurrent saves did not finish");

        let index = DocumentStore::new(&root).index().await.unwrap();
        assert_eq!(index.len(), 16);
        assert!(ids.iter().all(|id| index.get(id).is_some()));
    }

    #[test]
    fn test_body_hash_is_hex_sha256() {
        let hash = body_sha256("");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
