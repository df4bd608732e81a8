//! Document persistence.
//!
//! - frontmatter: document + body <-> header-delimited text
//! - index: id -> type, path, lineage and tags
//! - store: files on disk plus a locked index

pub mod frontmatter;
pub mod index;
pub mod store;

pub use frontmatter::CodecError;
pub use index::{DocumentIndex, IndexEntry, SearchCriteria};
pub use store::{body_sha256, DocumentStore};
