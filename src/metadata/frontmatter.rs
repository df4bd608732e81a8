//! Frontmatter codec.
//!
//! A persisted document is a YAML header between `---` delimiters followed
//! by a free-text body:
//!
//! ```text
//! ---
//! flcm_id: brief-…
//! flcm_type: research_brief
//! flcm_stage: collector
//! …
//! signal_score: 0.72
//! ---
//!
//! <body>
//! ```
//!
//! Envelope fields carry an `flcm_` prefix; payload fields follow unprefixed.
//! The body is returned exactly as it was written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::domain::{
    Document, DocumentContent, DocumentMetadata, DocumentType, ProcessingStatus, Stage,
};

const DELIMITER: &str = "---\n";
const CLOSING: &str = "\n---\n";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("No metadata header found")]
    NoHeaderFound,

    #[error("Malformed metadata header: {0}")]
    Parse(#[source] serde_yaml::Error),

    #[error("Failed to serialize metadata header: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("Unknown document type: {0}")]
    UnknownDocumentType(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    flcm_id: String,
    flcm_type: String,
    flcm_stage: Stage,
    flcm_status: ProcessingStatus,
    flcm_created: DateTime<Utc>,
    flcm_modified: DateTime<Utc>,
    flcm_version: u32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    flcm_tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    flcm_confidence: Option<f64>,

    /// Type-specific payload fields
    #[serde(flatten)]
    fields: Mapping,
}

/// Render a document and its body as header + text
pub fn serialize(document: &Document, body: &str) -> Result<String, CodecError> {
    let mut fields = match serde_yaml::to_value(&document.content).map_err(CodecError::Serialize)? {
        Value::Mapping(map) => map,
        _ => Mapping::new(),
    };
    // carried as flcm_type
    fields.remove("type");

    let header = Header {
        flcm_id: document.id.clone(),
        flcm_type: document.doc_type().as_str().to_string(),
        flcm_stage: document.metadata.stage,
        flcm_status: document.metadata.status,
        flcm_created: document.created,
        flcm_modified: document.modified,
        flcm_version: document.version,
        flcm_tags: document.metadata.tags.clone(),
        flcm_confidence: document.metadata.confidence,
        fields,
    };
    let yaml = serde_yaml::to_string(&header).map_err(CodecError::Serialize)?;

    Ok(format!("{DELIMITER}{yaml}{DELIMITER}\n{body}"))
}

/// Split header from body and rebuild the document
pub fn parse(text: &str) -> Result<(Document, String), CodecError> {
    let (yaml, body) = split(text)?;
    let header: Header = serde_yaml::from_str(yaml).map_err(CodecError::Parse)?;
    let doc_type: DocumentType = header
        .flcm_type
        .parse()
        .map_err(|_| CodecError::UnknownDocumentType(header.flcm_type.clone()))?;

    let mut fields = header.fields;
    fields.insert(
        Value::String("type".to_string()),
        Value::String(doc_type.as_str().to_string()),
    );
    let content: DocumentContent =
        serde_yaml::from_value(Value::Mapping(fields)).map_err(CodecError::Parse)?;

    let document = Document {
        id: header.flcm_id,
        created: header.flcm_created,
        modified: header.flcm_modified,
        version: header.flcm_version,
        metadata: DocumentMetadata {
            stage: header.flcm_stage,
            status: header.flcm_status,
            tags: header.flcm_tags,
            confidence: header.flcm_confidence,
        },
        content,
    };

    Ok((document, body.to_string()))
}

/// Returns (header yaml, body)
fn split(text: &str) -> Result<(&str, &str), CodecError> {
    let rest = text.strip_prefix(DELIMITER).ok_or(CodecError::NoHeaderFound)?;

    // header may be empty: "---\n---\n"
    let (yaml, after) = if let Some(after) = rest.strip_prefix(DELIMITER) {
        ("", after)
    } else {
        let end = rest.find(CLOSING).ok_or(CodecError::NoHeaderFound)?;
        (&rest[..=end], &rest[end + CLOSING.len()..])
    };

    Ok((yaml, after.strip_prefix('\n').unwrap_or(after)))
}
