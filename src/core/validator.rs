//! Document validation.
//!
//! Each document type has a fixed rule set (required fields, primitive
//! types, value constraints) checked against the document's JSON form,
//! followed by type-specific checks on the typed document.
//!
//! Severity policy:
//! - missing required field / type mismatch: error
//! - length or enum violation on an advisory field: warning
//! - unknown document type: critical
//!
//! Validation never mutates its input and never corrects anything.

use serde_json::Value;

use crate::domain::document::{count_words, reading_time};
use crate::domain::{Document, DocumentContent, DocumentType, Platform, ProcessingStatus, ResearchBrief, Stage};

pub use crate::domain::validation::{IssueCode, Severity, ValidationIssue, ValidationReport};

/// Default tolerance when comparing aggregate scores with their parts
pub const SCORE_TOLERANCE: f64 = 0.01;

// ============================================================================
// Rule tables
// ============================================================================

/// Expected primitive type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    String,
    Number,
    Array,
    Date,
    Object,
}

impl FieldKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Array => value.is_array(),
            FieldKind::Object => value.is_object(),
            FieldKind::Date => value
                .as_str()
                .map(|s| chrono::DateTime::parse_from_rfc3339(s).is_ok())
                .unwrap_or(false),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Array => "array",
            FieldKind::Date => "date",
            FieldKind::Object => "object",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Constraint {
    Range(f64, f64),
    MinItems(usize),
    MaxLength(usize),
    OneOf(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
struct FieldRule {
    path: &'static str,
    kind: FieldKind,
    required: bool,
    constraint: Option<Constraint>,
    /// Length/enum violations on advisory fields are warnings
    advisory: bool,
}

const fn required(path: &'static str, kind: FieldKind) -> FieldRule {
    FieldRule {
        path,
        kind,
        required: true,
        constraint: None,
        advisory: false,
    }
}

const fn optional(path: &'static str, kind: FieldKind) -> FieldRule {
    FieldRule {
        path,
        kind,
        required: false,
        constraint: None,
        advisory: false,
    }
}

impl FieldRule {
    const fn with(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    const fn advisory(mut self) -> Self {
        self.advisory = true;
        self
    }
}

const STAGE_NAMES: &[&str] = &["collector", "scholar", "creator", "adapter"];
const STATUS_NAMES: &[&str] = &["pending", "processing", "completed", "failed", "degraded"];
const PLATFORM_NAMES: &[&str] = &["twitter", "linkedin", "wechat", "xiaohongshu", "medium", "substack"];
const UNIT: Constraint = Constraint::Range(0.0, 1.0);
const COUNT: Constraint = Constraint::Range(0.0, u32::MAX as f64);

const COMMON_RULES: &[FieldRule] = &[
    required("id", FieldKind::String),
    required("type", FieldKind::String),
    required("created", FieldKind::Date),
    required("modified", FieldKind::Date),
    required("version", FieldKind::Number).with(Constraint::Range(1.0, u32::MAX as f64)),
    required("metadata", FieldKind::Object),
    required("metadata.stage", FieldKind::String).with(Constraint::OneOf(STAGE_NAMES)),
    required("metadata.status", FieldKind::String).with(Constraint::OneOf(STATUS_NAMES)),
    optional("metadata.tags", FieldKind::Array),
    optional("metadata.confidence", FieldKind::Number).with(UNIT),
];

const BRIEF_RULES: &[FieldRule] = &[
    required("topic", FieldKind::String).with(Constraint::MaxLength(200)).advisory(),
    required("insights", FieldKind::Array).with(Constraint::MinItems(1)).advisory(),
    required("signal_score", FieldKind::Number).with(UNIT),
];

const SYNTHESIS_RULES: &[FieldRule] = &[
    required("brief_id", FieldKind::String),
    required("concept", FieldKind::String).with(Constraint::MaxLength(200)).advisory(),
    required("depth_layers", FieldKind::Array).with(Constraint::MinItems(1)).advisory(),
    required("depth_level", FieldKind::Number).with(Constraint::Range(0.0, 5.0)),
    required("confidence", FieldKind::Number).with(UNIT),
];

const DRAFT_RULES: &[FieldRule] = &[
    required("synthesis_id", FieldKind::String),
    required("title", FieldKind::String).with(Constraint::MaxLength(150)).advisory(),
    required("content", FieldKind::String),
    required("word_count", FieldKind::Number).with(COUNT),
    required("reading_time", FieldKind::Number).with(COUNT),
    required("sections", FieldKind::Array).with(Constraint::MinItems(1)).advisory(),
    required("engagement_score", FieldKind::Number).with(UNIT),
];

const ADAPTATION_RULES: &[FieldRule] = &[
    required("draft_id", FieldKind::String),
    required("platform", FieldKind::String).with(Constraint::OneOf(PLATFORM_NAMES)),
    required("original", FieldKind::String),
    required("adapted", FieldKind::String),
    required("character_count", FieldKind::Number).with(COUNT),
    optional("hashtags", FieldKind::Array),
    required("platform_fit", FieldKind::Number).with(UNIT),
];

fn rules_for(doc_type: DocumentType) -> &'static [FieldRule] {
    match doc_type {
        DocumentType::ResearchBrief => BRIEF_RULES,
        DocumentType::KnowledgeSynthesis => SYNTHESIS_RULES,
        DocumentType::ContentDraft => DRAFT_RULES,
        DocumentType::PlatformAdaptation => ADAPTATION_RULES,
    }
}

// ============================================================================
// Validator
// ============================================================================

/// Stateless document validator
#[derive(Debug, Clone)]
pub struct Validator {
    /// Allowed difference between an aggregate score and its declared combination
    pub score_tolerance: f64,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    pub fn new() -> Self {
        Self {
            score_tolerance: SCORE_TOLERANCE,
        }
    }

    /// Validate a typed document
    pub fn validate(&self, document: &Document) -> ValidationReport {
        let mut issues = Issues::default();

        match serde_json::to_value(document) {
            Ok(value) => self.check_rules(document.doc_type(), &value, &mut issues),
            Err(e) => issues.push(
                IssueCode::TypeMismatch,
                Severity::Critical,
                None,
                format!("Document is not representable as JSON: {}", e),
            ),
        }
        self.check_document(document, &mut issues);

        issues.into_report()
    }

    /// Validate an untyped document (e.g. parsed from disk)
    pub fn validate_value(&self, value: &Value) -> ValidationReport {
        let mut issues = Issues::default();

        let type_name = value.get("type").and_then(Value::as_str);
        let doc_type = match type_name.map(str::parse::<DocumentType>) {
            Some(Ok(doc_type)) => doc_type,
            _ => {
                issues.push(
                    IssueCode::UnknownDocumentType,
                    Severity::Critical,
                    Some("type"),
                    format!("Unknown document type: {}", type_name.unwrap_or("<missing>")),
                );
                return issues.into_report();
            }
        };

        self.check_rules(doc_type, value, &mut issues);

        // Typed checks only make sense once the generic shape is sound
        if issues.errors.is_empty() {
            if let Ok(document) = serde_json::from_value::<Document>(value.clone()) {
                self.check_document(&document, &mut issues);
            }
        }

        issues.into_report()
    }

    fn check_rules(&self, doc_type: DocumentType, value: &Value, issues: &mut Issues) {
        for rule in COMMON_RULES.iter().chain(rules_for(doc_type)) {
            check_rule(rule, value, issues);
        }
    }

    fn check_document(&self, document: &Document, issues: &mut Issues) {
        if document.modified < document.created {
            issues.push(
                IssueCode::TimestampOrder,
                Severity::Error,
                Some("modified"),
                "modified timestamp precedes created timestamp".to_string(),
            );
        }

        if document.metadata.stage != document.doc_type().producing_stage() {
            issues.push(
                IssueCode::InvalidValue,
                Severity::Warning,
                Some("metadata.stage"),
                format!(
                    "{} documents are produced by {}, metadata says {}",
                    document.doc_type(),
                    document.doc_type().producing_stage(),
                    document.metadata.stage
                ),
            );
        }

        match &document.content {
            DocumentContent::ResearchBrief(brief) => self.check_brief(brief, issues),
            DocumentContent::KnowledgeSynthesis(synthesis) => {
                let mut previous = 0u8;
                for (i, layer) in synthesis.depth_layers.iter().enumerate() {
                    let field = format!("depth_layers[{}].level", i);
                    if !(1..=5).contains(&layer.level) {
                        issues.push(
                            IssueCode::DepthOutOfRange,
                            Severity::Error,
                            Some(field.as_str()),
                            format!("Depth level {} outside 1-5", layer.level),
                        );
                    }
                    if layer.level <= previous {
                        issues.push(
                            IssueCode::DepthNotMonotonic,
                            Severity::Error,
                            Some(field.as_str()),
                            format!("Depth level {} does not follow {}", layer.level, previous),
                        );
                    }
                    previous = layer.level;
                }

                let deepest = synthesis.depth_layers.iter().map(|l| l.level).max().unwrap_or(0);
                if synthesis.depth_level != deepest {
                    issues.push(
                        IssueCode::CountMismatch,
                        Severity::Warning,
                        Some("depth_level"),
                        format!(
                            "depth_level {} but deepest layer is {}",
                            synthesis.depth_level, deepest
                        ),
                    );
                }
            }
            DocumentContent::ContentDraft(draft) => {
                let words = count_words(&draft.content);
                if draft.word_count != words {
                    issues.push(
                        IssueCode::CountMismatch,
                        Severity::Warning,
                        Some("word_count"),
                        format!("word_count {} but content has {} words", draft.word_count, words),
                    );
                }
                let minutes = reading_time(draft.word_count);
                if draft.reading_time != minutes {
                    issues.push(
                        IssueCode::CountMismatch,
                        Severity::Warning,
                        Some("reading_time"),
                        format!("reading_time {} but {} words read in {}", draft.reading_time, draft.word_count, minutes),
                    );
                }
            }
            DocumentContent::PlatformAdaptation(adaptation) => {
                let platform = adaptation.platform;
                let limit = platform.character_limit();
                if adaptation.character_count as usize > limit {
                    issues.push(
                        IssueCode::PlatformLimitExceeded,
                        Severity::Error,
                        Some("character_count"),
                        format!(
                            "{} characters exceeds the {} limit of {}",
                            adaptation.character_count, platform, limit
                        ),
                    );
                }

                let recommended = platform.recommended_hashtags();
                if adaptation.hashtags.len() > recommended {
                    issues.push(
                        IssueCode::HashtagLimitExceeded,
                        Severity::Warning,
                        Some("hashtags"),
                        format!(
                            "{} hashtags, {} recommends at most {}",
                            adaptation.hashtags.len(),
                            platform,
                            recommended
                        ),
                    );
                }

                let actual = adaptation.adapted.chars().count();
                if adaptation.character_count as usize != actual {
                    issues.push(
                        IssueCode::CountMismatch,
                        Severity::Warning,
                        Some("character_count"),
                        format!(
                            "character_count {} but adapted text has {} characters",
                            adaptation.character_count, actual
                        ),
                    );
                }
            }
        }
    }

    fn check_brief(&self, brief: &ResearchBrief, issues: &mut Issues) {
        for (i, insight) in brief.insights.iter().enumerate() {
            let axes = [
                ("reach", insight.scores.reach),
                ("impact", insight.scores.impact),
                ("confidence", insight.scores.confidence),
                ("effort", insight.scores.effort),
            ];
            for (axis, score) in axes {
                if !(0.0..=1.0).contains(&score) {
                    issues.push(
                        IssueCode::OutOfRange,
                        Severity::Error,
                        Some(format!("insights[{}].scores.{}", i, axis).as_str()),
                        format!("{} score {} outside 0-1", axis, score),
                    );
                }
            }

            let expected = insight.scores.aggregate();
            if (insight.score - expected).abs() > self.score_tolerance {
                issues.push(
                    IssueCode::ScoreMismatch,
                    Severity::Warning,
                    Some(format!("insights[{}].score", i).as_str()),
                    format!("score {:.3} but sub-scores combine to {:.3}", insight.score, expected),
                );
            }
        }

        let expected = ResearchBrief::combine(&brief.insights);
        if (brief.signal_score - expected).abs() > self.score_tolerance {
            issues.push(
                IssueCode::ScoreMismatch,
                Severity::Warning,
                Some("signal_score"),
                format!(
                    "signal_score {:.3} but insight scores combine to {:.3}",
                    brief.signal_score, expected
                ),
            );
        }
    }
}

fn check_rule(rule: &FieldRule, document: &Value, issues: &mut Issues) {
    let value = match lookup(document, rule.path) {
        Some(Value::Null) | None => {
            if rule.required {
                issues.push(
                    IssueCode::MissingField,
                    Severity::Error,
                    Some(rule.path),
                    format!("Required field '{}' is missing", rule.path),
                );
            }
            return;
        }
        Some(value) => value,
    };

    if !rule.kind.matches(value) {
        issues.push(
            IssueCode::TypeMismatch,
            Severity::Error,
            Some(rule.path),
            format!("Field '{}' must be a {}", rule.path, rule.kind.name()),
        );
        return;
    }

    let soft = if rule.advisory {
        Severity::Warning
    } else {
        Severity::Error
    };

    match rule.constraint {
        Some(Constraint::Range(min, max)) => {
            if let Some(n) = value.as_f64() {
                if n < min || n > max {
                    issues.push(
                        IssueCode::OutOfRange,
                        Severity::Error,
                        Some(rule.path),
                        format!("Field '{}' = {} outside {}-{}", rule.path, n, min, max),
                    );
                }
            }
        }
        Some(Constraint::MinItems(min)) => {
            let len = value.as_array().map(Vec::len).unwrap_or(0);
            if len < min {
                issues.push(
                    IssueCode::TooFewItems,
                    soft,
                    Some(rule.path),
                    format!("Field '{}' has {} item(s), expected at least {}", rule.path, len, min),
                );
            }
        }
        Some(Constraint::MaxLength(max)) => {
            let len = value.as_str().map(|s| s.chars().count()).unwrap_or(0);
            if len > max {
                issues.push(
                    IssueCode::TooLong,
                    soft,
                    Some(rule.path),
                    format!("Field '{}' is {} characters, limit {}", rule.path, len, max),
                );
            }
        }
        Some(Constraint::OneOf(allowed)) => {
            let s = value.as_str().unwrap_or_default();
            if !allowed.contains(&s) {
                issues.push(
                    IssueCode::InvalidValue,
                    soft,
                    Some(rule.path),
                    format!("Field '{}' = '{}' not one of {:?}", rule.path, s, allowed),
                );
            }
        }
        None => {}
    }
}

/// Resolve a dotted path inside a JSON object
fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, key| current.get(key))
}

#[derive(Default)]
struct Issues {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Issues {
    fn push(&mut self, code: IssueCode, severity: Severity, field: Option<&str>, message: String) {
        let issue = ValidationIssue {
            code,
            severity,
            field: field.map(str::to_string),
            message,
        };
        match severity {
            Severity::Warning => self.warnings.push(issue),
            Severity::Critical | Severity::Error => self.errors.push(issue),
        }
    }

    fn into_report(self) -> ValidationReport {
        let critical = self
            .errors
            .iter()
            .filter(|i| i.severity == Severity::Critical)
            .count() as i64;
        let errors = self.errors.len() as i64 - critical;
        let warnings = self.warnings.len() as i64;
        let score = (100 - 50 * critical - 10 * errors - 2 * warnings).max(0) as u8;

        ValidationReport {
            valid: self.errors.is_empty(),
            errors: self.errors,
            warnings: self.warnings,
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ContentDraft, DepthLayer, DraftSection, Insight, KnowledgeSynthesis, PlatformAdaptation,
        SignalScores,
    };

    fn brief() -> Document {
        Document::research_brief(ResearchBrief::new(
            "ownership in rust",
            vec![Insight::new("borrowck", "book", SignalScores::new(0.9, 0.8, 0.7, 0.6))],
        ))
    }

    #[test]
    fn test_enum_tables_match_domain() {
        let stages: Vec<&str> = Stage::ALL.iter().map(Stage::as_str).collect();
        assert_eq!(stages, STAGE_NAMES);
        let statuses: Vec<&str> = ProcessingStatus::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(statuses, STATUS_NAMES);
        let platforms: Vec<&str> = Platform::ALL.iter().map(Platform::as_str).collect();
        assert_eq!(platforms, PLATFORM_NAMES);
    }

    #[test]
    fn test_valid_brief() {
        let report = Validator::new().validate(&brief());
        assert!(report.valid, "{:?}", report);
        assert_eq!(report.score, 100);
    }

    #[test]
    fn test_score_mismatch_is_warning() {
        let mut doc = brief();
        if let DocumentContent::ResearchBrief(b) = &mut doc.content {
            b.insights[0].score = 0.2;
        }
        let report = Validator::new().validate(&doc);
        assert!(report.valid);
        assert!(report.has_warning(IssueCode::ScoreMismatch));
        // insight and brief level both disagree now
        assert_eq!(report.warnings.len(), 2);
        assert_eq!(report.score, 96);
    }

    #[test]
    fn test_unknown_type_is_critical() {
        let value = serde_json::json!({ "id": "x", "type": "newsletter" });
        let report = Validator::new().validate_value(&value);
        assert!(!report.valid);
        assert_eq!(report.critical_count(), 1);
        assert!(report.has_error(IssueCode::UnknownDocumentType));
        assert_eq!(report.score, 50);
    }

    #[test]
    fn test_missing_and_mistyped_fields() {
        let mut value = serde_json::to_value(brief()).unwrap();
        value.as_object_mut().unwrap().remove("topic");
        value["signal_score"] = serde_json::json!("high");

        let report = Validator::new().validate_value(&value);
        assert!(!report.valid);
        assert!(report.has_error(IssueCode::MissingField));
        assert!(report.has_error(IssueCode::TypeMismatch));
        assert_eq!(report.score, 80);
    }

    #[test]
    fn test_advisory_violations_are_warnings() {
        let doc = Document::research_brief(ResearchBrief::new("x".repeat(250), Vec::new()));
        let report = Validator::new().validate(&doc);
        assert!(report.valid);
        assert!(report.has_warning(IssueCode::TooLong));
        assert!(report.has_warning(IssueCode::TooFewItems));
    }

    #[test]
    fn test_depth_layers_must_increase() {
        let doc = Document::knowledge_synthesis(KnowledgeSynthesis::new(
            "brief-1",
            "lifetimes",
            vec![
                DepthLayer::new(2, "How", "a"),
                DepthLayer::new(2, "How again", "b"),
                DepthLayer::new(6, "Beyond", "c"),
            ],
            0.8,
        ));
        let report = Validator::new().validate(&doc);
        assert!(report.has_error(IssueCode::DepthNotMonotonic));
        assert!(report.has_error(IssueCode::DepthOutOfRange));
        // depth_level = 6 also breaks the generic 0-5 range
        assert!(report.has_error(IssueCode::OutOfRange));
    }

    #[test]
    fn test_draft_count_mismatch() {
        let mut draft = ContentDraft::new(
            "synthesis-1",
            "Title",
            "one two three",
            vec![DraftSection::new("Intro", "one two three")],
            0.7,
        );
        draft.word_count = 10;
        let report = Validator::new().validate(&Document::content_draft(draft));
        assert!(report.valid);
        assert!(report.has_warning(IssueCode::CountMismatch));
    }

    #[test]
    fn test_twitter_limit_exceeded() {
        let doc = Document::platform_adaptation(PlatformAdaptation::new(
            "draft-1",
            Platform::Twitter,
            "original",
            "a".repeat(300),
            vec!["#rust".to_string()],
            0.9,
        ));
        let report = Validator::new().validate(&doc);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code, IssueCode::PlatformLimitExceeded);
    }

    #[test]
    fn test_hashtag_limit_is_warning() {
        let tags = (0..6).map(|i| format!("#tag{}", i)).collect();
        let doc = Document::platform_adaptation(PlatformAdaptation::new(
            "draft-1",
            Platform::LinkedIn,
            "original",
            "adapted",
            tags,
            0.9,
        ));
        let report = Validator::new().validate(&doc);
        assert!(report.valid);
        assert!(report.has_warning(IssueCode::HashtagLimitExceeded));
    }

    #[test]
    fn test_validation_does_not_mutate() {
        let doc = brief();
        let before = doc.clone();
        let _ = Validator::new().validate(&doc);
        assert_eq!(doc, before);
    }

    #[test]
    fn test_issue_code_serialization() {
        let json = serde_json::to_string(&IssueCode::PlatformLimitExceeded).unwrap();
        assert_eq!(json, "\"PLATFORM_LIMIT_EXCEEDED\"");
    }
}
