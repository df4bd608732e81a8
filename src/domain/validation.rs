//! Validation findings recorded against documents and run state.

use serde::{Deserialize, Serialize};

/// Outcome of validating one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True when there are no errors (warnings allowed)
    pub valid: bool,

    /// Blocking issues, including critical ones
    pub errors: Vec<ValidationIssue>,

    /// Advisory issues
    pub warnings: Vec<ValidationIssue>,

    /// 100 - 50*critical - 10*errors - 2*warnings, floored at 0
    pub score: u8,
}

impl ValidationReport {
    /// Whether any error carries the given code
    pub fn has_error(&self, code: IssueCode) -> bool {
        self.errors.iter().any(|i| i.code == code)
    }

    /// Whether any warning carries the given code
    pub fn has_warning(&self, code: IssueCode) -> bool {
        self.warnings.iter().any(|i| i.code == code)
    }

    pub fn critical_count(&self) -> usize {
        self.errors
            .iter()
            .filter(|i| i.severity == Severity::Critical)
            .count()
    }
}

/// A single validation finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub severity: Severity,

    /// Dotted path of the offending field, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    MissingField,
    TypeMismatch,
    OutOfRange,
    TooFewItems,
    TooLong,
    InvalidValue,
    UnknownDocumentType,
    TimestampOrder,
    ScoreMismatch,
    DepthOutOfRange,
    DepthNotMonotonic,
    CountMismatch,
    PlatformLimitExceeded,
    HashtagLimitExceeded,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::MissingField => "MISSING_FIELD",
            IssueCode::TypeMismatch => "TYPE_MISMATCH",
            IssueCode::OutOfRange => "OUT_OF_RANGE",
            IssueCode::TooFewItems => "TOO_FEW_ITEMS",
            IssueCode::TooLong => "TOO_LONG",
            IssueCode::InvalidValue => "INVALID_VALUE",
            IssueCode::UnknownDocumentType => "UNKNOWN_DOCUMENT_TYPE",
            IssueCode::TimestampOrder => "TIMESTAMP_ORDER",
            IssueCode::ScoreMismatch => "SCORE_MISMATCH",
            IssueCode::DepthOutOfRange => "DEPTH_OUT_OF_RANGE",
            IssueCode::DepthNotMonotonic => "DEPTH_NOT_MONOTONIC",
            IssueCode::CountMismatch => "COUNT_MISMATCH",
            IssueCode::PlatformLimitExceeded => "PLATFORM_LIMIT_EXCEEDED",
            IssueCode::HashtagLimitExceeded => "HASHTAG_LIMIT_EXCEEDED",
        }
    }
}

impl std::fmt::Display for IssueCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_codes_serialize_as_constants() {
        let issue = ValidationIssue {
            code: IssueCode::PlatformLimitExceeded,
            severity: Severity::Error,
            field: None,
            message: "too long".to_string(),
        };
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["code"], "PLATFORM_LIMIT_EXCEEDED");
        assert_eq!(json["severity"], "error");
        assert!(json.get("field").is_none());
        assert_eq!(IssueCode::PlatformLimitExceeded.to_string(), "PLATFORM_LIMIT_EXCEEDED");
    }

    #[test]
    fn test_critical_issues_are_counted_among_errors() {
        let issue = |severity| ValidationIssue {
            code: IssueCode::UnknownDocumentType,
            severity,
            field: None,
            message: String::new(),
        };
        let report = ValidationReport {
            valid: false,
            errors: vec![issue(Severity::Critical), issue(Severity::Error)],
            warnings: Vec::new(),
            score: 40,
        };
        assert_eq!(report.critical_count(), 1);
        assert!(report.has_error(IssueCode::UnknownDocumentType));
        assert!(!report.has_warning(IssueCode::UnknownDocumentType));
    }
}
