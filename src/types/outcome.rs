//! Classification and extraction outcomes

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{AsRefStr, Display};

/// Sentinel label for documents that match none of the acceptable types
pub const UNKNOWN_TYPE: &str = "UNKNOWN";

/// One entry of a field catalog: what to extract for a document type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Why a stage call failed for a document group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transient errors persisted past the retry budget
    #[strum(to_string = "retries exhausted")]
    RetriesExhausted,
    /// The service refused to answer on safety grounds
    #[strum(to_string = "content blocked")]
    ContentBlocked,
    /// The service answered but not in the expected shape
    #[strum(to_string = "malformed response")]
    MalformedResponse,
    /// A page file could not be read
    #[strum(to_string = "file I/O")]
    FileIo,
    /// Any other terminal service error
    #[strum(to_string = "service error")]
    Service,
    /// The worker never reported an outcome
    #[strum(to_string = "incomplete")]
    Incomplete,
}

/// A terminal failure recorded for one group in one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl StageFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Failure used when a worker task ends without reporting
    pub fn incomplete() -> Self {
        Self::new(FailureKind::Incomplete, "task did not complete")
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail)
    }
}

/// The classification reply expected from the AI service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Classification {
    /// One of the acceptable document type labels, or "UNKNOWN"
    pub classified_type: String,
    /// Certainty of the label, from 0.0 to 1.0
    pub confidence: f64,
    /// Brief justification for the label
    pub reasoning: String,
}

impl Classification {
    pub fn is_unknown(&self) -> bool {
        self.classified_type == UNKNOWN_TYPE
    }
}

/// Result of classifying one document group
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClassificationOutcome {
    Success(Classification),
    Failure(StageFailure),
}

impl ClassificationOutcome {
    /// The classified type when classification succeeded with a real label
    pub fn known_type(&self) -> Option<&str> {
        match self {
            Self::Success(c) if !c.is_unknown() => Some(c.classified_type.as_str()),
            _ => None,
        }
    }
}

/// Value, confidence and reasoning extracted for a single field.
///
/// A missing value always carries a confidence of 0.0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldValue {
    value: Option<String>,
    confidence: f64,
    reasoning: String,
}

impl FieldValue {
    pub fn new(value: Option<String>, confidence: f64, reasoning: impl Into<String>) -> Self {
        let confidence = if value.is_none() { 0.0 } else { confidence };
        Self {
            value,
            confidence,
            reasoning: reasoning.into(),
        }
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }
}

/// Fields extracted from one group, in catalog order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldExtraction {
    /// Well-formed fields keyed by catalog name
    pub fields: IndexMap<String, FieldValue>,
    /// Raw JSON text of malformed or unexpected entries, kept for diagnostics
    pub raw: IndexMap<String, String>,
}

/// Result of extracting fields from one document group
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    Success(FieldExtraction),
    PartialSuccess {
        extraction: FieldExtraction,
        malformed: Vec<String>,
    },
    Failure(StageFailure),
}

impl ExtractionOutcome {
    /// Extracted data, if any was produced
    pub fn extraction(&self) -> Option<&FieldExtraction> {
        match self {
            Self::Success(extraction) | Self::PartialSuccess { extraction, .. } => Some(extraction),
            Self::Failure(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_value_forces_zero_confidence() {
        let field = FieldValue::new(None, 0.8, "not present");
        assert!(field.value().is_none());
        assert!(field.confidence().abs() < f64::EPSILON);

        let field = FieldValue::new(Some("INV-1".to_string()), 0.8, "header");
        assert!((field.confidence() - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_known_type_skips_unknown() {
        let unknown = ClassificationOutcome::Success(Classification {
            classified_type: UNKNOWN_TYPE.to_string(),
            confidence: 0.4,
            reasoning: String::new(),
        });
        assert_eq!(unknown.known_type(), None);

        let invoice = ClassificationOutcome::Success(Classification {
            classified_type: "INVOICE".to_string(),
            confidence: 0.9,
            reasoning: String::new(),
        });
        assert_eq!(invoice.known_type(), Some("INVOICE"));
    }

    #[test]
    fn test_classification_schema_lists_keys() {
        let schema = schemars::schema_for!(Classification);
        let json = serde_json::to_string(&schema).expect("schema should serialize");
        assert!(json.contains("classified_type"));
        assert!(json.contains("confidence"));
        assert!(json.contains("reasoning"));
    }
}
