//! Aggregated result rows

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// Leading columns present on every row, in output order
pub const STATIC_COLUMNS: [&str; 6] = [
    "CASE_ID",
    "GROUP_Basename",
    "Processing_Status",
    "CLASSIFIED_Type",
    "CLASSIFICATION_Confidence",
    "CLASSIFICATION_Reasoning",
];

/// The furthest state a document group reached, rendered as its status text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingStatus {
    ClassificationFailed(String),
    ClassifiedUnknown,
    NotConfigured(String),
    NoFieldsConfigured,
    ExtractionSuccessful,
    ExtractionPartial,
    ExtractionFailed(String),
}

impl ProcessingStatus {
    /// Whether the group ended in a failure state
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::ClassificationFailed(_) | Self::ExtractionFailed(_)
        )
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClassificationFailed(detail) => write!(f, "ClassificationFailed: {detail}"),
            Self::ClassifiedUnknown => f.write_str("Classified as UNKNOWN"),
            Self::NotConfigured(doc_type) => {
                write!(f, "Classified as '{doc_type}' (Unsupported/Not Configured)")
            }
            Self::NoFieldsConfigured => f.write_str("Extraction skipped - No fields configured"),
            Self::ExtractionSuccessful => f.write_str("Extraction Successful"),
            Self::ExtractionPartial => f.write_str("Extraction Partially Successful (Format Issue)"),
            Self::ExtractionFailed(detail) => write!(f, "Extraction Failed: {detail}"),
        }
    }
}

impl Serialize for ProcessingStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A single table cell
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn optional_text(value: Option<&str>) -> Self {
        value.map_or(Self::Empty, |v| Self::Text(v.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(number) => write!(f, "{number}"),
            Self::Empty => Ok(()),
        }
    }
}

/// One denormalized output row per document group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub case_id: String,
    pub base_name: String,
    pub status: ProcessingStatus,
    pub classified_type: Option<String>,
    pub classification_confidence: Option<f64>,
    pub classification_reasoning: Option<String>,
    /// Namespaced field columns (`{type}_{field}_Value` and friends), in order
    pub fields: IndexMap<String, Cell>,
}

impl ResultRow {
    /// Look up any column by its output name
    pub fn get(&self, column: &str) -> Cell {
        match column {
            "CASE_ID" => Cell::text(&self.case_id),
            "GROUP_Basename" => Cell::text(&self.base_name),
            "Processing_Status" => Cell::text(self.status.to_string()),
            "CLASSIFIED_Type" => Cell::optional_text(self.classified_type.as_deref()),
            "CLASSIFICATION_Confidence" => {
                self.classification_confidence.map_or(Cell::Empty, Cell::Number)
            }
            "CLASSIFICATION_Reasoning" => {
                Cell::optional_text(self.classification_reasoning.as_deref())
            }
            other => self.fields.get(other).cloned().unwrap_or(Cell::Empty),
        }
    }

    /// Names of the dynamic field columns this row populates
    pub fn field_columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}
