//! Core data types for the document pipeline
//!
//! This module consolidates the values that flow between pipeline stages:
//! - Cases and the document groups discovered inside them
//! - Classification and extraction outcomes
//! - Aggregated result rows and their processing status

mod document;
mod outcome;
mod row;

// Input types
pub use document::{Case, DocumentGroup, GroupKey, PageRef};

// Stage outcome types
pub use outcome::{
    Classification, ClassificationOutcome, ExtractionOutcome, FailureKind, FieldExtraction,
    FieldSpec, FieldValue, StageFailure, UNKNOWN_TYPE,
};

// Output types
pub use row::{Cell, ProcessingStatus, ResultRow, STATIC_COLUMNS};
