//! casedocs - AI-powered case document classification and field extraction
//!
//! This library groups the scanned pages of each case folder into logical
//! documents, classifies every document against a configurable type list,
//! extracts the configured fields for known types and aggregates one result
//! row per document group.

// Allow certain clippy warnings that are either stylistic or from external dependencies
#![allow(clippy::uninlined_format_args)] // Style preference
#![allow(clippy::format_push_string)] // Performance improvement but stylistic
#![allow(clippy::return_self_not_must_use)] // Builder pattern is clear enough
#![allow(clippy::items_after_statements)] // Locally-scoped use statements are fine
#![allow(clippy::too_many_arguments)] // Some functions legitimately need many params
#![allow(clippy::module_name_repetitions)] // ClassificationStage in stages::classify reads fine

pub mod aggregate;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod grouping;
pub mod llm_providers;
pub mod logger;
pub mod orchestrator;
pub mod output;
pub mod prompts;
pub mod providers;
pub mod retry;
pub mod stages;
pub mod testing;
pub mod types;
pub mod ui;

// Re-export important structs and functions for easier testing
pub use config::Config;
pub use error::{ErrorKind, ServiceError, StageError};
pub use llm_providers::{DocumentModel, ModelPart, ModelRequest, RequestPurpose};
pub use orchestrator::{BatchReport, NoProgress, Orchestrator, Progress};
pub use providers::{Provider, ProviderConfig};
pub use retry::{RetryPolicy, RetryingClient};

// Re-exports from types module
pub use types::{
    Case, Cell, Classification, ClassificationOutcome, DocumentGroup, ExtractionOutcome,
    FieldSpec, GroupKey, ProcessingStatus, ResultRow,
};
