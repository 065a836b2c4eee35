//! Result aggregation
//!
//! Folds both outcome maps into exactly one `ResultRow` per document group.
//! A group without a recorded outcome is reported as incomplete, never
//! dropped.

use crate::config::CatalogConfig;
use crate::log_warn;
use crate::types::{
    Cell, ClassificationOutcome, DocumentGroup, ExtractionOutcome, FieldExtraction, FieldSpec,
    GroupKey, ProcessingStatus, ResultRow, StageFailure,
};

use indexmap::IndexMap;
use std::collections::HashMap;

/// Column name for one facet of an extracted field
pub fn field_column(doc_type: &str, field: &str, facet: &str) -> String {
    format!("{doc_type}_{field}_{facet}")
}

/// Build one row per group, in group order
pub fn aggregate(
    groups: &[DocumentGroup],
    classifications: &HashMap<GroupKey, ClassificationOutcome>,
    extractions: &HashMap<GroupKey, ExtractionOutcome>,
    catalog: &CatalogConfig,
) -> Vec<ResultRow> {
    groups
        .iter()
        .map(|group| build_row(group, classifications, extractions, catalog))
        .collect()
}

fn build_row(
    group: &DocumentGroup,
    classifications: &HashMap<GroupKey, ClassificationOutcome>,
    extractions: &HashMap<GroupKey, ExtractionOutcome>,
    catalog: &CatalogConfig,
) -> ResultRow {
    let key = group.key();
    let mut row = ResultRow {
        case_id: group.case_id.clone(),
        base_name: group.base_name.clone(),
        status: ProcessingStatus::ClassificationFailed(StageFailure::incomplete().detail),
        classified_type: None,
        classification_confidence: None,
        classification_reasoning: None,
        fields: IndexMap::new(),
    };

    let classification = match classifications.get(&key) {
        None => {
            log_warn!("No classification outcome recorded for {}", key);
            return row;
        }
        Some(ClassificationOutcome::Failure(failure)) => {
            row.status = ProcessingStatus::ClassificationFailed(failure.detail.clone());
            return row;
        }
        Some(ClassificationOutcome::Success(classification)) => classification,
    };

    row.classified_type = Some(classification.classified_type.clone());
    row.classification_confidence = Some(classification.confidence);
    row.classification_reasoning = Some(classification.reasoning.clone());

    if classification.is_unknown() {
        row.status = ProcessingStatus::ClassifiedUnknown;
        return row;
    }

    let doc_type = classification.classified_type.as_str();
    let specs = match catalog.fields_for(doc_type) {
        None => {
            row.status = ProcessingStatus::NotConfigured(doc_type.to_string());
            return row;
        }
        Some([]) => {
            row.status = ProcessingStatus::NoFieldsConfigured;
            return row;
        }
        Some(specs) => specs,
    };

    row.status = match extractions.get(&key) {
        None => {
            log_warn!("No extraction outcome recorded for {}", key);
            ProcessingStatus::ExtractionFailed(StageFailure::incomplete().detail)
        }
        Some(ExtractionOutcome::Failure(failure)) => {
            ProcessingStatus::ExtractionFailed(failure.detail.clone())
        }
        Some(ExtractionOutcome::Success(extraction)) => {
            row.fields = field_cells(doc_type, specs, extraction);
            ProcessingStatus::ExtractionSuccessful
        }
        Some(ExtractionOutcome::PartialSuccess { extraction, .. }) => {
            row.fields = field_cells(doc_type, specs, extraction);
            ProcessingStatus::ExtractionPartial
        }
    };
    row
}

/// Value, confidence and reasoning cells in catalog order, then raw diagnostics
fn field_cells(
    doc_type: &str,
    specs: &[FieldSpec],
    extraction: &FieldExtraction,
) -> IndexMap<String, Cell> {
    let mut cells = IndexMap::new();
    for spec in specs {
        let field = extraction.fields.get(&spec.name);
        cells.insert(
            field_column(doc_type, &spec.name, "Value"),
            Cell::optional_text(field.and_then(|f| f.value())),
        );
        cells.insert(
            field_column(doc_type, &spec.name, "Confidence"),
            field.map_or(Cell::Empty, |f| Cell::Number(f.confidence())),
        );
        cells.insert(
            field_column(doc_type, &spec.name, "Reasoning"),
            field.map_or(Cell::Empty, |f| Cell::text(f.reasoning())),
        );
    }
    for (name, raw) in &extraction.raw {
        cells.insert(field_column(doc_type, name, "Raw"), Cell::text(raw));
    }
    cells
}
