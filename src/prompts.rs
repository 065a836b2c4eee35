//! Instruction text sent with each request
//!
//! Both instructions are templates with `{placeholder}` slots so a config file
//! can replace the wording without touching the response contract.

use crate::config::InstructionsConfig;
use crate::types::{Classification, DocumentGroup, FieldSpec};

use anyhow::Result;
use serde_json::{Map, Value, json};

const DEFAULT_CLASSIFICATION_TEMPLATE: &str = "\
You are a document classification specialist. Analyze the {num_pages} attached page(s), \
which together form one logical document, and decide which single type best describes \
its primary purpose.

Acceptable document types:
{acceptable_types}

Guidelines:
1. Review every page. Titles, headings, recurring labels and layout are the strongest signals.
2. Pick the type matching the document's overall purpose, not an attachment or a stray page.
3. If the document does not clearly match any acceptable type, answer \"UNKNOWN\".
4. Confidence is a number between 0.0 (no idea) and 1.0 (certain).
5. Reasoning names the concrete evidence you relied on.

Respond with ONLY a JSON object with exactly the keys classified_type, confidence and \
reasoning, following this schema:
{schema}
";

const DEFAULT_EXTRACTION_TEMPLATE: &str = "\
You are a meticulous document data extraction specialist. The {num_pages} attached page(s) \
form one '{doc_type}' document belonging to case '{case_id}'. Extract the fields below, \
using each description to locate the right value across all pages.

Fields to extract:
{fields}

Output rules:
1. Respond with ONLY a JSON object whose keys are exactly the field names listed above.
2. Each value is an object with exactly the keys \"value\", \"confidence\" and \"reasoning\".
3. \"value\" is the extracted text, or JSON null when the field is absent or not applicable.
4. \"confidence\" is a number between 0.0 and 1.0 reflecting certainty about every character \
of the value. If \"value\" is null, \"confidence\" MUST be 0.0.
5. \"reasoning\" says where and how the value was found, or why it is missing.

Expected shape:
{schema}
";

/// Rendered instruction templates for both stages
#[derive(Debug, Clone)]
pub struct Instructions {
    classification_template: String,
    extraction_template: String,
    classification_schema: String,
}

impl Instructions {
    /// Build instructions from the defaults and any configured overrides
    pub fn new(overrides: &InstructionsConfig) -> Result<Self> {
        let schema = schemars::schema_for!(Classification);
        let classification_schema = serde_json::to_string_pretty(&schema)?;

        Ok(Self {
            classification_template: overrides
                .classification
                .clone()
                .unwrap_or_else(|| DEFAULT_CLASSIFICATION_TEMPLATE.to_string()),
            extraction_template: overrides
                .extraction
                .clone()
                .unwrap_or_else(|| DEFAULT_EXTRACTION_TEMPLATE.to_string()),
            classification_schema,
        })
    }

    /// Instruction asking which of `labels` the group is
    pub fn classification(&self, group: &DocumentGroup, labels: &[String]) -> String {
        let acceptable_types = labels
            .iter()
            .map(|label| format!("- {label}"))
            .collect::<Vec<_>>()
            .join("\n");

        self.classification_template
            .replace("{num_pages}", &group.page_count().to_string())
            .replace("{acceptable_types}", &acceptable_types)
            .replace("{schema}", &self.classification_schema)
    }

    /// Instruction asking for every catalog field of `doc_type`
    pub fn extraction(&self, group: &DocumentGroup, doc_type: &str, catalog: &[FieldSpec]) -> String {
        let fields = catalog
            .iter()
            .map(|spec| match spec.description.trim() {
                "" => format!("- {}", spec.name),
                description => format!("- {}: {description}", spec.name),
            })
            .collect::<Vec<_>>()
            .join("\n");

        self.extraction_template
            .replace("{num_pages}", &group.page_count().to_string())
            .replace("{doc_type}", doc_type)
            .replace("{case_id}", &group.case_id)
            .replace("{fields}", &fields)
            .replace("{schema}", &extraction_schema(catalog))
    }
}

/// Example object with one entry per catalog field
fn extraction_schema(catalog: &[FieldSpec]) -> String {
    let shape: Map<String, Value> = catalog
        .iter()
        .map(|spec| {
            (
                spec.name.clone(),
                json!({
                    "value": "string or null",
                    "confidence": "number between 0.0 and 1.0",
                    "reasoning": "string",
                }),
            )
        })
        .collect();
    let shape = Value::Object(shape);
    serde_json::to_string_pretty(&shape).unwrap_or_else(|_| shape.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PageRef;
    use std::path::PathBuf;

    fn group() -> DocumentGroup {
        let page = |n: u32| PageRef {
            path: PathBuf::from(format!("C1/Invoice {n}.pdf")),
            file_name: format!("Invoice {n}.pdf"),
            page_number: n,
            mime_type: "application/pdf".to_string(),
        };
        DocumentGroup {
            case_id: "C1".to_string(),
            base_name: "Invoice".to_string(),
            pages: vec![page(1), page(2)],
        }
    }

    #[test]
    fn test_classification_lists_labels_and_schema() {
        let instructions =
            Instructions::new(&InstructionsConfig::default()).expect("instructions should build");
        let labels = vec!["INVOICE".to_string(), "UNKNOWN".to_string()];
        let text = instructions.classification(&group(), &labels);
        assert!(text.contains("- INVOICE\n- UNKNOWN"));
        assert!(text.contains("2 attached page(s)"));
        assert!(text.contains("classified_type"));
        assert!(!text.contains("{schema}"));
    }

    #[test]
    fn test_extraction_embeds_fields() {
        let instructions =
            Instructions::new(&InstructionsConfig::default()).expect("instructions should build");
        let catalog = vec![
            FieldSpec::new("INVOICE NO", "Unique number"),
            FieldSpec::new("HS CODE", ""),
            FieldSpec::new("SELLER", "   "),
        ];
        let text = instructions.extraction(&group(), "INVOICE", &catalog);
        assert!(text.contains("'INVOICE' document belonging to case 'C1'"));
        assert!(text.contains("- INVOICE NO: Unique number\n- HS CODE\n- SELLER\n"));
        assert!(!text.contains("SELLER:"));
        assert!(text.contains("\"HS CODE\": {"));
        assert!(text.contains("MUST be 0.0"));
    }

    #[test]
    fn test_template_override() {
        let overrides = InstructionsConfig {
            classification: Some("Pick one of {acceptable_types}".to_string()),
            extraction: None,
        };
        let instructions = Instructions::new(&overrides).expect("instructions should build");
        let text = instructions.classification(&group(), &["BL".to_string()]);
        assert_eq!(text, "Pick one of - BL");
    }
}
