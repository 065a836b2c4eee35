use super::{load_parts, strip_json_fence};
use crate::error::{ServiceError, StageError};
use crate::llm_providers::{ModelRequest, RequestPurpose};
use crate::prompts::Instructions;
use crate::retry::RetryingClient;
use crate::types::{DocumentGroup, ExtractionOutcome, FieldExtraction, FieldSpec, FieldValue};
use crate::{trace_debug, trace_warn};

use serde_json::Value;
use std::sync::Arc;

const ENTRY_KEYS: [&str; 3] = ["value", "confidence", "reasoning"];

/// Asks the model for the catalog fields of a classified group
#[derive(Clone)]
pub struct ExtractionStage {
    client: RetryingClient,
    instructions: Arc<Instructions>,
}

impl ExtractionStage {
    pub fn new(client: RetryingClient, instructions: Arc<Instructions>) -> Self {
        Self {
            client,
            instructions,
        }
    }

    /// Extract `catalog` from a group already classified as `doc_type`.
    ///
    /// Callers only pass known types with a non-empty catalog.
    pub async fn extract(
        &self,
        group: &DocumentGroup,
        doc_type: &str,
        catalog: &[FieldSpec],
    ) -> ExtractionOutcome {
        match self.try_extract(group, doc_type, catalog).await {
            Ok(outcome) => {
                if let ExtractionOutcome::PartialSuccess { malformed, .. } = &outcome {
                    trace_warn!(
                        case_id = %group.case_id,
                        group = %group.base_name,
                        doc_type,
                        "malformed fields: {}",
                        malformed.join(", ")
                    );
                } else {
                    trace_debug!(
                        case_id = %group.case_id,
                        group = %group.base_name,
                        doc_type,
                        "extraction complete"
                    );
                }
                outcome
            }
            Err(err) => {
                let failure = err.into_failure();
                trace_warn!(
                    case_id = %group.case_id,
                    group = %group.base_name,
                    kind = %failure.kind,
                    "extraction failed: {}",
                    failure.detail
                );
                ExtractionOutcome::Failure(failure)
            }
        }
    }

    async fn try_extract(
        &self,
        group: &DocumentGroup,
        doc_type: &str,
        catalog: &[FieldSpec],
    ) -> Result<ExtractionOutcome, StageError> {
        let parts = load_parts(group).await?;
        let request = ModelRequest {
            purpose: RequestPurpose::Extraction,
            label: group.key().to_string(),
            instruction: self.instructions.extraction(group, doc_type, catalog),
            parts,
        };

        let reply = self.client.invoke(&request).await?;
        Ok(parse_extraction(&reply, catalog)?)
    }
}

/// Validate an extraction reply field by field.
///
/// Only a reply that is not a JSON object fails outright. Missing or
/// malformed catalog fields make the outcome partial; entries that could not
/// be used are kept as raw JSON text.
pub fn parse_extraction(
    reply: &str,
    catalog: &[FieldSpec],
) -> Result<ExtractionOutcome, ServiceError> {
    let parsed: Value = serde_json::from_str(strip_json_fence(reply))
        .map_err(|e| ServiceError::MalformedResponse(format!("extraction reply: {e}")))?;
    let Value::Object(mut object) = parsed else {
        return Err(ServiceError::MalformedResponse(
            "extraction reply is not a JSON object".to_string(),
        ));
    };

    let mut extraction = FieldExtraction::default();
    let mut malformed = Vec::new();

    for spec in catalog {
        match object.remove(&spec.name) {
            None => malformed.push(spec.name.clone()),
            Some(entry) => match parse_field(&entry) {
                Some(field) => {
                    extraction.fields.insert(spec.name.clone(), field);
                }
                None => {
                    malformed.push(spec.name.clone());
                    extraction.raw.insert(spec.name.clone(), entry.to_string());
                }
            },
        }
    }

    // Keys outside the catalog
    for (key, value) in object {
        extraction.raw.insert(key, value.to_string());
    }

    if malformed.is_empty() {
        Ok(ExtractionOutcome::Success(extraction))
    } else {
        Ok(ExtractionOutcome::PartialSuccess {
            extraction,
            malformed,
        })
    }
}

/// One `{value, confidence, reasoning}` entry, or `None` if it is malformed
fn parse_field(entry: &Value) -> Option<FieldValue> {
    let object = entry.as_object()?;
    if object.len() != ENTRY_KEYS.len() || !ENTRY_KEYS.iter().all(|k| object.contains_key(*k)) {
        return None;
    }

    let value = match &object["value"] {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        scalar @ (Value::Number(_) | Value::Bool(_)) => Some(scalar.to_string()),
        Value::Array(_) | Value::Object(_) => return None,
    };

    let confidence = object["confidence"].as_f64()?;
    if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
        return None;
    }

    let reasoning = object["reasoning"].as_str()?;
    Some(FieldValue::new(value, confidence, reasoning))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("INVOICE NO", "number"),
            FieldSpec::new("HS CODE", "tariff code"),
            FieldSpec::new("AMOUNT", "total"),
        ]
    }

    #[test]
    fn test_full_success() {
        let reply = r#"{
            "INVOICE NO": {"value": "INV-1", "confidence": 0.99, "reasoning": "header"},
            "HS CODE": {"value": null, "confidence": 0.0, "reasoning": "absent"},
            "AMOUNT": {"value": 1500.5, "confidence": 0.9, "reasoning": "total line"}
        }"#;
        let outcome = parse_extraction(reply, &catalog()).expect("object reply");
        let ExtractionOutcome::Success(extraction) = outcome else {
            panic!("expected success");
        };
        assert_eq!(extraction.fields["INVOICE NO"].value(), Some("INV-1"));
        assert_eq!(extraction.fields["AMOUNT"].value(), Some("1500.5"));
        assert!(extraction.fields["HS CODE"].value().is_none());
        assert!(extraction.raw.is_empty());
    }

    #[test]
    fn test_null_value_confidence_is_zeroed() {
        let reply = r#"{
            "INVOICE NO": {"value": null, "confidence": 0.7, "reasoning": "unreadable"},
            "HS CODE": {"value": "8471", "confidence": 1, "reasoning": "box 4"},
            "AMOUNT": {"value": "10", "confidence": 0.5, "reasoning": "total"}
        }"#;
        let outcome = parse_extraction(reply, &catalog()).expect("object reply");
        let extraction = outcome.extraction().expect("fields present");
        assert!(extraction.fields["INVOICE NO"].confidence().abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_when_fields_missing_or_malformed() {
        let reply = r#"{
            "INVOICE NO": {"value": "INV-1", "confidence": 0.99, "reasoning": "header"},
            "HS CODE": {"value": ["8471"], "confidence": 0.9, "reasoning": "list"},
            "SELLER": {"value": "ACME", "confidence": 0.9, "reasoning": "footer"}
        }"#;
        let outcome = parse_extraction(reply, &catalog()).expect("object reply");
        let ExtractionOutcome::PartialSuccess {
            extraction,
            malformed,
        } = outcome
        else {
            panic!("expected partial success");
        };
        assert_eq!(malformed, vec!["HS CODE", "AMOUNT"]);
        assert_eq!(extraction.fields.len(), 1);
        assert!(extraction.raw.contains_key("HS CODE"));
        assert!(extraction.raw.contains_key("SELLER"));
        assert!(!extraction.raw.contains_key("AMOUNT"));
    }

    #[test]
    fn test_entry_shape_rules() {
        let bad_entries = [
            r#"{"value": "x", "confidence": 0.5}"#,
            r#"{"value": "x", "confidence": 0.5, "reasoning": "r", "page": 1}"#,
            r#"{"value": "x", "confidence": -0.1, "reasoning": "r"}"#,
            r#"{"value": "x", "confidence": "0.5", "reasoning": "r"}"#,
            r#"{"value": {"a": 1}, "confidence": 0.5, "reasoning": "r"}"#,
            r#"{"value": "x", "confidence": 0.5, "reasoning": null}"#,
            r#""just text""#,
        ];
        for entry in bad_entries {
            let value: Value = serde_json::from_str(entry).expect("fixture json");
            assert!(parse_field(&value).is_none(), "expected malformed: {entry}");
        }
    }

    #[test]
    fn test_non_object_reply_is_malformed() {
        for reply in ["[1, 2]", "not json", "null"] {
            assert!(matches!(
                parse_extraction(reply, &catalog()),
                Err(ServiceError::MalformedResponse(_))
            ));
        }
    }
}
