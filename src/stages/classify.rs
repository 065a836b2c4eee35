use super::{load_parts, strip_json_fence};
use crate::error::{ServiceError, StageError};
use crate::llm_providers::{ModelRequest, RequestPurpose};
use crate::prompts::Instructions;
use crate::retry::RetryingClient;
use crate::types::{Classification, ClassificationOutcome, DocumentGroup, UNKNOWN_TYPE};
use crate::{trace_debug, trace_warn};

use std::sync::Arc;

/// Asks the model which acceptable type a document group is
#[derive(Clone)]
pub struct ClassificationStage {
    client: RetryingClient,
    instructions: Arc<Instructions>,
}

impl ClassificationStage {
    pub fn new(client: RetryingClient, instructions: Arc<Instructions>) -> Self {
        Self {
            client,
            instructions,
        }
    }

    /// Classify one group against `acceptable_types` ("UNKNOWN" is always accepted)
    pub async fn classify(
        &self,
        group: &DocumentGroup,
        acceptable_types: &[String],
    ) -> ClassificationOutcome {
        match self.try_classify(group, acceptable_types).await {
            Ok(classification) => {
                trace_debug!(
                    case_id = %group.case_id,
                    group = %group.base_name,
                    classified_type = %classification.classified_type,
                    confidence = classification.confidence,
                    "classified"
                );
                ClassificationOutcome::Success(classification)
            }
            Err(err) => {
                let failure = err.into_failure();
                trace_warn!(
                    case_id = %group.case_id,
                    group = %group.base_name,
                    kind = %failure.kind,
                    "classification failed: {}",
                    failure.detail
                );
                ClassificationOutcome::Failure(failure)
            }
        }
    }

    async fn try_classify(
        &self,
        group: &DocumentGroup,
        acceptable_types: &[String],
    ) -> Result<Classification, StageError> {
        let parts = load_parts(group).await?;
        let request = ModelRequest {
            purpose: RequestPurpose::Classification,
            label: group.key().to_string(),
            instruction: self.instructions.classification(group, acceptable_types),
            parts,
        };

        let reply = self.client.invoke(&request).await?;
        Ok(parse_classification(&reply, acceptable_types)?)
    }
}

/// Strictly parse a classification reply
pub fn parse_classification(
    reply: &str,
    acceptable_types: &[String],
) -> Result<Classification, ServiceError> {
    let classification: Classification = serde_json::from_str(strip_json_fence(reply))
        .map_err(|e| ServiceError::MalformedResponse(format!("classification reply: {e}")))?;

    if !classification.confidence.is_finite() || !(0.0..=1.0).contains(&classification.confidence)
    {
        return Err(ServiceError::MalformedResponse(format!(
            "classification confidence {} is outside [0, 1]",
            classification.confidence
        )));
    }

    let known = classification.classified_type == UNKNOWN_TYPE
        || acceptable_types.contains(&classification.classified_type);
    if !known {
        return Err(ServiceError::MalformedResponse(format!(
            "classified type '{}' is not an acceptable type",
            classification.classified_type
        )));
    }

    Ok(classification)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types() -> Vec<String> {
        vec!["INVOICE".to_string(), "CRL".to_string()]
    }

    #[test]
    fn test_parses_valid_reply() {
        let reply = r#"```json
{"classified_type": "INVOICE", "confidence": 0.95, "reasoning": "Titled INVOICE"}
```"#;
        let classification = parse_classification(reply, &types()).expect("valid reply");
        assert_eq!(classification.classified_type, "INVOICE");

        let unknown = parse_classification(
            r#"{"classified_type": "UNKNOWN", "confidence": 0, "reasoning": "unclear"}"#,
            &types(),
        )
        .expect("UNKNOWN is always acceptable");
        assert!(unknown.is_unknown());
    }

    #[test]
    fn test_rejects_deviations() {
        let cases = [
            r#"{"classified_type": "INVOICE", "confidence": 0.9}"#,
            r#"{"classified_type": "INVOICE", "confidence": 0.9, "reasoning": "", "extra": 1}"#,
            r#"{"classified_type": "INVOICE", "confidence": 1.2, "reasoning": ""}"#,
            r#"{"classified_type": "invoice", "confidence": 0.9, "reasoning": ""}"#,
            r#"{"classified_type": "INVOICE", "confidence": "high", "reasoning": ""}"#,
            "The document is an invoice.",
        ];
        for reply in cases {
            assert!(
                matches!(
                    parse_classification(reply, &types()),
                    Err(ServiceError::MalformedResponse(_))
                ),
                "expected malformed: {reply}"
            );
        }
    }
}
