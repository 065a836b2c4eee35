//! Per-group pipeline stages
//!
//! Each stage turns one `DocumentGroup` into an outcome and never returns an
//! error: every failure is captured in the outcome so sibling groups carry on.

pub mod classify;
pub mod extract;

pub use classify::ClassificationStage;
pub use extract::ExtractionStage;

use crate::error::StageError;
use crate::llm_providers::ModelPart;
use crate::types::DocumentGroup;

/// Read every page of a group, in page order
pub async fn load_parts(group: &DocumentGroup) -> Result<Vec<ModelPart>, StageError> {
    let mut parts = Vec::with_capacity(group.pages.len());
    for page in &group.pages {
        let data = tokio::fs::read(&page.path)
            .await
            .map_err(|source| StageError::FileIo {
                file: page.file_name.clone(),
                source,
            })?;
        parts.push(ModelPart {
            data,
            mime_type: page.mime_type.clone(),
        });
    }
    Ok(parts)
}

/// Unwrap a reply wrapped in a Markdown code fence, e.g. ```` ```json ... ``` ````
pub fn strip_json_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest
            .strip_prefix("json")
            .or_else(|| rest.strip_prefix("JSON"))
            .unwrap_or(rest);
        if let Some(inner) = rest.trim_end().strip_suffix("```") {
            return inner.trim();
        }
    }
    trimmed
}
