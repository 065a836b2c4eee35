//! AI service contract
//!
//! The pipeline talks to the model only through `DocumentModel`: one
//! instruction plus an ordered list of binary page parts in, JSON text out.
//! Transport failures and safety blocks come back as `ServiceError`s.

pub mod gemini;

use crate::config::Config;
use crate::error::ServiceError;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

pub use gemini::GeminiProvider;

/// Which pipeline stage a request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestPurpose {
    Classification,
    Extraction,
}

impl fmt::Display for RequestPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classification => f.write_str("classification"),
            Self::Extraction => f.write_str("extraction"),
        }
    }
}

/// A binary page payload with its MIME type
#[derive(Clone, PartialEq, Eq)]
pub struct ModelPart {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl fmt::Debug for ModelPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelPart")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// One multimodal request: instruction text followed by ordered pages
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub purpose: RequestPurpose,
    /// Human-readable label for logs, usually `case/group`
    pub label: String,
    pub instruction: String,
    pub parts: Vec<ModelPart>,
}

/// A multimodal model that answers with JSON text
#[async_trait]
pub trait DocumentModel: Send + Sync {
    /// Model identifier, for logs and reports
    fn name(&self) -> &str;

    /// Send one request. Safety blocks surface as `ServiceError::ContentBlocked`.
    async fn generate(&self, request: &ModelRequest) -> Result<String, ServiceError>;
}

/// Build the configured model client once, to be shared by every worker
pub fn build_model(config: &Config) -> Result<Arc<dyn DocumentModel>> {
    let provider = GeminiProvider::from_config(config)?;
    Ok(Arc::new(provider))
}
