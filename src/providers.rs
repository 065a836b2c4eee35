//! AI provider configuration.
//!
//! Single source of truth for supported providers and their defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Supported multimodal AI providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Gemini through the Generative Language API (API key)
    #[default]
    Google,
    /// Gemini through Vertex AI (project, location and access token)
    Vertex,
}

impl Provider {
    /// All available providers
    pub const ALL: &'static [Provider] = &[Provider::Google, Provider::Vertex];

    /// Provider name as used in config files and CLI
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Vertex => "vertex",
        }
    }

    /// Default model, able to read PDF and image pages
    pub const fn default_model(&self) -> &'static str {
        match self {
            Self::Google => "gemini-2.5-pro",
            Self::Vertex => "gemini-1.5-pro-002",
        }
    }

    /// Environment variable holding the credential
    pub const fn api_key_env(&self) -> &'static str {
        match self {
            Self::Google => "GOOGLE_API_KEY",
            Self::Vertex => "VERTEX_ACCESS_TOKEN",
        }
    }

    /// Whether requests are scoped to a cloud project and region
    pub const fn requires_project(&self) -> bool {
        matches!(self, Self::Vertex)
    }

    /// Get all provider names as strings
    pub fn all_names() -> Vec<&'static str> {
        Self::ALL.iter().map(Self::name).collect()
    }
}

impl FromStr for Provider {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        // "gemini" is the name most people reach for
        let normalized = match lower.as_str() {
            "gemini" => "google",
            "vertexai" | "vertex-ai" => "vertex",
            other => other,
        };

        Self::ALL
            .iter()
            .find(|p| p.name() == normalized)
            .copied()
            .ok_or_else(|| ProviderError::Unknown(s.to_string()))
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Provider configuration error
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Unknown provider: {0}. Supported: google, vertex")]
    Unknown(String),
    #[error("API key required for provider: {0} (set {1})")]
    MissingApiKey(String, &'static str),
    #[error("Provider {0} requires `project` (or GOOGLE_CLOUD_PROJECT)")]
    MissingProject(String),
}

/// Per-provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key or access token (loaded from env when empty)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    /// Model name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    /// Cloud project (Vertex only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Cloud region (Vertex only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Base URL override, mainly for proxies and tests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Extra `generationConfig` entries (temperature, topP, ...)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub additional_params: HashMap<String, String>,
}

/// Region used for Vertex AI when none is configured
pub const DEFAULT_VERTEX_LOCATION: &str = "us-central1";

impl ProviderConfig {
    /// Create config with defaults for a provider
    pub fn with_defaults(provider: Provider) -> Self {
        Self {
            model: provider.default_model().to_string(),
            location: provider
                .requires_project()
                .then(|| DEFAULT_VERTEX_LOCATION.to_string()),
            ..Self::default()
        }
    }

    /// Get effective model (configured or default)
    pub fn effective_model(&self, provider: Provider) -> &str {
        if self.model.is_empty() {
            provider.default_model()
        } else {
            &self.model
        }
    }

    /// Configured credential, falling back to the provider's env var
    pub fn effective_api_key(&self, provider: Provider) -> Option<String> {
        if self.has_api_key() {
            return Some(self.api_key.clone());
        }
        std::env::var(provider.api_key_env())
            .ok()
            .filter(|key| !key.is_empty())
    }

    /// Configured project, falling back to `GOOGLE_CLOUD_PROJECT`
    pub fn effective_project(&self) -> Option<String> {
        self.project
            .clone()
            .or_else(|| std::env::var("GOOGLE_CLOUD_PROJECT").ok())
            .filter(|p| !p.is_empty())
    }

    pub fn effective_location(&self) -> &str {
        self.location.as_deref().unwrap_or(DEFAULT_VERTEX_LOCATION)
    }

    /// Check if this config has an API key set
    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}
