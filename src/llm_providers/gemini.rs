use super::{DocumentModel, ModelRequest};
use crate::config::Config;
use crate::error::ServiceError;
use crate::log_debug;
use crate::providers::{Provider, ProviderConfig, ProviderError};

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

const GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Harm categories relaxed to `BLOCK_NONE`; scanned trade documents trip them easily
const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_HARASSMENT",
];

/// Finish reasons that mean the answer was withheld
const BLOCKING_FINISH_REASONS: [&str; 4] = ["SAFETY", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII"];

enum Auth {
    ApiKey(String),
    Bearer(String),
}

/// Gemini `generateContent` client for both the public API and Vertex AI
pub struct GeminiProvider {
    client: Client,
    url: Url,
    auth: Auth,
    model: String,
    additional_params: HashMap<String, String>,
}

impl GeminiProvider {
    /// Build the provider described by the active configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = config.provider;
        let provider_config = config.provider_config();
        let timeout = Duration::from_secs(config.performance.request_timeout_seconds);
        Self::new(provider, &provider_config, timeout)
    }

    pub fn new(
        provider: Provider,
        provider_config: &ProviderConfig,
        request_timeout: Duration,
    ) -> Result<Self> {
        let model = provider_config.effective_model(provider).to_string();
        let key = provider_config
            .effective_api_key(provider)
            .ok_or_else(|| ProviderError::MissingApiKey(provider.to_string(), provider.api_key_env()))?;

        let (url, auth) = match provider {
            Provider::Google => {
                let base = provider_config.endpoint.as_deref().unwrap_or(GOOGLE_BASE_URL);
                let url = Url::parse(base)
                    .and_then(|u| u.join(&format!("/v1beta/models/{model}:generateContent")))
                    .with_context(|| format!("Invalid Gemini endpoint: {base}"))?;
                (url, Auth::ApiKey(key))
            }
            Provider::Vertex => {
                let project = provider_config
                    .effective_project()
                    .ok_or_else(|| ProviderError::MissingProject(provider.to_string()))?;
                let location = provider_config.effective_location();
                let base = provider_config.endpoint.clone().unwrap_or_else(|| {
                    format!("https://{location}-aiplatform.googleapis.com")
                });
                let path = format!(
                    "/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:generateContent"
                );
                let url = Url::parse(&base)
                    .and_then(|u| u.join(&path))
                    .with_context(|| format!("Invalid Vertex AI endpoint: {base}"))?;
                (url, Auth::Bearer(key))
            }
        };

        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        log_debug!("Gemini provider ready: model={}, url={}", model, url);

        Ok(Self {
            client,
            url,
            auth,
            model,
            additional_params: provider_config.additional_params.clone(),
        })
    }

    /// Assemble the JSON request body for one multimodal call
    fn request_body(&self, request: &ModelRequest) -> Value {
        let mut parts = vec![json!({ "text": request.instruction })];
        parts.extend(request.parts.iter().map(|part| {
            json!({
                "inlineData": {
                    "mimeType": part.mime_type,
                    "data": BASE64.encode(&part.data),
                }
            })
        }));

        let safety_settings: Vec<Value> = SAFETY_CATEGORIES
            .iter()
            .map(|category| json!({ "category": category, "threshold": "BLOCK_NONE" }))
            .collect();

        let mut body = json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": { "responseMimeType": "application/json" },
            "safetySettings": safety_settings,
        });

        // Add additional parameters from the configuration
        for (key, value) in &self.additional_params {
            // Try to convert the value to a number first if it looks like one
            if let Ok(num_val) = value.parse::<f64>() {
                body["generationConfig"][key] = json!(num_val);
            } else {
                body["generationConfig"][key] = json!(value);
            }
        }

        body
    }
}

#[async_trait]
impl DocumentModel for GeminiProvider {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &ModelRequest) -> Result<String, ServiceError> {
        log_debug!(
            "Sending {} request for {} ({} parts)",
            request.purpose,
            request.label,
            request.parts.len()
        );

        let builder = self.client.post(self.url.clone());
        let builder = match &self.auth {
            Auth::ApiKey(key) => builder.header("x-goog-api-key", key),
            Auth::Bearer(token) => builder.bearer_auth(token),
        };

        let response = builder.json(&self.request_body(request)).send().await?;

        // Check for successful response
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(ServiceError::from_status(status, &text));
        }

        let body: GenerateContentResponse = response.json().await?;
        interpret_response(body)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Reduce a `generateContent` response to its text, or to a block signal
fn interpret_response(body: GenerateContentResponse) -> Result<String, ServiceError> {
    if let Some(reason) = body.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ServiceError::ContentBlocked(reason));
    }

    let Some(candidate) = body.candidates.into_iter().next() else {
        return Err(ServiceError::MalformedResponse(
            "response contained no candidates".to_string(),
        ));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if !text.trim().is_empty() {
        return Ok(text);
    }

    match candidate.finish_reason {
        Some(reason) if BLOCKING_FINISH_REASONS.contains(&reason.as_str()) => {
            Err(ServiceError::ContentBlocked(reason))
        }
        Some(reason) => Err(ServiceError::MalformedResponse(format!(
            "empty response (finish reason {reason})"
        ))),
        None => Err(ServiceError::MalformedResponse("empty response".to_string())),
    }
}
