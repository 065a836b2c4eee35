use crate::grouping::SupportedExtensions;
use crate::providers::{Provider, ProviderConfig};
use crate::retry::RetryPolicy;
use crate::types::{FieldSpec, UNKNOWN_TYPE};
use crate::{log_debug, log_warn};

use anyhow::{Context, Result, anyhow, bail};
use dirs::config_dir;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Project configuration filename, looked up in the working directory
pub const PROJECT_CONFIG_FILENAME: &str = "casedocs.toml";

/// Configuration structure for a casedocs run
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct Config {
    /// Active AI provider
    #[serde(default)]
    pub provider: Provider,
    /// Provider-specific configurations, keyed by provider name
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// Worker pools and deadlines
    #[serde(default)]
    pub performance: PerformanceConfig,
    /// Backoff parameters for AI calls
    #[serde(default)]
    pub retry: RetryConfig,
    /// Acceptable document types and their field catalogs
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub instructions: InstructionsConfig,
    /// File this configuration was read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Performance and execution configuration
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Concurrent classification calls
    pub classification_workers: usize,
    /// Concurrent extraction calls
    pub extraction_workers: usize,
    /// Deadline for a single AI call attempt
    pub request_timeout_seconds: u64,
    /// Whether to enable verbose logging (includes HTTP internals)
    pub verbose_logging: bool,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            classification_workers: 4,
            extraction_workers: 4,
            request_timeout_seconds: 120,
            verbose_logging: false,
        }
    }
}

/// Retry budget and backoff shape
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_base: f64,
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_base: 2.0,
            jitter_fraction: 0.25,
        }
    }
}

/// Which document types exist and what to extract from each
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct CatalogConfig {
    #[serde(default)]
    pub acceptable_types: Vec<String>,
    /// Field catalog per document type, in extraction order
    #[serde(default)]
    pub fields: IndexMap<String, Vec<FieldSpec>>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let fields = IndexMap::from([
            (
                "INVOICE".to_string(),
                vec![
                    FieldSpec::new(
                        "TYPE OF INVOICE",
                        "Commercial, proforma, customs or tax invoice, from the document title",
                    ),
                    FieldSpec::new("INVOICE DATE", "Date the invoice was issued"),
                    FieldSpec::new("INVOICE NO", "Unique invoice number or reference"),
                    FieldSpec::new("BUYER NAME", "Party purchasing the goods (Bill To, Sold To)"),
                    FieldSpec::new("SELLER NAME", "Party issuing the invoice (exporter, shipper)"),
                    FieldSpec::new("CURRENCY", "Currency code of the invoice total"),
                    FieldSpec::new("TOTAL AMOUNT", "Grand total payable, digits only"),
                    FieldSpec::new("PAYMENT TERMS", "Agreed terms of payment"),
                    FieldSpec::new("HS CODE", "Harmonized System tariff code of the goods"),
                ],
            ),
            (
                "CRL".to_string(),
                vec![
                    FieldSpec::new(
                        "CUSTOMER REQUEST LETTER DATE",
                        "Date written on the customer's request letter",
                    ),
                    FieldSpec::new("APPLICANT NAME", "Party making the request to the bank"),
                    FieldSpec::new("BENEFICIARY NAME", "Party entitled to receive the payment"),
                    FieldSpec::new("BENEFICIARY BANK", "Bank holding the beneficiary's account"),
                    FieldSpec::new(
                        "BENEFICIARY ACCOUNT NO / IBAN",
                        "Account number or IBAN of the beneficiary",
                    ),
                    FieldSpec::new("CURRENCY", "Currency code of the requested amount"),
                    FieldSpec::new("AMOUNT", "Principal amount of the transaction"),
                    FieldSpec::new("DEBIT ACCOUNT NO", "Applicant account to be debited"),
                ],
            ),
        ]);

        Self {
            acceptable_types: vec![
                "INVOICE".to_string(),
                "CRL".to_string(),
                "PACKING_LIST".to_string(),
                "BL".to_string(),
            ],
            fields,
        }
    }
}

impl CatalogConfig {
    /// Acceptable labels with the "UNKNOWN" sentinel appended once
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .acceptable_types
            .iter()
            .filter(|t| t.as_str() != UNKNOWN_TYPE)
            .cloned()
            .collect();
        labels.push(UNKNOWN_TYPE.to_string());
        labels
    }

    /// Field catalog for a classified type, exact match
    pub fn fields_for(&self, doc_type: &str) -> Option<&[FieldSpec]> {
        self.fields.get(doc_type).map(Vec::as_slice)
    }
}

/// Which page files are picked up
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct FilesConfig {
    #[serde(default)]
    pub supported_extensions: SupportedExtensions,
}

/// Optional instruction template overrides
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct InstructionsConfig {
    /// Placeholders: `{num_pages}`, `{acceptable_types}`, `{schema}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    /// Placeholders: `{num_pages}`, `{doc_type}`, `{case_id}`, `{fields}`, `{schema}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction: Option<String>,
}

impl Config {
    /// Load configuration, preferring an explicit file, then the project
    /// file, then the personal config file, then defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        let project_path = PathBuf::from(PROJECT_CONFIG_FILENAME);
        if project_path.exists() {
            return Self::load_from(&project_path);
        }

        if let Ok(personal_path) = Self::get_config_path()
            && personal_path.exists()
        {
            return Self::load_from(&personal_path);
        }

        log_debug!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Self = toml::from_str(&content).map_err(|e| {
            anyhow!(
                "Invalid configuration file format in {}: {}",
                path.display(),
                e
            )
        })?;
        config.source = Some(path.to_path_buf());
        log_debug!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        log_debug!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Get the path to the personal configuration file
    pub fn get_config_path() -> Result<PathBuf> {
        let mut path =
            config_dir().ok_or_else(|| anyhow!("Unable to determine config directory"))?;
        path.push("casedocs");
        path.push("config.toml");
        Ok(path)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.performance.classification_workers == 0 {
            bail!("performance.classification_workers must be at least 1");
        }
        if self.performance.extraction_workers == 0 {
            bail!("performance.extraction_workers must be at least 1");
        }
        if self.performance.request_timeout_seconds == 0 {
            bail!("performance.request_timeout_seconds must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_fraction) {
            bail!(
                "retry.jitter_fraction must be between 0 and 1, got {}",
                self.retry.jitter_fraction
            );
        }
        if self.retry.backoff_base.is_nan() || self.retry.backoff_base < 1.0 {
            bail!(
                "retry.backoff_base must be at least 1.0, got {}",
                self.retry.backoff_base
            );
        }
        if self.catalog.labels().len() < 2 {
            bail!("catalog.acceptable_types must list at least one document type");
        }
        if self.catalog.fields.is_empty() {
            bail!("catalog.fields must configure fields for at least one document type");
        }
        if self.files.supported_extensions.is_empty() {
            bail!("files.supported_extensions must not be empty");
        }

        for doc_type in self.catalog.fields.keys() {
            if !self.catalog.acceptable_types.contains(doc_type) {
                log_warn!(
                    "Field catalog for '{}' is unreachable: not an acceptable type",
                    doc_type
                );
            }
        }
        Ok(())
    }

    /// Configuration for the active provider, or its defaults
    pub fn provider_config(&self) -> ProviderConfig {
        self.providers
            .get(self.provider.name())
            .cloned()
            .unwrap_or_else(|| ProviderConfig::with_defaults(self.provider))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.performance.request_timeout_seconds)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            backoff_base: self.retry.backoff_base,
            jitter_fraction: self.retry.jitter_fraction,
            attempt_timeout: Some(self.request_timeout()),
        }
    }

    /// Apply command-line overrides for worker pool sizes
    pub fn update_workers(&mut self, classification: Option<usize>, extraction: Option<usize>) {
        if let Some(workers) = classification {
            self.performance.classification_workers = workers;
        }
        if let Some(workers) = extraction {
            self.performance.extraction_workers = workers;
        }
    }
}
