//! Configuration System
//!
//! Layered run configuration: built-in defaults, the user-level config file, an explicit
//! `--config` file, and `DDXGEN__*` environment variables. Provider credentials are resolved
//! separately from the provider-specific environment variables, once, at the binary boundary.

use crate::generation::{BackoffPolicy, BatchConfig};
use crate::logging::LoggingConfig;
use crate::provider::ProviderSettings;
use crate::registry::ProviderKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Batch and input settings
    #[serde(default)]
    pub generation: GenerationSettings,

    /// Per-provider overrides keyed by provider name
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderSettings>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Batch runner and input settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff unit; attempt n waits `retry_base_delay_ms * 2^n`
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Input column holding the case text
    #[serde(default = "default_case_column")]
    pub case_column: String,
}

fn default_max_retries() -> u32 {
    BatchConfig::DEFAULT_MAX_RETRIES
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_case_column() -> String {
    "case_description".to_string()
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            case_column: default_case_column(),
        }
    }
}

impl GenerationSettings {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.max_retries == 0 {
            errors.push(ValidationError::Generation(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if self.case_column.trim().is_empty() {
            errors.push(ValidationError::Generation(
                "case_column cannot be empty".to_string(),
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            max_retries: self.max_retries,
            backoff: BackoffPolicy::new(Duration::from_millis(self.retry_base_delay_ms)),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Provider(String, String),
    Generation(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Provider(name, msg) => {
                write!(f, "Provider '{}': {}", name, msg)
            }
            ValidationError::Generation(msg) => {
                write!(f, "Generation: {}", msg)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl PipelineConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = self.generation.validate().err().unwrap_or_default();

        for name in self.providers.keys() {
            if let Err(e) = name.parse::<ProviderKind>() {
                errors.push(ValidationError::Provider(name.clone(), e.to_string()));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Settings for `kind`: the configured section overlaid with the provider's environment.
    pub fn provider_settings(&self, kind: ProviderKind) -> ProviderSettings {
        let configured = self
            .providers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(kind.name()))
            .map(|(_, settings)| settings);
        ProviderSettings::resolve(kind, configured)
    }
}

impl ProviderSettings {
    /// Overlay `kind`'s environment variables (`OPENAI_API_KEY`, `GEMINI_MODEL`, ...) on the
    /// configured settings. Set, non-empty variables win.
    pub fn resolve(kind: ProviderKind, configured: Option<&ProviderSettings>) -> ProviderSettings {
        Self::resolve_with(kind, configured, |name| std::env::var(name).ok())
    }

    pub(crate) fn resolve_with<F>(
        kind: ProviderKind,
        configured: Option<&ProviderSettings>,
        lookup: F,
    ) -> ProviderSettings
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = kind.bundle().env;
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut settings = configured.cloned().unwrap_or_default();

        if let Some(key) = read(env.api_key) {
            settings.api_key = Some(key);
        }
        if let Some(model) = read(env.model) {
            settings.model = Some(model);
        }
        if let Some(base_url) = env.base_url.and_then(read) {
            settings.base_url = Some(base_url);
        }
        settings
    }
}
