//! Provider Registry
//!
//! Static capability bundles keyed by [`ProviderKind`]. Listing or resolving a provider never
//! builds an HTTP client or looks at credentials; that only happens when the bundle's client
//! factory is invoked.

use crate::error::PipelineError;
use crate::generation::CaseGenerator;
use crate::provider::{
    DeepSeekDiagnosisGenerator, DynProviderClient, GeminiClient, GeminiDiagnosisGenerator,
    OpenAICompatibleClient, OpenAIDiagnosisGenerator, ProviderSettings,
};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Supported generation backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderKind {
    OpenAI,
    DeepSeek,
    Gemini,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::OpenAI,
        ProviderKind::DeepSeek,
        ProviderKind::Gemini,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::Gemini => "gemini",
        }
    }

    pub fn bundle(&self) -> &'static ProviderBundle {
        match self {
            ProviderKind::OpenAI => &OPENAI,
            ProviderKind::DeepSeek => &DEEPSEEK,
            ProviderKind::Gemini => &GEMINI,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = PipelineError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.name() == normalized)
            .ok_or_else(|| PipelineError::UnknownProvider {
                name: normalized,
                available: list_providers().into_iter().collect::<Vec<_>>().join(", "),
            })
    }
}

/// Builds a live client from resolved settings.
pub type ClientFactory = fn(&ProviderSettings) -> Result<Box<DynProviderClient>, PipelineError>;

/// Environment variables a provider reads its settings from.
#[derive(Debug, Clone, Copy)]
pub struct ProviderEnv {
    pub api_key: &'static str,
    pub model: &'static str,
    pub base_url: Option<&'static str>,
}

/// Everything the workflow needs to run one provider.
pub struct ProviderBundle {
    pub kind: ProviderKind,
    pub client_factory: ClientFactory,
    pub generator: &'static dyn CaseGenerator<DynProviderClient>,
    /// Native result field -> output column
    pub rename_map: &'static [(&'static str, &'static str)],
    pub default_model: &'static str,
    pub default_base_url: &'static str,
    pub env: ProviderEnv,
}

impl ProviderBundle {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Construct the provider's client.
    ///
    /// A missing API key is a configuration error, raised before any request is made.
    pub fn create_client(
        &self,
        settings: &ProviderSettings,
    ) -> Result<Box<DynProviderClient>, PipelineError> {
        (self.client_factory)(settings)
    }
}

impl fmt::Debug for ProviderBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderBundle")
            .field("kind", &self.kind)
            .field("rename_map", &self.rename_map)
            .field("default_model", &self.default_model)
            .field("default_base_url", &self.default_base_url)
            .finish_non_exhaustive()
    }
}

fn require_api_key(kind: ProviderKind, settings: &ProviderSettings) -> Result<String, PipelineError> {
    match settings.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Ok(key.to_string()),
        _ => Err(PipelineError::Config(format!(
            "{} environment variable not set (no API key configured for provider '{}')",
            kind.bundle().env.api_key,
            kind.name()
        ))),
    }
}

fn model_or_default(kind: ProviderKind, settings: &ProviderSettings) -> String {
    settings
        .model
        .clone()
        .unwrap_or_else(|| kind.bundle().default_model.to_string())
}

fn base_url_or_default(kind: ProviderKind, settings: &ProviderSettings) -> String {
    settings
        .base_url
        .clone()
        .unwrap_or_else(|| kind.bundle().default_base_url.to_string())
}

fn openai_client(settings: &ProviderSettings) -> Result<Box<DynProviderClient>, PipelineError> {
    let kind = ProviderKind::OpenAI;
    let api_key = require_api_key(kind, settings)?;
    Ok(Box::new(OpenAICompatibleClient::new(
        kind.name(),
        model_or_default(kind, settings),
        api_key,
        Some(base_url_or_default(kind, settings)),
    )?))
}

fn deepseek_client(settings: &ProviderSettings) -> Result<Box<DynProviderClient>, PipelineError> {
    let kind = ProviderKind::DeepSeek;
    let api_key = require_api_key(kind, settings)?;
    Ok(Box::new(OpenAICompatibleClient::new(
        kind.name(),
        model_or_default(kind, settings),
        api_key,
        Some(base_url_or_default(kind, settings)),
    )?))
}

fn gemini_client(settings: &ProviderSettings) -> Result<Box<DynProviderClient>, PipelineError> {
    let kind = ProviderKind::Gemini;
    let api_key = require_api_key(kind, settings)?;
    Ok(Box::new(GeminiClient::new(
        model_or_default(kind, settings),
        api_key,
        Some(base_url_or_default(kind, settings)),
    )?))
}

static OPENAI: ProviderBundle = ProviderBundle {
    kind: ProviderKind::OpenAI,
    client_factory: openai_client,
    generator: &OpenAIDiagnosisGenerator,
    rename_map: &[
        ("first_diagnosis", "openai_first_diagnosis"),
        ("second_diagnosis", "openai_second_diagnosis"),
        ("third_diagnosis", "openai_third_diagnosis"),
        ("rationale", "openai_rationale"),
    ],
    default_model: "gpt-4.1",
    default_base_url: OpenAICompatibleClient::OPENAI_BASE_URL,
    env: ProviderEnv {
        api_key: "OPENAI_API_KEY",
        model: "OPENAI_MODEL",
        base_url: None,
    },
};

static DEEPSEEK: ProviderBundle = ProviderBundle {
    kind: ProviderKind::DeepSeek,
    client_factory: deepseek_client,
    generator: &DeepSeekDiagnosisGenerator,
    rename_map: &[],
    default_model: "accounts/fireworks/models/deepseek-r1-0528",
    default_base_url: "https://api.fireworks.ai/inference/v1",
    env: ProviderEnv {
        api_key: "FIREWORKS_API_KEY",
        model: "DEEPSEEK_MODEL",
        base_url: Some("FIREWORKS_BASE_URL"),
    },
};

static GEMINI: ProviderBundle = ProviderBundle {
    kind: ProviderKind::Gemini,
    client_factory: gemini_client,
    generator: &GeminiDiagnosisGenerator,
    rename_map: &[],
    default_model: "models/gemini-2.0-flash-exp",
    default_base_url: GeminiClient::DEFAULT_BASE_URL,
    env: ProviderEnv {
        api_key: "GOOGLE_API_KEY",
        model: "GEMINI_MODEL",
        base_url: None,
    },
};

/// Names of every registered provider, sorted.
pub fn list_providers() -> BTreeSet<&'static str> {
    ProviderKind::ALL.iter().map(ProviderKind::name).collect()
}

/// Resolve a provider by name (case-insensitive).
pub fn get_provider(name: &str) -> Result<&'static ProviderBundle, PipelineError> {
    name.parse::<ProviderKind>().map(|kind| kind.bundle())
}
