//! Error types for the ddxgen batch generation pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Storage-related errors (input, checkpoint and output artifacts)
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Checkpoint {} schema mismatch: {detail}", path.display())]
    SchemaMismatch { path: PathBuf, detail: String },
}

impl StorageError {
    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        StorageError::Csv {
            path: path.into(),
            source,
        }
    }
}

/// Pipeline errors.
///
/// `Config` and `UnknownProvider` are fatal and surface to the caller. Every other variant
/// can be raised by a single item's generation attempt and is retried by the batch runner.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown provider '{name}'. Available: {available}")]
    UnknownProvider { name: String, available: String },

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Provider request failed: {0}")]
    ProviderRequestFailed(String),

    #[error("Provider authentication failed: {0}")]
    ProviderAuthFailed(String),

    #[error("Provider rate limit exceeded: {0}")]
    ProviderRateLimit(String),

    #[error("Provider model not found: {0}")]
    ProviderModelNotFound(String),

    #[error("Failed to parse provider response: {0}")]
    ResponseParse(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl PipelineError {
    /// Whether the error is likely to clear on a later attempt.
    ///
    /// Informational only: the batch runner retries every item error regardless.
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::Config(_) | PipelineError::UnknownProvider { .. } => false,
            PipelineError::ResponseParse(_) => false,
            PipelineError::ProviderAuthFailed(_) => false,
            PipelineError::ProviderModelNotFound(_) => false,
            PipelineError::ProviderRateLimit(_) => true,
            PipelineError::ProviderRequestFailed(_) => true,
            PipelineError::ProviderError(_) => true,
            PipelineError::Storage(_) => true,
        }
    }
}

impl From<config::ConfigError> for PipelineError {
    fn from(err: config::ConfigError) -> Self {
        PipelineError::Config(err.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Storage(StorageError::IoError(err))
    }
}
