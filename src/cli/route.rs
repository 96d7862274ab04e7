//! CLI route: single route table and run context. Dispatches to the generation workflow and
//! presentation.

use crate::cli::parse::Commands;
use crate::cli::presentation::{
    format_generation_summary, format_provider_list_json, format_provider_list_text,
    ProviderListing,
};
use crate::config::{ConfigLoader, PipelineConfig};
use crate::error::PipelineError;
use crate::generation::{run_generation, GenerateRequest};
use crate::registry::{get_provider, ProviderKind};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Runtime context for CLI execution: the loaded configuration.
pub struct RunContext {
    config: PipelineConfig,
}

impl RunContext {
    /// Load configuration (user file, optional `--config` file, environment).
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, PipelineError> {
        let config = ConfigLoader::load(config_path.as_deref())?;
        Ok(Self { config })
    }

    /// Execute a command, returning the text to print on success.
    pub async fn execute(&self, command: &Commands) -> Result<String, PipelineError> {
        match command {
            Commands::Generate {
                provider,
                input,
                output,
                temp_output,
                column,
                max_retries,
                retry_base_delay_ms,
            } => {
                let kind = get_provider(provider)?.kind;
                let mut settings = self.config.generation.clone();
                if let Some(column) = column {
                    settings.case_column = column.clone();
                }
                if let Some(max_retries) = max_retries {
                    settings.max_retries = *max_retries;
                }
                if let Some(delay) = retry_base_delay_ms {
                    settings.retry_base_delay_ms = *delay;
                }
                settings.validate().map_err(|errors| {
                    let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                    PipelineError::Config(format!(
                        "Invalid generation options:\n{}",
                        messages.join("\n")
                    ))
                })?;
                let batch = settings.batch_config();

                let request = GenerateRequest {
                    provider_name: kind.name().to_string(),
                    input_path: input.clone(),
                    output_path: output.clone(),
                    checkpoint_path: temp_output.clone(),
                    case_column: settings.case_column,
                    batch,
                };
                let provider_settings = self.config.provider_settings(kind);
                let model = provider_settings
                    .model
                    .clone()
                    .unwrap_or_else(|| kind.bundle().default_model.to_string());

                let started = Instant::now();
                let outcome = run_generation(&request, &provider_settings).await?;
                info!(
                    provider = %kind,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Generation command finished"
                );

                Ok(format_generation_summary(
                    kind.name(),
                    &model,
                    &outcome,
                    &request.output_path,
                ))
            }
            Commands::Providers { format } => {
                let mut listings: Vec<ProviderListing> = ProviderKind::ALL
                    .iter()
                    .map(|kind| {
                        let settings = self.config.provider_settings(*kind);
                        let model = settings
                            .model
                            .clone()
                            .unwrap_or_else(|| kind.bundle().default_model.to_string());
                        let key_set = settings
                            .api_key
                            .as_deref()
                            .is_some_and(|k| !k.trim().is_empty());
                        ProviderListing::from_bundle(kind.bundle(), model, key_set)
                    })
                    .collect();
                listings.sort_by(|a, b| a.name.cmp(&b.name));

                match format.as_str() {
                    "json" => Ok(format_provider_list_json(&listings)),
                    "text" => Ok(format_provider_list_text(&listings)),
                    other => Err(PipelineError::Config(format!(
                        "Invalid format: {} (must be 'text' or 'json')",
                        other
                    ))),
                }
            }
        }
    }
}
