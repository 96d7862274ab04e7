//! Configuration loader facade: composes sources and merge policy into a validated
//! [`PipelineConfig`].

use super::merge::builder_with_defaults;
use super::sources::{environment, explicit_file, global_file};
use super::PipelineConfig;
use crate::error::PipelineError;
use config::Map;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from every layer.
    ///
    /// Precedence (highest to lowest): `DDXGEN__*` environment variables, the `explicit`
    /// file, the user-level config file, built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<PipelineConfig, PipelineError> {
        let global = Self::global_config_path();
        Self::load_layers(global.as_deref(), explicit, None)
    }

    /// Load a single file over the defaults, ignoring the user file and environment.
    pub fn load_from_file(path: &Path) -> Result<PipelineConfig, PipelineError> {
        Self::load_layers(None, Some(path), Some(Map::new()))
    }

    /// Path of the user-level config file, if a home directory is known.
    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }

    pub(crate) fn load_layers(
        global: Option<&Path>,
        explicit: Option<&Path>,
        env: Option<Map<String, String>>,
    ) -> Result<PipelineConfig, PipelineError> {
        let mut builder = builder_with_defaults()?;
        builder = global_file::add_to_builder(builder, global);
        if let Some(path) = explicit {
            builder = explicit_file::add_to_builder(builder, path)?;
        }
        builder = environment::add_to_builder(builder, env);

        let config: PipelineConfig = builder.build()?.try_deserialize()?;
        config.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            PipelineError::Config(format!(
                "Configuration validation failed:\n{}",
                messages.join("\n")
            ))
        })?;

        debug!(
            providers = config.providers.len(),
            max_retries = config.generation.max_retries,
            "Configuration loaded"
        );
        Ok(config)
    }
}
