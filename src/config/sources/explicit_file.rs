//! Explicit config file source: the file named by `--config`. It must exist.

use crate::error::PipelineError;
use config::builder::DefaultState;
use config::ConfigBuilder;
use config::File;
use std::path::Path;

pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
) -> Result<ConfigBuilder<DefaultState>, PipelineError> {
    if !path.is_file() {
        return Err(PipelineError::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }
    Ok(builder.add_source(File::from(path.to_path_buf()).required(true)))
}
