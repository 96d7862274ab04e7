//! Environment source: `DDXGEN__SECTION__KEY=value`, e.g. `DDXGEN__GENERATION__MAX_RETRIES=3`.

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, Map};

pub const ENV_PREFIX: &str = "DDXGEN";
pub const ENV_SEPARATOR: &str = "__";

/// Add the environment layer. `vars` replaces the process environment when given.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    vars: Option<Map<String, String>>,
) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(vars),
    )
}
