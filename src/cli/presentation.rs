//! CLI presentation: text and json formatters for command results.

use crate::generation::GenerationOutcome;
use crate::registry::ProviderBundle;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde_json::json;
use std::path::Path;

/// One row of `ddxgen providers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderListing {
    pub name: String,
    pub model: String,
    pub api_key_env: String,
    pub api_key_set: bool,
    /// Output column prefix added on merge, if any
    pub column_prefix: Option<String>,
}

impl ProviderListing {
    pub fn from_bundle(bundle: &ProviderBundle, model: String, api_key_set: bool) -> Self {
        let column_prefix = bundle.rename_map.first().and_then(|(from, to)| {
            to.strip_suffix(from).map(str::to_string)
        });
        Self {
            name: bundle.name().to_string(),
            model,
            api_key_env: bundle.env.api_key.to_string(),
            api_key_set,
            column_prefix,
        }
    }

    fn rename_description(&self) -> String {
        match &self.column_prefix {
            Some(prefix) => format!("prefix '{}'", prefix),
            None => "native names".to_string(),
        }
    }
}

pub fn format_provider_list_text(providers: &[ProviderListing]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Provider", "Model", "API key", "Result columns"]);
    for provider in providers {
        let key_status = if provider.api_key_set {
            format!("{} (set)", provider.api_key_env)
        } else {
            format!("{} (missing)", provider.api_key_env)
        };
        table.add_row(vec![
            provider.name.clone(),
            provider.model.clone(),
            key_status,
            provider.rename_description(),
        ]);
    }
    format!("{}\n\nTotal: {} provider(s)", table, providers.len())
}

pub fn format_provider_list_json(providers: &[ProviderListing]) -> String {
    let list: Vec<_> = providers
        .iter()
        .map(|p| {
            json!({
                "name": p.name,
                "model": p.model,
                "api_key_env": p.api_key_env,
                "api_key_set": p.api_key_set,
                "column_prefix": p.column_prefix,
            })
        })
        .collect();
    let out = json!({ "providers": list, "total": providers.len() });
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_generation_summary(
    provider: &str,
    model: &str,
    outcome: &GenerationOutcome,
    output_path: &Path,
) -> String {
    let report = &outcome.report;
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec!["Provider".to_string(), provider.to_string()]);
    table.add_row(vec!["Model".to_string(), model.to_string()]);
    table.add_row(vec!["Rows".to_string(), outcome.merged.len().to_string()]);
    table.add_row(vec![
        "New successes".to_string(),
        report.success_count().to_string(),
    ]);
    table.add_row(vec![
        "Failures".to_string(),
        report.failure_count().to_string(),
    ]);
    table.add_row(vec![
        "Previously done".to_string(),
        report.previously_done.to_string(),
    ]);

    let mut out = format!("{}\n\nOutput: {}", table, output_path.display());
    if !report.failed.is_empty() {
        let ids: Vec<String> = report.failed.iter().map(ToString::to_string).collect();
        out.push_str(&format!(
            "\nFailed cases (rerun to retry): {}",
            ids.join(", ")
        ));
    }
    out
}
