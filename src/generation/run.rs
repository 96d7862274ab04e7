//! Single generate entry point: resolve provider, load input, run the batch, merge, write.
//! The CLI and other callers use this only; no runner or merge orchestration in adapters.

use crate::error::PipelineError;
use crate::generation::executor::{BatchConfig, BatchReport, BatchRunner};
use crate::generation::merge::{merge_results, MergedTable};
use crate::generation::result::CaseGenerator;
use crate::provider::ProviderSettings;
use crate::registry::{get_provider, ProviderKind};
use crate::store::{ensure_parent_dir, CsvCheckpointStore, Dataset, INDEX_COLUMN};
use std::path::PathBuf;
use tracing::info;

/// Request for one generation run.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub provider_name: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Checkpoint file; resuming with the same path skips finished cases
    pub checkpoint_path: PathBuf,
    pub case_column: String,
    pub batch: BatchConfig,
}

/// Result of one generation run.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub merged: MergedTable,
    pub report: BatchReport,
}

fn format_failure_sample(report: &BatchReport, max_samples: usize) -> String {
    let samples: Vec<String> = report
        .failed
        .iter()
        .take(max_samples)
        .map(ToString::to_string)
        .collect();
    if samples.is_empty() {
        return String::new();
    }
    let mut out = samples.join(", ");
    let remaining = report.failed.len().saturating_sub(samples.len());
    if remaining > 0 {
        out.push_str(&format!(" ... and {} more", remaining));
    }
    out
}

fn resolve_provider(name: &str) -> Result<ProviderKind, PipelineError> {
    get_provider(name).map(|bundle| bundle.kind).map_err(|e| match e {
        PipelineError::UnknownProvider { name, available } => PipelineError::Config(format!(
            "Unknown provider '{}'. Choose one of: {}",
            name, available
        )),
        other => other,
    })
}

/// Run generation for `request` with a freshly constructed provider client.
///
/// Configuration problems (unknown provider, missing column, bad identifiers, missing API key)
/// surface before any API call or checkpoint write.
pub async fn run_generation(
    request: &GenerateRequest,
    settings: &ProviderSettings,
) -> Result<GenerationOutcome, PipelineError> {
    let kind = resolve_provider(&request.provider_name)?;
    let bundle = kind.bundle();

    let dataset = Dataset::load(&request.input_path)?;
    dataset.require_column(&request.case_column)?;
    info!(
        provider = %kind,
        input = %request.input_path.display(),
        rows = dataset.len(),
        "Loaded input dataset"
    );

    ensure_parent_dir(&request.checkpoint_path)?;
    ensure_parent_dir(&request.output_path)?;

    let client = bundle.create_client(settings)?;
    info!(
        provider = client.provider_name(),
        model = client.model_name(),
        "Provider client ready"
    );

    execute_generation(
        request,
        &dataset,
        bundle.generator,
        &*client,
        bundle.rename_map,
    )
    .await
}

/// Batch, merge and write for an already loaded dataset and constructed client.
pub async fn execute_generation<G, C>(
    request: &GenerateRequest,
    dataset: &Dataset,
    generator: &G,
    client: &C,
    rename_map: &[(&str, &str)],
) -> Result<GenerationOutcome, PipelineError>
where
    G: CaseGenerator<C> + ?Sized,
    C: ?Sized + Sync,
{
    let store = CsvCheckpointStore::new(&request.checkpoint_path, INDEX_COLUMN);
    let runner = BatchRunner::new(request.batch.clone());
    let report = runner
        .run(dataset, &request.case_column, &store, generator, client)
        .await?;

    if !report.failed.is_empty() {
        info!(
            failures = report.failure_count(),
            "Cases without a result: {}",
            format_failure_sample(&report, 10)
        );
    }

    let merged = merge_results(dataset, &report.results, rename_map);
    merged.write(&request.output_path)?;
    info!(
        output = %request.output_path.display(),
        rows = merged.len(),
        columns = merged.columns.len(),
        "Wrote merged output"
    );

    Ok(GenerationOutcome { merged, report })
}
