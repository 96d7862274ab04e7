//! Resumable batch runner: processes unfinished cases one at a time, retries failures with
//! exponential backoff, and checkpoints every success before moving on.

use crate::error::PipelineError;
use crate::generation::result::CaseGenerator;
use crate::store::{CaseId, CheckpointStore, CheckpointTable, Dataset, INDEX_COLUMN};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Attempt-indexed exponential backoff: attempt `n` waits `base * 2^n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
}

impl BackoffPolicy {
    pub const DEFAULT_BASE: Duration = Duration::from_secs(1);

    pub fn new(base: Duration) -> Self {
        Self { base }
    }

    /// No waiting between attempts.
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    /// Delay after failed attempt `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE)
    }
}

/// Configuration for the batch runner
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Attempts per case before it is abandoned (at least 1)
    pub max_retries: u32,
    /// Delay schedule between attempts of the same case
    pub backoff: BackoffPolicy,
}

impl BatchConfig {
    pub const DEFAULT_MAX_RETRIES: u32 = 5;
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_retries: Self::DEFAULT_MAX_RETRIES,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Outcome of one batch run.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Full checkpoint contents after the run, covering this and all earlier runs
    pub results: CheckpointTable,
    /// Cases generated during this run, in processing order
    pub succeeded: Vec<CaseId>,
    /// Cases abandoned after exhausting every attempt
    pub failed: Vec<CaseId>,
    /// Cases skipped because an earlier run already checkpointed them
    pub previously_done: usize,
}

impl BatchReport {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }
}

/// Sequential, resumable executor over a dataset.
pub struct BatchRunner {
    config: BatchConfig,
}

impl BatchRunner {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Generate a result for every case not yet present in `store`.
    ///
    /// Only configuration problems (bad retry ceiling, missing case column, malformed
    /// checkpoint) are returned as errors; failures of individual cases are logged and
    /// counted in the report.
    pub async fn run<S, G, C>(
        &self,
        dataset: &Dataset,
        case_column: &str,
        store: &S,
        generator: &G,
        client: &C,
    ) -> Result<BatchReport, PipelineError>
    where
        S: CheckpointStore + ?Sized,
        G: CaseGenerator<C> + ?Sized,
        C: ?Sized + Sync,
    {
        let max_retries = self.config.max_retries;
        if max_retries == 0 {
            return Err(PipelineError::Config(
                "max_retries must be at least 1".to_string(),
            ));
        }
        let case_pos = dataset.require_column(case_column)?;

        let existing = store.load()?;
        let done = existing
            .as_ref()
            .map(CheckpointTable::ids)
            .unwrap_or_default();
        if !done.is_empty() {
            info!(count = done.len(), "Loaded existing results from checkpoint");
        }

        let pending: Vec<CaseId> = dataset.ids().difference(&done).copied().collect();
        let previously_done = dataset.len() - pending.len();

        if pending.is_empty() {
            info!("No new cases to process");
            return Ok(BatchReport {
                results: existing.unwrap_or_else(|| CheckpointTable::empty(INDEX_COLUMN)),
                succeeded: Vec::new(),
                failed: Vec::new(),
                previously_done,
            });
        }
        drop(existing);

        let total = pending.len();
        info!(pending = total, previously_done, "Processing cases");

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for (position, id) in pending.into_iter().enumerate() {
            let case_text = dataset.value(id, case_pos).unwrap_or_default();
            if self.process_case(id, case_text, store, generator, client).await {
                succeeded.push(id);
                info!(case_id = %id, progress = position + 1, total, "Case completed");
            } else {
                failed.push(id);
                error!(
                    case_id = %id,
                    attempts = max_retries,
                    "Failed to process case after {} attempts", max_retries
                );
            }
        }

        info!(
            successes = succeeded.len(),
            failures = failed.len(),
            "Batch complete"
        );

        let results = store
            .load()?
            .unwrap_or_else(|| CheckpointTable::empty(INDEX_COLUMN));
        Ok(BatchReport {
            results,
            succeeded,
            failed,
            previously_done,
        })
    }

    /// Run every attempt for one case. Returns whether a result was checkpointed.
    async fn process_case<S, G, C>(
        &self,
        id: CaseId,
        case_text: &str,
        store: &S,
        generator: &G,
        client: &C,
    ) -> bool
    where
        S: CheckpointStore + ?Sized,
        G: CaseGenerator<C> + ?Sized,
        C: ?Sized + Sync,
    {
        let max_retries = self.config.max_retries;
        for attempt in 0..max_retries {
            let outcome = match generator.generate(case_text, client).await {
                Ok(result) => store.append(id, &result),
                Err(err) => Err(err),
            };

            match outcome {
                Ok(()) => return true,
                Err(err) => {
                    warn!(
                        case_id = %id,
                        attempt = attempt + 1,
                        max_retries,
                        transient = err.is_transient(),
                        error = %err,
                        "Generation attempt failed"
                    );
                    if attempt + 1 < max_retries {
                        sleep(self.config.backoff.delay_for(attempt)).await;
                    }
                }
            }
        }
        false
    }
}
