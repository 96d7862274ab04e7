//! Repeated resumed runs never write more than one checkpoint row per case.

use async_trait::async_trait;
use ddxgen::error::PipelineError;
use ddxgen::generation::{BackoffPolicy, BatchConfig, BatchRunner, CaseGenerator, GenerationResult};
use ddxgen::store::{CheckpointStore, CsvCheckpointStore, Dataset, INDEX_COLUMN};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet};
use tempfile::TempDir;

/// Fails every attempt for the listed case texts.
struct FailingFor(HashSet<String>);

#[async_trait]
impl CaseGenerator<()> for FailingFor {
    async fn generate(
        &self,
        case_text: &str,
        _client: &(),
    ) -> Result<GenerationResult, PipelineError> {
        if self.0.contains(case_text) {
            return Err(PipelineError::ProviderRequestFailed("boom".to_string()));
        }
        Ok(GenerationResult::new().with_field("gemini_first_diagnosis", case_text))
    }
}

fn checkpoint_ids(path: &std::path::Path) -> Vec<String> {
    if !path.exists() {
        return Vec::new();
    }
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader
        .records()
        .map(|r| r.unwrap().get(0).unwrap().to_string())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_at_most_one_row_per_case(
        size in 1usize..12,
        runs in prop::collection::vec(prop::collection::btree_set(0usize..12, 0..12), 1..5),
    ) {
        let dir = TempDir::new().unwrap();
        let store = CsvCheckpointStore::new(dir.path().join("partial.csv"), INDEX_COLUMN);
        let data = Dataset::from_rows(
            vec!["case_description".to_string()],
            (0..size).map(|i| vec![format!("case {}", i)]).collect(),
        )
        .unwrap();
        let runner = BatchRunner::new(BatchConfig {
            max_retries: 1,
            backoff: BackoffPolicy::immediate(),
        });
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        let mut ever_succeeded = BTreeSet::new();
        for failing in &runs {
            let generator = FailingFor(failing.iter().map(|i| format!("case {}", i)).collect());
            let report = rt
                .block_on(runner.run(&data, "case_description", &store, &generator, &()))
                .unwrap();
            ever_succeeded.extend(report.succeeded.iter().map(|id| id.0));

            let ids = checkpoint_ids(store.path());
            let unique: HashSet<&String> = ids.iter().collect();
            prop_assert_eq!(unique.len(), ids.len());
            prop_assert_eq!(ids.len(), ever_succeeded.len());
        }

        let table = store.load().unwrap();
        let stored: BTreeSet<u64> = table
            .map(|t| t.ids().into_iter().map(|id| id.0).collect())
            .unwrap_or_default();
        prop_assert_eq!(stored, ever_succeeded);
    }
}
