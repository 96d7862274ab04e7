//! Integration tests for the resumable batch runner

use crate::integration::test_utils::{dataset, FakeClient, ScriptedGenerator};
use ddxgen::error::{PipelineError, StorageError};
use ddxgen::generation::{BackoffPolicy, BatchConfig, BatchRunner, GenerationResult};
use ddxgen::store::{
    CaseId, CheckpointStore, CheckpointTable, CsvCheckpointStore, INDEX_COLUMN,
};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

fn runner(max_retries: u32) -> BatchRunner {
    BatchRunner::new(BatchConfig {
        max_retries,
        backoff: BackoffPolicy::immediate(),
    })
}

fn checkpoint(dir: &TempDir) -> CsvCheckpointStore {
    CsvCheckpointStore::new(dir.path().join("checkpoint.csv"), INDEX_COLUMN)
}

#[tokio::test]
async fn test_resume_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = checkpoint(&dir);
    let data = dataset(4);

    let first = ScriptedGenerator::new("r1_");
    let report = runner(3)
        .run(&data, "case_description", &store, &first, &FakeClient)
        .await
        .unwrap();
    assert_eq!(report.success_count(), 4);
    assert_eq!(report.results.len(), 4);
    let bytes = std::fs::read(store.path()).unwrap();

    let second = ScriptedGenerator::new("r1_");
    let report = runner(3)
        .run(&data, "case_description", &store, &second, &FakeClient)
        .await
        .unwrap();

    assert!(second.calls().is_empty());
    assert_eq!(report.previously_done, 4);
    assert_eq!(report.success_count(), 0);
    assert_eq!(report.results.len(), 4);
    assert_eq!(std::fs::read(store.path()).unwrap(), bytes);
}

#[tokio::test]
async fn test_cases_processed_in_ascending_id_order() {
    let dir = TempDir::new().unwrap();
    let store = checkpoint(&dir);
    let generator = ScriptedGenerator::new("");

    runner(1)
        .run(&dataset(3), "case_description", &store, &generator, &FakeClient)
        .await
        .unwrap();

    assert_eq!(generator.calls(), vec!["case 0", "case 1", "case 2"]);
    let table = store.load().unwrap().unwrap();
    assert_eq!(
        table.get(CaseId(1)).unwrap().get("first_diagnosis"),
        Some("dx for case 1")
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_ceiling_and_backoff_schedule() {
    let dir = TempDir::new().unwrap();
    let store = checkpoint(&dir);
    let generator = ScriptedGenerator::new("").always_failing("case 0");
    let runner = BatchRunner::new(BatchConfig {
        max_retries: 3,
        backoff: BackoffPolicy::new(Duration::from_secs(1)),
    });

    let started = tokio::time::Instant::now();
    let report = runner
        .run(&dataset(1), "case_description", &store, &generator, &FakeClient)
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(generator.calls_for("case 0"), 3);
    assert_eq!(report.failed, vec![CaseId(0)]);
    // 1s + 2s between the three attempts, nothing after the last one
    assert!(elapsed >= Duration::from_secs(3), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(4), "elapsed {:?}", elapsed);
    assert!(report.results.is_empty());
}

#[tokio::test]
async fn test_transient_failure_recovers_within_ceiling() {
    let dir = TempDir::new().unwrap();
    let store = checkpoint(&dir);
    let generator = ScriptedGenerator::new("").failing_first("case 1", 2);

    let report = runner(3)
        .run(&dataset(2), "case_description", &store, &generator, &FakeClient)
        .await
        .unwrap();

    assert_eq!(generator.calls_for("case 1"), 3);
    assert_eq!(report.succeeded, vec![CaseId(0), CaseId(1)]);
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn test_failed_case_is_isolated_and_retried_on_next_run() {
    let dir = TempDir::new().unwrap();
    let store = checkpoint(&dir);
    let data = dataset(3);

    let generator = ScriptedGenerator::new("r1_").always_failing("case 1");
    let report = runner(2)
        .run(&data, "case_description", &store, &generator, &FakeClient)
        .await
        .unwrap();

    assert_eq!(generator.calls_for("case 1"), 2);
    assert_eq!(report.failed, vec![CaseId(1)]);
    assert_eq!(
        report.results.ids().into_iter().collect::<Vec<_>>(),
        vec![CaseId(0), CaseId(2)]
    );

    let retry = ScriptedGenerator::new("r1_");
    let report = runner(2)
        .run(&data, "case_description", &store, &retry, &FakeClient)
        .await
        .unwrap();

    assert_eq!(retry.calls(), vec!["case 1"]);
    assert_eq!(report.previously_done, 2);
    assert_eq!(report.results.len(), 3);

    let contents = std::fs::read_to_string(store.path()).unwrap();
    assert_eq!(contents.lines().count(), 4, "header plus one row per case");
}

#[tokio::test]
async fn test_empty_dataset_without_checkpoint_returns_empty_table() {
    let dir = TempDir::new().unwrap();
    let store = checkpoint(&dir);
    let generator = ScriptedGenerator::new("");

    let report = runner(2)
        .run(&dataset(0), "case_description", &store, &generator, &FakeClient)
        .await
        .unwrap();

    assert!(report.results.is_empty());
    assert_eq!(report.results.index_column(), INDEX_COLUMN);
    assert!(!store.path().exists());
}

#[tokio::test]
async fn test_configuration_errors_are_fatal() {
    let dir = TempDir::new().unwrap();
    let store = checkpoint(&dir);
    let generator = ScriptedGenerator::new("");

    let err = runner(0)
        .run(&dataset(1), "case_description", &store, &generator, &FakeClient)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));

    let err = runner(2)
        .run(&dataset(1), "findings", &store, &generator, &FakeClient)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Column 'findings' not found"));

    std::fs::write(store.path(), "id,first_diagnosis\n0,x\n").unwrap();
    let err = runner(2)
        .run(&dataset(1), "case_description", &store, &generator, &FakeClient)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Expected column 'original_index'"));
    assert!(generator.calls().is_empty());
}

/// In-memory store whose first appends fail.
struct FlakyStore {
    table: Mutex<CheckpointTable>,
    failures_left: Mutex<usize>,
}

impl CheckpointStore for FlakyStore {
    fn load(&self) -> Result<Option<CheckpointTable>, PipelineError> {
        let table = self.table.lock().unwrap();
        Ok((!table.is_empty()).then(|| table.clone()))
    }

    fn append(&self, id: CaseId, result: &GenerationResult) -> Result<(), PipelineError> {
        let mut failures = self.failures_left.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            ))
            .into());
        }
        self.table.lock().unwrap().insert(id, result.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_checkpoint_append_failure_is_retried() {
    let store = FlakyStore {
        table: Mutex::new(CheckpointTable::empty(INDEX_COLUMN)),
        failures_left: Mutex::new(1),
    };
    let generator = ScriptedGenerator::new("");

    let report = runner(2)
        .run(&dataset(1), "case_description", &store, &generator, &FakeClient)
        .await
        .unwrap();

    assert_eq!(generator.calls_for("case 0"), 2);
    assert_eq!(report.success_count(), 1);
    assert!(report.results.contains(CaseId(0)));
}

/// Leaves an unterminated row in the file on the first append for `torn`, as a write cut
/// short by a full disk would, then behaves like the CSV store.
struct TornWriteStore {
    inner: CsvCheckpointStore,
    torn: CaseId,
    fragment: &'static str,
    torn_once: Mutex<bool>,
}

impl CheckpointStore for TornWriteStore {
    fn load(&self) -> Result<Option<CheckpointTable>, PipelineError> {
        self.inner.load()
    }

    fn append(&self, id: CaseId, result: &GenerationResult) -> Result<(), PipelineError> {
        let mut torn_once = self.torn_once.lock().unwrap();
        if id == self.torn && !*torn_once {
            *torn_once = true;
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(self.inner.path())
                .unwrap();
            std::io::Write::write_all(&mut file, self.fragment.as_bytes()).unwrap();
            return Err(StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                "No space left on device",
            ))
            .into());
        }
        self.inner.append(id, result)
    }
}

#[tokio::test]
async fn test_torn_checkpoint_write_is_replaced_on_retry() {
    for fragment in ["1,dx for case 1,imag", "1,dx fo"] {
        let dir = TempDir::new().unwrap();
        let store = TornWriteStore {
            inner: checkpoint(&dir),
            torn: CaseId(1),
            fragment,
            torn_once: Mutex::new(false),
        };
        let generator = ScriptedGenerator::new("");

        let report = runner(2)
            .run(&dataset(3), "case_description", &store, &generator, &FakeClient)
            .await
            .unwrap();

        assert_eq!(report.success_count(), 3, "fragment {:?}", fragment);
        assert_eq!(generator.calls_for("case 1"), 2);
        let stored = report.results.get(CaseId(1)).unwrap();
        assert_eq!(stored.get("first_diagnosis"), Some("dx for case 1"));
        assert_eq!(stored.get("rationale"), Some("imaging pattern"));

        let contents = std::fs::read_to_string(store.inner.path()).unwrap();
        assert_eq!(contents.lines().filter(|l| l.starts_with("1,")).count(), 1);
        assert!(contents.ends_with("imaging pattern\n"));

        // A later resumed run loads cleanly and has nothing left to do.
        let rerun = runner(2)
            .run(&dataset(3), "case_description", &store, &generator, &FakeClient)
            .await
            .unwrap();
        assert_eq!(rerun.success_count(), 0);
        assert_eq!(rerun.previously_done, 3);
    }
}
