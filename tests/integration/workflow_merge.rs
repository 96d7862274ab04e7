//! Integration tests for the generation workflow: merge, rename, and fatal configuration paths

use crate::integration::test_utils::{read_csv, write_csv, FakeClient, ScriptedGenerator};
use ddxgen::error::PipelineError;
use ddxgen::generation::{
    execute_generation, run_generation, BackoffPolicy, BatchConfig, GenerateRequest,
};
use ddxgen::provider::ProviderSettings;
use ddxgen::registry::ProviderKind;
use ddxgen::store::Dataset;
use std::collections::HashSet;
use std::path::Path;
use tempfile::TempDir;

fn request(dir: &Path, provider: &str, input: &Path, max_retries: u32) -> GenerateRequest {
    GenerateRequest {
        provider_name: provider.to_string(),
        input_path: input.to_path_buf(),
        output_path: dir.join("out").join("merged.csv"),
        checkpoint_path: dir.join("tmp").join("checkpoint.csv"),
        case_column: "case_description".to_string(),
        batch: BatchConfig {
            max_retries,
            backoff: BackoffPolicy::immediate(),
        },
    }
}

fn sample_input(dir: &Path) -> std::path::PathBuf {
    write_csv(
        dir,
        "cases.csv",
        &["case_description", "ground_truth"],
        &[
            vec!["case 0", "Glioma"],
            vec!["case 1", "Abscess"],
            vec!["case 2", "Meningioma"],
        ],
    )
}

#[tokio::test]
async fn test_partial_failure_scenario_merges_every_row() {
    let dir = TempDir::new().unwrap();
    let input = sample_input(dir.path());
    let request = request(dir.path(), "deepseek", &input, 2);
    std::fs::create_dir_all(request.output_path.parent().unwrap()).unwrap();
    std::fs::create_dir_all(request.checkpoint_path.parent().unwrap()).unwrap();

    let dataset = Dataset::load(&input).unwrap();
    let generator = ScriptedGenerator::new("r1_").always_failing("case 1");
    let outcome = execute_generation(&request, &dataset, &generator, &FakeClient, &[])
        .await
        .unwrap();

    assert_eq!(generator.calls_for("case 1"), 2);
    assert_eq!(outcome.report.failure_count(), 1);

    let (_, checkpoint_rows) = read_csv(&request.checkpoint_path);
    let ids: Vec<&str> = checkpoint_rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(ids, vec!["0", "2"]);

    let (header, rows) = read_csv(&request.output_path);
    assert_eq!(
        header,
        vec![
            "case_description",
            "ground_truth",
            "r1_first_diagnosis",
            "r1_rationale"
        ]
    );
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][2], "dx for case 0");
    assert_eq!(rows[1], vec!["case 1", "Abscess", "", ""]);
    assert_eq!(rows[2][2], "dx for case 2");
    assert!(!request.output_path.with_file_name("merged.csv.tmp").exists());
}

#[tokio::test]
async fn test_existing_original_index_is_reused_and_dropped() {
    let dir = TempDir::new().unwrap();
    let input = write_csv(
        dir.path(),
        "indexed.csv",
        &["original_index", "case_description"],
        &[vec!["30", "case c"], vec!["10", "case a"]],
    );
    let request = request(dir.path(), "gemini", &input, 1);
    std::fs::create_dir_all(request.output_path.parent().unwrap()).unwrap();
    std::fs::create_dir_all(request.checkpoint_path.parent().unwrap()).unwrap();

    let dataset = Dataset::load(&input).unwrap();
    let generator = ScriptedGenerator::new("gemini_");
    execute_generation(&request, &dataset, &generator, &FakeClient, &[])
        .await
        .unwrap();

    let (_, checkpoint_rows) = read_csv(&request.checkpoint_path);
    let ids: Vec<&str> = checkpoint_rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(ids, vec!["10", "30"], "processed in ascending id order");

    let (header, rows) = read_csv(&request.output_path);
    assert!(!header.iter().any(|h| h == "original_index"));
    assert_eq!(rows[0][0], "case c", "input row order preserved");
    assert_eq!(rows[0][1], "dx for case c");
}

#[tokio::test]
async fn test_openai_then_deepseek_columns_stay_distinct() {
    let dir = TempDir::new().unwrap();
    let input = sample_input(dir.path());

    let openai_request = request(dir.path(), "openai", &input, 1);
    std::fs::create_dir_all(openai_request.output_path.parent().unwrap()).unwrap();
    std::fs::create_dir_all(openai_request.checkpoint_path.parent().unwrap()).unwrap();
    let dataset = Dataset::load(&input).unwrap();
    execute_generation(
        &openai_request,
        &dataset,
        &ScriptedGenerator::new(""),
        &FakeClient,
        ProviderKind::OpenAI.bundle().rename_map,
    )
    .await
    .unwrap();

    let mut deepseek_request = request(dir.path(), "deepseek", &openai_request.output_path, 1);
    deepseek_request.output_path = dir.path().join("out").join("both.csv");
    deepseek_request.checkpoint_path = dir.path().join("tmp").join("r1.csv");
    let dataset = Dataset::load(&deepseek_request.input_path).unwrap();
    let outcome = execute_generation(
        &deepseek_request,
        &dataset,
        &ScriptedGenerator::new("r1_"),
        &FakeClient,
        ProviderKind::DeepSeek.bundle().rename_map,
    )
    .await
    .unwrap();

    let columns = &outcome.merged.columns;
    let unique: HashSet<&String> = columns.iter().collect();
    assert_eq!(unique.len(), columns.len());
    for expected in [
        "openai_first_diagnosis",
        "openai_rationale",
        "r1_first_diagnosis",
        "r1_rationale",
    ] {
        assert!(columns.iter().any(|c| c == expected), "missing {}", expected);
    }
}

#[tokio::test]
async fn test_rename_collision_with_input_column_is_suffixed() {
    let dir = TempDir::new().unwrap();
    let input = write_csv(
        dir.path(),
        "cases.csv",
        &["case_description", "openai_rationale"],
        &[vec!["case 0", "from a previous run"]],
    );
    let request = request(dir.path(), "openai", &input, 1);
    std::fs::create_dir_all(request.output_path.parent().unwrap()).unwrap();
    std::fs::create_dir_all(request.checkpoint_path.parent().unwrap()).unwrap();

    let dataset = Dataset::load(&input).unwrap();
    let outcome = execute_generation(
        &request,
        &dataset,
        &ScriptedGenerator::new(""),
        &FakeClient,
        ProviderKind::OpenAI.bundle().rename_map,
    )
    .await
    .unwrap();

    assert_eq!(
        outcome.merged.columns,
        vec![
            "case_description",
            "openai_rationale",
            "openai_first_diagnosis",
            "openai_rationale_2"
        ]
    );
    assert_eq!(outcome.merged.rows[0][1], "from a previous run");
    assert_eq!(outcome.merged.rows[0][3], "imaging pattern");
}

#[tokio::test]
async fn test_unknown_provider_is_config_error() {
    let dir = TempDir::new().unwrap();
    let input = sample_input(dir.path());
    let err = run_generation(
        &request(dir.path(), "llama", &input, 1),
        &ProviderSettings::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PipelineError::Config(_)));
    assert!(err.to_string().contains("deepseek, gemini, openai"));
}

#[tokio::test]
async fn test_missing_column_is_config_error_listing_columns() {
    let dir = TempDir::new().unwrap();
    let input = sample_input(dir.path());
    let mut request = request(dir.path(), "openai", &input, 1);
    request.case_column = "findings".to_string();

    let err = run_generation(&request, &ProviderSettings::default())
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("Column 'findings' not found"));
    assert!(message.contains("case_description"));
    assert!(message.contains("ground_truth"));
}

#[tokio::test]
async fn test_missing_api_key_fails_before_any_checkpoint_write() {
    let dir = TempDir::new().unwrap();
    let input = sample_input(dir.path());
    let request = request(dir.path(), "gemini", &input, 1);

    let err = run_generation(&request, &ProviderSettings::default())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Config(_)));
    assert!(err.to_string().contains("GOOGLE_API_KEY"));
    assert!(!request.checkpoint_path.exists());
    assert!(!request.output_path.exists());
}

#[tokio::test]
async fn test_duplicate_original_index_is_config_error() {
    let dir = TempDir::new().unwrap();
    let input = write_csv(
        dir.path(),
        "dupes.csv",
        &["original_index", "case_description"],
        &[vec!["1", "a"], vec!["1", "b"]],
    );

    let err = run_generation(
        &request(dir.path(), "openai", &input, 1),
        &ProviderSettings::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
}
