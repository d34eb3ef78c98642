//! Integration tests for the checkpoint selector.
//!
//! Each test lays out a `<root>/<task>/<run>/trainer_state.json` tree in a
//! temporary directory and scans it end to end.

use pretty_assertions::assert_eq;
use seqtune_ml::config::SelectorConfig;
use seqtune_ml::selection::{ModelSelector, RunFailure, ScoreTable};
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

fn write_state(root: &Path, task: &str, run: &str, state: &serde_json::Value) {
    let dir = root.join(task).join(run);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("trainer_state.json"),
        serde_json::to_string_pretty(state).unwrap(),
    )
    .unwrap();
}

fn selector(root: &Path, tasks: &[&str], selected: &[&str]) -> ModelSelector {
    ModelSelector::new(&SelectorConfig {
        checkpoint_root: root.to_path_buf(),
        tasks: tasks.iter().map(|s| s.to_string()).collect(),
        best_metrics: vec!["eval_validation_rougeLsum".into()],
        selected_metrics: selected.iter().map(|s| s.to_string()).collect(),
        state_file: "trainer_state.json".into(),
    })
}

fn two_epoch_state(test_score: f64) -> serde_json::Value {
    json!({
        "log_history": [
            {"epoch": 1.0, "eval_validation_rougeLsum": 0.2, "eval_test_rougeLsum": 0.3},
            {"epoch": 2.0, "eval_validation_rougeLsum": 0.5, "eval_test_rougeLsum": test_score}
        ]
    })
}

// ── Best epoch and recorded score ────────────────────────────────────────

#[test]
fn test_peak_epoch_score_is_recorded() {
    let dir = TempDir::new().unwrap();
    write_state(dir.path(), "clue_generation_task", "bart_base_s1_t1", &two_epoch_state(0.6));

    let report = selector(
        dir.path(),
        &["clue_generation_task"],
        &["eval_validation_rougeLsum"],
    )
    .scan(ScoreTable::new());

    assert_eq!(report.outcomes.len(), 1);
    let scores = report.outcomes[0].result.as_ref().unwrap();
    assert_eq!(scores.epoch, 2.0);
    assert_eq!(
        report.table.get("bart_base", "eval_test_rougeLsum"),
        Some(&[0.6][..])
    );
}

// ── Failures never abort the scan ────────────────────────────────────────

#[test]
fn test_missing_and_malformed_logs_are_skipped() {
    let dir = TempDir::new().unwrap();
    let task = "target_selection_task";
    write_state(dir.path(), task, "good_model_s1_t1", &two_epoch_state(0.7));
    std::fs::create_dir_all(dir.path().join(task).join("empty_model_s1_t1")).unwrap();
    let broken = dir.path().join(task).join("broken_model_s1_t1");
    std::fs::create_dir_all(&broken).unwrap();
    std::fs::write(broken.join("trainer_state.json"), "{\"log_history\": [").unwrap();

    let report = selector(dir.path(), &[task], &["eval_validation_rougeLsum"]).scan(ScoreTable::new());

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.succeeded(), 1);

    let failures: Vec<(&str, &RunFailure)> =
        report.failed().map(|(o, f)| (o.run.as_str(), f)).collect();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].0, "broken_model_s1_t1");
    assert!(matches!(failures[0].1, RunFailure::MalformedLog { .. }));
    assert_eq!(failures[1].0, "empty_model_s1_t1");
    assert!(matches!(failures[1].1, RunFailure::LogUnreadable { .. }));

    let keys: Vec<&str> = report.table.keys().collect();
    assert_eq!(keys, vec!["good_model"]);
}

#[test]
fn test_failed_run_leaves_no_partial_entries() {
    let dir = TempDir::new().unwrap();
    // rouge1 is present at the best epoch, bleu is not.
    write_state(
        dir.path(),
        "generate_guess_task",
        "t5_large_s3_t0",
        &json!({
            "log_history": [
                {"epoch": 1.0, "eval_validation_rougeLsum": 0.4,
                 "eval_test_rouge1": 0.5, "eval_test_rougeLsum": 0.45}
            ]
        }),
    );

    let report = selector(
        dir.path(),
        &["generate_guess_task"],
        &["eval_validation_rouge1", "eval_validation_bleu"],
    )
    .scan(ScoreTable::new());

    assert_eq!(report.succeeded(), 0);
    assert!(report.table.is_empty());
    assert!(matches!(
        report.outcomes[0].failure(),
        Some(RunFailure::TestMetricMissing { metric, .. }) if metric == "eval_test_bleu"
    ));
}

#[test]
fn test_python_nan_in_log_does_not_drop_run() {
    let dir = TempDir::new().unwrap();
    let run_dir = dir.path().join("clue_generation_task").join("bart_large_s1_t1");
    std::fs::create_dir_all(&run_dir).unwrap();
    std::fs::write(
        run_dir.join("trainer_state.json"),
        r#"{
  "log_history": [
    {"epoch": 1.0, "grad_norm": NaN, "learning_rate": 5e-06, "loss": 2.1, "step": 50},
    {"epoch": 1.0, "eval_validation_rougeLsum": 0.31, "eval_test_rougeLsum": 0.29, "step": 50},
    {"epoch": 2.0, "grad_norm": Infinity, "loss": 1.7, "step": 100},
    {"epoch": 2.0, "eval_validation_rougeLsum": NaN, "eval_test_rougeLsum": 0.33, "step": 100}
  ]
}"#,
    )
    .unwrap();

    let report = selector(
        dir.path(),
        &["clue_generation_task"],
        &["eval_validation_rougeLsum"],
    )
    .scan(ScoreTable::new());

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.outcomes[0].result.as_ref().unwrap().epoch, 1.0);
    assert_eq!(
        report.table.get("bart_large", "eval_test_rougeLsum"),
        Some(&[0.29][..])
    );
}

// ── Aggregation across runs and tasks ────────────────────────────────────

#[test]
fn test_shared_key_values_in_scan_order() {
    let dir = TempDir::new().unwrap();
    let task = "clue_generation_task";
    write_state(dir.path(), task, "gpt2_lr5_seed2_trial0", &two_epoch_state(0.61));
    write_state(dir.path(), task, "gpt2_lr5_seed1_trial0", &two_epoch_state(0.58));
    write_state(dir.path(), task, "gpt2_lr3_seed1_trial0", &two_epoch_state(0.40));

    let report = selector(dir.path(), &[task], &["eval_validation_rougeLsum"]).scan(ScoreTable::new());

    // Runs are visited in name order: seed1 before seed2.
    assert_eq!(
        report.table.get("gpt2_lr5", "eval_test_rougeLsum"),
        Some(&[0.58, 0.61][..])
    );
    assert_eq!(
        report.table.get("gpt2_lr3", "eval_test_rougeLsum"),
        Some(&[0.40][..])
    );
}

#[test]
fn test_accumulator_is_threaded_through_scans() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    write_state(first.path(), "task", "m_s1_t1", &two_epoch_state(0.1));
    write_state(second.path(), "task", "m_s2_t1", &two_epoch_state(0.2));

    let table = selector(first.path(), &["task"], &["eval_validation_rougeLsum"])
        .scan(ScoreTable::new())
        .table;
    let report = selector(second.path(), &["task"], &["eval_validation_rougeLsum"]).scan(table);

    assert_eq!(
        report.table.get("m", "eval_test_rougeLsum"),
        Some(&[0.1, 0.2][..])
    );
}

#[test]
fn test_missing_task_does_not_stop_other_tasks() {
    let dir = TempDir::new().unwrap();
    write_state(dir.path(), "present_task", "m_s1_t1", &two_epoch_state(0.3));

    let report = selector(
        dir.path(),
        &["absent_task", "present_task"],
        &["eval_validation_rougeLsum"],
    )
    .scan(ScoreTable::new());

    assert_eq!(report.task_failures.len(), 1);
    assert_eq!(report.task_failures[0].task, "absent_task");
    assert_eq!(report.succeeded(), 1);
}

// ── Export ───────────────────────────────────────────────────────────────

#[test]
fn test_report_export() {
    let dir = TempDir::new().unwrap();
    write_state(dir.path(), "task", "m_s1_t1", &two_epoch_state(0.5));
    std::fs::create_dir_all(dir.path().join("task").join("n_s1_t1")).unwrap();

    let report = selector(dir.path(), &["task"], &["eval_validation_rougeLsum"]).scan(ScoreTable::new());
    let out = dir.path().join("reports").join("selection.json");
    report.save(&out).unwrap();

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(saved["scores"], json!({"m": {"eval_test_rougeLsum": [0.5]}}));
    assert_eq!(saved["summary"][0]["count"], 1);
    assert_eq!(saved["failed_runs"][0]["run"], "n_s1_t1");
    assert_eq!(saved["failed_runs"][0]["failure"]["kind"], "log_unreadable");
}
