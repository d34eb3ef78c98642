//! Subcommand handlers.

use crate::{Commands, ConfigAction};
use seqtune_ml::config::{SeqtuneConfig, load_config, workspace_config_path};
use seqtune_ml::selection::{ModelSelector, ScoreTable, SelectionReport};
use seqtune_ml::{PythonRuntime, TrainRequest, TrainingDriver};
use std::path::{Path, PathBuf};
use tracing::info;

pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<()> {
    let config = load_config(Some(workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    match command {
        Commands::Train {
            train_csv,
            validation_csv,
            test_csv,
            model_checkpoint,
            text_column,
            label_column,
            output_dir,
            dry_run,
            python,
        } => {
            let request = TrainRequest {
                train_file: train_csv,
                validation_file: validation_csv,
                test_file: test_csv,
                model_checkpoint,
                text_column,
                label_column,
                output_dir,
            };
            handle_train(request, config, python, dry_run, workspace).await
        }
        Commands::Select {
            root,
            tasks,
            best_metrics,
            metrics,
            output,
        } => {
            let mut config = config;
            if let Some(root) = root {
                config.selector.checkpoint_root = root;
            }
            if !tasks.is_empty() {
                config.selector.tasks = tasks;
            }
            if !best_metrics.is_empty() {
                config.selector.best_metrics = best_metrics;
            }
            if !metrics.is_empty() {
                config.selector.selected_metrics = metrics;
            }
            handle_select(&config, output.as_deref())
        }
        Commands::Config { action } => handle_config(action, &config, workspace),
    }
}

async fn handle_train(
    request: TrainRequest,
    mut config: SeqtuneConfig,
    python: Option<PathBuf>,
    dry_run: bool,
    workspace: &Path,
) -> anyhow::Result<()> {
    if python.is_some() {
        config.python.python_path = python;
    }
    info!(
        train = %request.train_file.display(),
        validation = %request.validation_file.display(),
        test = %request.test_file.display(),
        model = %request.model_checkpoint,
        text_column = %request.text_column,
        label_column = %request.label_column,
        output_dir = %request.output_dir.display(),
        "Training request"
    );

    let runtime = PythonRuntime::resolve(&config.python, workspace.to_path_buf()).await;
    let driver = TrainingDriver::new(request, config.training, runtime);

    if dry_run {
        let prepared = driver.prepare().await?;
        println!("Prepared run {}", prepared.manifest.id);
        for (split, lineage) in &prepared.manifest.splits {
            println!(
                "  {split:<10} {:>7} rows  {:>7} positive  {}",
                lineage.prepared.rows,
                lineage.positives,
                lineage.prepared.path.display()
            );
        }
        println!("Run file: {}", prepared.manifest_path.display());
        println!("Script:   {}", prepared.script_path.display());
        return Ok(());
    }

    let outcome = driver.run().await?;
    println!("Training completed: {}", outcome.output_dir.display());
    if let Some(metric) = outcome.best_metric {
        println!("  best metric:     {metric:.4}");
    }
    if let Some(checkpoint) = &outcome.best_model_checkpoint {
        println!("  best checkpoint: {checkpoint}");
    }
    Ok(())
}

fn handle_select(config: &SeqtuneConfig, output: Option<&Path>) -> anyhow::Result<()> {
    let selector = ModelSelector::new(&config.selector);
    let report = selector.scan(ScoreTable::new());

    print_report(&report);

    if let Some(path) = output {
        report.save(path)?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}

fn print_report(report: &SelectionReport) {
    for summary in report.table.summary() {
        let spread = summary
            .std_dev
            .map(|s| format!(" ± {s:.4}"))
            .unwrap_or_default();
        println!(
            "{:<40} {:<28} n={:<3} {:.4}{spread}",
            summary.key, summary.metric, summary.count, summary.mean
        );
    }

    let failed: Vec<_> = report.failed().collect();
    println!(
        "\n{} runs selected into {} configurations, {} failed, {} tasks unreadable",
        report.succeeded(),
        report.table.len(),
        failed.len(),
        report.task_failures.len()
    );
    for (outcome, failure) in failed {
        println!("  {}: {failure}", outcome.log_path.display());
    }
    for task in &report.task_failures {
        println!("  {}: {}", task.path.display(), task.reason);
    }
}

fn handle_config(
    action: ConfigAction,
    config: &SeqtuneConfig,
    workspace: &Path,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            if let Some(dir) = config_path.parent() {
                std::fs::create_dir_all(dir)?;
            }

            let toml_str = toml::to_string_pretty(&SeqtuneConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            println!("{}", toml::to_string_pretty(config)?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, workspace).await.unwrap();

        let config_path = workspace.join(".seqtune").join("config.toml");
        assert!(config_path.exists());

        let content = std::fs::read_to_string(&config_path).unwrap();
        let parsed: SeqtuneConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed, SeqtuneConfig::default());
    }

    #[tokio::test]
    async fn test_config_init_idempotent() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, workspace).await.unwrap();
        let config_path = workspace.join(".seqtune").join("config.toml");
        let content_first = std::fs::read_to_string(&config_path).unwrap();

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, workspace).await.unwrap();
        let content_second = std::fs::read_to_string(&config_path).unwrap();
        assert_eq!(content_first, content_second);
    }

    #[tokio::test]
    async fn test_select_writes_report() {
        let dir = TempDir::new().unwrap();
        let run_dir = dir.path().join("runs").join("task_a").join("bert_s1_t1");
        std::fs::create_dir_all(&run_dir).unwrap();
        std::fs::write(
            run_dir.join("trainer_state.json"),
            r#"{"log_history": [{"epoch": 1.0, "eval_validation_f1": 0.8, "eval_test_f1": 0.75}]}"#,
        )
        .unwrap();
        let output = dir.path().join("report.json");

        let command = Commands::Select {
            root: Some(dir.path().join("runs")),
            tasks: vec!["task_a".into()],
            best_metrics: vec!["eval_validation_f1".into()],
            metrics: vec!["eval_validation_f1".into()],
            output: Some(output.clone()),
        };
        handle_command(command, dir.path()).await.unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(saved["scores"]["bert"]["eval_test_f1"][0], 0.75);
    }

    #[tokio::test]
    async fn test_train_dry_run_prepares_output() {
        let dir = TempDir::new().unwrap();
        for split in ["train", "dev", "test"] {
            std::fs::write(
                dir.path().join(format!("{split}.csv")),
                "sentence,label,extra\nhello,1,a\nworld,,b\n",
            )
            .unwrap();
        }
        let output_dir = dir.path().join("out");

        let command = Commands::Train {
            train_csv: dir.path().join("train.csv"),
            validation_csv: dir.path().join("dev.csv"),
            test_csv: dir.path().join("test.csv"),
            model_checkpoint: "bert-base-uncased".into(),
            text_column: "sentence".into(),
            label_column: "label".into(),
            output_dir: output_dir.clone(),
            dry_run: true,
            python: None,
        };
        handle_command(command, dir.path()).await.unwrap();

        assert!(output_dir.join("seqtune_run.json").exists());
        assert!(output_dir.join("data").join("validation.jsonl").exists());
    }
}
