//! Training driver: prepares splits and supervises the external trainer.

use crate::config::TrainingConfig;
use crate::data::{CsvSource, DataSource, DataSourceInfo, prepare_split};
use crate::error::MlError;
use crate::persistence::{WrittenFile, atomic_write_json, write_jsonl};
use crate::runtime::PythonRuntime;
use crate::training::arguments::TrainingArguments;
use crate::training::script::{REQUIRED_PACKAGES, write_script};
use crate::training::state::TrainerState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Run file written next to the checkpoints.
pub const RUN_FILE: &str = "seqtune_run.json";

/// Everything the caller specifies about one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainRequest {
    pub train_file: PathBuf,
    pub validation_file: PathBuf,
    pub test_file: PathBuf,
    /// Model identifier or local path understood by the framework.
    pub model_checkpoint: String,
    pub text_column: String,
    pub label_column: String,
    pub output_dir: PathBuf,
}

impl TrainRequest {
    fn splits(&self) -> [(&'static str, &Path); 3] {
        [
            ("train", self.train_file.as_path()),
            ("validation", self.validation_file.as_path()),
            ("test", self.test_file.as_path()),
        ]
    }
}

/// Training status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    Prepared,
    Running,
    Completed,
    Failed,
}

/// Tokenizer options forwarded to the trainer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerSettings {
    pub truncation: bool,
    pub use_fast: bool,
}

/// Provenance of one prepared split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitLineage {
    pub source: DataSourceInfo,
    pub prepared: WrittenFile,
    pub positives: usize,
}

/// The run file: what the trainer script reads, plus lineage and status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub id: String,
    pub model_checkpoint: String,
    pub output_dir: PathBuf,
    pub text_column: String,
    pub label_column: String,
    pub num_labels: u32,
    pub tokenizer: TokenizerSettings,
    pub training_args: TrainingArguments,
    pub data_files: BTreeMap<String, PathBuf>,
    pub splits: BTreeMap<String, SplitLineage>,
    pub status: TrainingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Paths produced by [`TrainingDriver::prepare`].
#[derive(Debug, Clone)]
pub struct PreparedRun {
    pub manifest: RunManifest,
    pub manifest_path: PathBuf,
    pub script_path: PathBuf,
}

/// Summary of a finished run, read back from the trainer's own state file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingOutcome {
    pub run_id: String,
    pub output_dir: PathBuf,
    pub best_metric: Option<f64>,
    pub best_model_checkpoint: Option<String>,
    pub epochs: Option<f64>,
}

/// Prepares data for and launches one fine-tuning run.
pub struct TrainingDriver {
    request: TrainRequest,
    config: TrainingConfig,
    runtime: PythonRuntime,
}

impl TrainingDriver {
    pub fn new(request: TrainRequest, config: TrainingConfig, runtime: PythonRuntime) -> Self {
        Self {
            request,
            config,
            runtime,
        }
    }

    /// Load, prune and binarize the three splits, then write the prepared
    /// data, the run file and the trainer script under the output directory.
    pub async fn prepare(&self) -> Result<PreparedRun, MlError> {
        self.config.arguments.validate()?;
        if self.config.num_labels < 2 {
            return Err(MlError::invalid_input("num_labels must be at least 2"));
        }

        let output_dir = std::path::absolute(&self.request.output_dir)?;
        let data_dir = output_dir.join("data");
        let mut data_files = BTreeMap::new();
        let mut splits = BTreeMap::new();

        for (split, path) in self.request.splits() {
            let source = CsvSource::new(path);
            let batch = source.load(None).await?;
            let examples = prepare_split(
                batch,
                &self.request.text_column,
                &self.request.label_column,
                split,
            )?;
            if split == "train" && examples.is_empty() {
                return Err(MlError::dataset(format!(
                    "train split {} has no rows",
                    path.display()
                )));
            }

            let positives = examples.iter().filter(|e| e.label == 1).count();
            let prepared = write_jsonl(&data_dir.join(format!("{split}.jsonl")), &examples)?;
            info!(
                split,
                rows = prepared.rows,
                positives,
                path = %prepared.path.display(),
                "Prepared split"
            );

            let mut source_info = source.source_info();
            source_info.row_count = Some(prepared.rows);
            data_files.insert(split.to_string(), prepared.path.clone());
            splits.insert(
                split.to_string(),
                SplitLineage {
                    source: source_info,
                    prepared,
                    positives,
                },
            );
        }

        let now = Utc::now();
        let manifest = RunManifest {
            id: uuid::Uuid::new_v4().to_string(),
            model_checkpoint: self.request.model_checkpoint.clone(),
            output_dir: output_dir.clone(),
            text_column: self.request.text_column.clone(),
            label_column: self.request.label_column.clone(),
            num_labels: self.config.num_labels,
            tokenizer: TokenizerSettings {
                truncation: self.config.truncation,
                use_fast: self.config.use_fast_tokenizer,
            },
            training_args: self.config.arguments.clone(),
            data_files,
            splits,
            status: TrainingStatus::Prepared,
            created_at: now,
            updated_at: now,
            error: None,
        };

        let manifest_path = output_dir.join(RUN_FILE);
        atomic_write_json(&manifest_path, &manifest)?;
        let script_path = write_script(&output_dir)?;

        Ok(PreparedRun {
            manifest,
            manifest_path,
            script_path,
        })
    }

    /// Prepare, then run the trainer to completion.
    pub async fn run(&self) -> Result<TrainingOutcome, MlError> {
        let mut prepared = self.prepare().await?;

        let result = self.launch(&mut prepared).await;
        match &result {
            Ok(_) => self.set_status(&mut prepared, TrainingStatus::Completed, None)?,
            Err(e) => self.record_failure(&mut prepared, e),
        }
        result
    }

    /// Mark the run failed. A run file that cannot be rewritten is only logged,
    /// so the training error stays the one returned.
    fn record_failure(&self, prepared: &mut PreparedRun, error: &MlError) {
        warn!(run_id = %prepared.manifest.id, error = %error, "Training failed");
        if let Err(write_err) =
            self.set_status(prepared, TrainingStatus::Failed, Some(error.to_string()))
        {
            warn!(
                path = %prepared.manifest_path.display(),
                error = %write_err,
                "Could not record failed status"
            );
        }
    }

    async fn launch(&self, prepared: &mut PreparedRun) -> Result<TrainingOutcome, MlError> {
        self.runtime.require_packages(REQUIRED_PACKAGES).await?;
        self.set_status(prepared, TrainingStatus::Running, None)?;

        info!(
            run_id = %prepared.manifest.id,
            model = %prepared.manifest.model_checkpoint,
            epochs = prepared.manifest.training_args.num_train_epochs,
            timeout_secs = ?self.runtime.timeout().map(|t| t.as_secs()),
            "Starting trainer"
        );
        let manifest_arg = prepared.manifest_path.to_string_lossy().to_string();
        self.runtime
            .run_script_file(&prepared.script_path, &[manifest_arg.as_str()])
            .await?;

        summarize(&prepared.manifest)
    }

    fn set_status(
        &self,
        prepared: &mut PreparedRun,
        status: TrainingStatus,
        error: Option<String>,
    ) -> Result<(), MlError> {
        prepared.manifest.status = status;
        prepared.manifest.error = error;
        prepared.manifest.updated_at = Utc::now();
        atomic_write_json(&prepared.manifest_path, &prepared.manifest)?;
        Ok(())
    }
}

/// Read the trainer's final state and report the best checkpoint it kept.
pub fn summarize(manifest: &RunManifest) -> Result<TrainingOutcome, MlError> {
    let state_path = manifest.output_dir.join("trainer_state.json");
    let state = TrainerState::load(&state_path)?;
    if state.is_none() {
        warn!(path = %state_path.display(), "Trainer finished without writing its state");
    }
    let state = state.unwrap_or_default();

    let outcome = TrainingOutcome {
        run_id: manifest.id.clone(),
        output_dir: manifest.output_dir.clone(),
        best_metric: state.best_metric,
        best_model_checkpoint: state.best_model_checkpoint,
        epochs: state.epoch,
    };
    info!(
        run_id = %outcome.run_id,
        best_metric = ?outcome.best_metric,
        best_checkpoint = ?outcome.best_model_checkpoint,
        "Training completed"
    );
    Ok(outcome)
}
