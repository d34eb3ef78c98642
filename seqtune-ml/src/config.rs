//! Configuration system for seqtune.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/seqtune/config.toml` and/or `.seqtune/config.toml`
//! in the workspace directory.

use crate::training::TrainingArguments;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SeqtuneConfig {
    /// Python runtime used to host the external trainer.
    #[serde(default)]
    pub python: PythonConfig,
    /// Training driver settings.
    #[serde(default)]
    pub training: TrainingConfig,
    /// Checkpoint selector settings.
    #[serde(default)]
    pub selector: SelectorConfig,
}

/// Python runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PythonConfig {
    /// Path to Python executable (auto-detected if not set).
    #[serde(default)]
    pub python_path: Option<PathBuf>,
    /// Path to virtual environment (auto-detected if not set).
    #[serde(default)]
    pub venv_path: Option<PathBuf>,
    /// Upper bound on a training run in seconds. Unbounded when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Training driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingConfig {
    /// Number of output classes of the sequence classifier.
    #[serde(default = "default_num_labels")]
    pub num_labels: u32,
    /// Truncate tokenized inputs to the model's maximum length.
    #[serde(default = "default_true")]
    pub truncation: bool,
    /// Request the fast (Rust-backed) tokenizer implementation.
    #[serde(default = "default_true")]
    pub use_fast_tokenizer: bool,
    /// Arguments forwarded verbatim to the trainer.
    #[serde(default)]
    pub arguments: TrainingArguments,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            num_labels: default_num_labels(),
            truncation: true,
            use_fast_tokenizer: true,
            arguments: TrainingArguments::default(),
        }
    }
}

fn default_num_labels() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

/// Checkpoint selector configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectorConfig {
    /// Directory holding one sub-directory per task.
    #[serde(default = "default_checkpoint_root")]
    pub checkpoint_root: PathBuf,
    /// Task directories to scan, in order.
    #[serde(default = "default_tasks")]
    pub tasks: Vec<String>,
    /// Validation metrics that decide the best epoch.
    #[serde(default = "default_best_metrics")]
    pub best_metrics: Vec<String>,
    /// Validation metrics whose test counterparts are collected.
    #[serde(default = "default_selected_metrics")]
    pub selected_metrics: Vec<String>,
    /// Name of the per-run trainer log file.
    #[serde(default = "default_state_file")]
    pub state_file: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            checkpoint_root: default_checkpoint_root(),
            tasks: default_tasks(),
            best_metrics: default_best_metrics(),
            selected_metrics: default_selected_metrics(),
            state_file: default_state_file(),
        }
    }
}

fn default_checkpoint_root() -> PathBuf {
    PathBuf::from("checkpoints")
}

fn default_tasks() -> Vec<String> {
    vec![
        "generate_guess_task".into(),
        "target_selection_task".into(),
        "clue_generation_task".into(),
    ]
}

fn default_best_metrics() -> Vec<String> {
    vec!["eval_validation_rougeLsum".into()]
}

fn default_selected_metrics() -> Vec<String> {
    [
        "eval_validation_rouge1",
        "eval_validation_rouge2",
        "eval_validation_rougeLsum",
        "eval_validation_bleu",
        "eval_validation_bertscore",
        "eval_validation_gen_len",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_state_file() -> String {
    "trainer_state.json".to_string()
}

/// Workspace-local config file location.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".seqtune").join("config.toml")
}

/// User-level config file location, when a home directory can be resolved.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "seqtune", "seqtune")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `SEQTUNE_`)
/// 3. Workspace-local config (`.seqtune/config.toml`)
/// 4. User config (`~/.config/seqtune/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&SeqtuneConfig>,
) -> Result<SeqtuneConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(SeqtuneConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(ws_config) = workspace.map(workspace_config_path)
        && ws_config.exists()
    {
        figment = figment.merge(Toml::file(&ws_config));
    }

    // SEQTUNE_SELECTOR__CHECKPOINT_ROOT, SEQTUNE_TRAINING__ARGUMENTS__LEARNING_RATE, ...
    figment = figment.merge(Env::prefixed("SEQTUNE_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}
