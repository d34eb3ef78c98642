//! # seqtune-ml
//!
//! Data preparation, trainer orchestration and checkpoint selection.
//!
//! Two independent workflows share this crate:
//!
//! 1. **Training**: load CSV splits, keep the text and label columns, binarize
//!    labels, and hand the prepared data to an external fine-tuning framework
//!    running as a managed Python subprocess ([`training::TrainingDriver`]).
//! 2. **Selection**: scan `<root>/<task>/<run>/trainer_state.json` logs, pick
//!    each run's best epoch by a validation metric, and aggregate the test
//!    metrics at that epoch across repeated runs ([`selection::ModelSelector`]).

// Foundation
pub mod config;
pub mod error;
pub mod persistence;
pub mod runtime;

// Data preparation
pub mod data;

// Trainer orchestration
pub mod training;

// Checkpoint selection
pub mod selection;

// Re-exports
pub use config::SeqtuneConfig;
pub use error::MlError;
pub use runtime::PythonRuntime;
pub use selection::{ModelSelector, RunFailure, RunOutcome, ScoreTable, SelectionReport};
pub use training::{TrainRequest, TrainingArguments, TrainingDriver};
