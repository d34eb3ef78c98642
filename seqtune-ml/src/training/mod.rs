//! Trainer orchestration: hyperparameters, run files, subprocess launch and trainer state.

pub mod arguments;
pub mod runner;
pub mod script;
pub mod state;

pub use arguments::{IntervalStrategy, TrainingArguments};
pub use runner::{
    PreparedRun, RunManifest, TrainRequest, TrainingDriver, TrainingOutcome, TrainingStatus,
};
pub use state::{LogRecord, TrainerState};
