//! Per-run results of a checkpoint scan.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Why a run contributed nothing to the score table.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunFailure {
    #[error("cannot read {}: {reason}", path.display())]
    LogUnreadable { path: PathBuf, reason: String },

    #[error("malformed trainer state: {reason}")]
    MalformedLog { reason: String },

    #[error("log_history is empty")]
    EmptyHistory,

    #[error("no best-epoch metric configured")]
    NoBestMetrics,

    #[error("metric '{metric}' never logged")]
    MetricNeverLogged { metric: String },

    #[error("record holding '{metric}' has no epoch")]
    MissingEpoch { metric: String },

    #[error("metric '{metric}' is not a number")]
    NonNumericValue { metric: String },

    #[error("'{metric}' not logged at epoch {epoch}")]
    TestMetricMissing { metric: String, epoch: f64 },
}

/// A test metric read at the selected epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestScore {
    pub metric: String,
    pub value: f64,
}

/// Everything a successful run contributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunScores {
    /// Selected (best) epoch.
    pub epoch: f64,
    /// Test scores in configured metric order.
    pub scores: Vec<TestScore>,
}

/// Outcome of scanning one run directory.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub task: String,
    pub run: String,
    pub aggregation_key: String,
    pub log_path: PathBuf,
    pub result: Result<RunScores, RunFailure>,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn failure(&self) -> Option<&RunFailure> {
        self.result.as_ref().err()
    }
}

/// A task directory that could not be listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub task: String,
    pub path: PathBuf,
    pub reason: String,
}
