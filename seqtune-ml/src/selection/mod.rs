//! Checkpoint selection: best epoch per run, test scores aggregated per configuration.

pub mod criteria;
pub mod outcome;
pub mod scores;
pub mod selector;

pub use criteria::{
    SelectionCriteria, aggregation_key, best_epoch, evaluate_run, selected_epoch,
    test_metric_name,
};
pub use outcome::{RunFailure, RunOutcome, RunScores, TaskFailure, TestScore};
pub use scores::{MetricSummary, ScoreTable};
pub use selector::{ModelSelector, SelectionReport, scan_run};
