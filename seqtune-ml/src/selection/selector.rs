//! Directory scan over `<root>/<task>/<run>/trainer_state.json`.

use crate::config::SelectorConfig;
use crate::error::MlError;
use crate::persistence::atomic_write_json;
use crate::selection::criteria::{SelectionCriteria, aggregation_key, evaluate_run};
use crate::selection::outcome::{RunFailure, RunOutcome, RunScores, TaskFailure};
use crate::selection::scores::{MetricSummary, ScoreTable};
use crate::training::state::TrainerState;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Read one run's log and evaluate it.
pub fn scan_run(
    log_path: &Path,
    criteria: &SelectionCriteria,
) -> Result<RunScores, RunFailure> {
    let content = std::fs::read_to_string(log_path).map_err(|e| RunFailure::LogUnreadable {
        path: log_path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let state = TrainerState::parse(&content).map_err(|e| RunFailure::MalformedLog {
        reason: e.to_string(),
    })?;
    evaluate_run(&state, criteria)
}

/// Entries of a task directory, sorted by name.
fn list_runs(task_dir: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
    WalkDir::new(task_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| entry.map(|e| e.into_path()))
        .collect()
}

/// Everything one scan produced.
#[derive(Debug, Clone, Default)]
pub struct SelectionReport {
    pub table: ScoreTable,
    pub outcomes: Vec<RunOutcome>,
    pub task_failures: Vec<TaskFailure>,
}

/// Serializable view of a report.
#[derive(Debug, Serialize)]
pub struct ReportExport<'a> {
    pub scores: &'a ScoreTable,
    pub summary: Vec<MetricSummary>,
    pub failed_runs: Vec<FailedRun<'a>>,
    pub task_failures: &'a [TaskFailure],
}

#[derive(Debug, Serialize)]
pub struct FailedRun<'a> {
    pub task: &'a str,
    pub run: &'a str,
    pub log_path: &'a Path,
    pub failure: &'a RunFailure,
}

impl SelectionReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = (&RunOutcome, &RunFailure)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.failure().map(|f| (o, f)))
    }

    pub fn export(&self) -> ReportExport<'_> {
        ReportExport {
            scores: &self.table,
            summary: self.table.summary(),
            failed_runs: self
                .failed()
                .map(|(o, f)| FailedRun {
                    task: &o.task,
                    run: &o.run,
                    log_path: &o.log_path,
                    failure: f,
                })
                .collect(),
            task_failures: &self.task_failures,
        }
    }

    /// Write the table, summary and failures as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), MlError> {
        atomic_write_json(path, &self.export())?;
        Ok(())
    }
}

/// Scans checkpoint directories and aggregates test scores at each run's best epoch.
pub struct ModelSelector {
    root: PathBuf,
    tasks: Vec<String>,
    state_file: String,
    criteria: SelectionCriteria,
}

impl ModelSelector {
    pub fn new(config: &SelectorConfig) -> Self {
        Self {
            root: config.checkpoint_root.clone(),
            tasks: config.tasks.clone(),
            state_file: config.state_file.clone(),
            criteria: SelectionCriteria::from(config),
        }
    }

    /// Scan every configured task, folding successful runs into `table`.
    ///
    /// Never fails: unreadable tasks and failed runs are recorded in the report.
    pub fn scan(&self, mut table: ScoreTable) -> SelectionReport {
        let mut outcomes = Vec::new();
        let mut task_failures = Vec::new();

        for task in &self.tasks {
            let task_dir = self.root.join(task);
            info!(task = %task, path = %task_dir.display(), "Scanning task");

            let runs = match list_runs(&task_dir) {
                Ok(runs) => runs,
                Err(e) => {
                    warn!(task = %task, error = %e, "Cannot list task directory");
                    task_failures.push(TaskFailure {
                        task: task.clone(),
                        path: task_dir,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            for run_dir in runs {
                let run = run_dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let key = aggregation_key(&run);
                let log_path = run_dir.join(&self.state_file);
                let result = scan_run(&log_path, &self.criteria);

                match &result {
                    Ok(scores) => {
                        info!(task = %task, run = %run, epoch = scores.epoch, "Selected epoch");
                        for score in &scores.scores {
                            debug!(run = %run, metric = %score.metric, value = score.value, "Test score");
                        }
                        table.merge_run(&key, scores);
                    }
                    Err(failure) => {
                        warn!(path = %log_path.display(), error = %failure, "Run failed");
                    }
                }

                outcomes.push(RunOutcome {
                    task: task.clone(),
                    run,
                    aggregation_key: key,
                    log_path,
                    result,
                });
            }
        }

        SelectionReport {
            table,
            outcomes,
            task_failures,
        }
    }
}
