//! Best-epoch selection over a run's metric log.

use crate::config::SelectorConfig;
use crate::selection::outcome::{RunFailure, RunScores, TestScore};
use crate::training::state::{LogRecord, TrainerState};
use serde::{Deserialize, Serialize};

/// Which metrics pick the epoch, and which are reported at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionCriteria {
    /// Validation metrics maximised to choose the epoch.
    pub best_metrics: Vec<String>,
    /// Validation metrics whose test counterparts are collected.
    pub selected_metrics: Vec<String>,
}

impl From<&SelectorConfig> for SelectionCriteria {
    fn from(config: &SelectorConfig) -> Self {
        Self {
            best_metrics: config.best_metrics.clone(),
            selected_metrics: config.selected_metrics.clone(),
        }
    }
}

/// Group key for repeated runs: the run name without its last two `_` segments.
///
/// `"t5_base_lr3_seed1_trial0"` becomes `"t5_base_lr3"`; names with fewer than
/// three segments yield an empty key.
pub fn aggregation_key(run_name: &str) -> String {
    let parts: Vec<&str> = run_name.split('_').collect();
    let keep = parts.len().saturating_sub(2);
    parts[..keep].join("_")
}

/// Test-split counterpart of a validation metric, or `None` for other metrics.
pub fn test_metric_name(metric: &str) -> Option<String> {
    metric
        .contains("validation")
        .then(|| metric.replace("validation", "test"))
}

/// Epoch of the first record holding the maximum of `metric`.
///
/// Records without the metric, or with it logged as null (non-finite in the
/// trainer's log), are never chosen.
pub fn best_epoch(history: &[LogRecord], metric: &str) -> Result<f64, RunFailure> {
    if history.is_empty() {
        return Err(RunFailure::EmptyHistory);
    }

    let mut best: Option<(f64, &LogRecord)> = None;
    for record in history {
        let Some(value) = record.get(metric).filter(|v| !v.is_null()) else {
            continue;
        };
        let value = value.as_f64().ok_or_else(|| RunFailure::NonNumericValue {
            metric: metric.to_string(),
        })?;
        // Strict comparison keeps the earliest record on ties.
        if best.is_none_or(|(top, _)| value > top) {
            best = Some((value, record));
        }
    }

    let (_, record) = best.ok_or_else(|| RunFailure::MetricNeverLogged {
        metric: metric.to_string(),
    })?;
    record.epoch().ok_or_else(|| RunFailure::MissingEpoch {
        metric: metric.to_string(),
    })
}

/// Smallest best epoch across all `best_metrics`.
pub fn selected_epoch(history: &[LogRecord], best_metrics: &[String]) -> Result<f64, RunFailure> {
    let mut selected: Option<f64> = None;
    for metric in best_metrics {
        let epoch = best_epoch(history, metric)?;
        selected = Some(selected.map_or(epoch, |s| s.min(epoch)));
    }
    selected.ok_or(RunFailure::NoBestMetrics)
}

/// Value of `metric` in the first record logged at `epoch`.
fn score_at_epoch(history: &[LogRecord], metric: &str, epoch: f64) -> Result<f64, RunFailure> {
    let mut found = None;
    for record in history.iter().filter(|r| r.contains(metric)) {
        let logged_at = record.epoch().ok_or_else(|| RunFailure::MissingEpoch {
            metric: metric.to_string(),
        })?;
        // Both sides come from the same log, so exact comparison is intended.
        if found.is_none() && logged_at == epoch {
            found = record.get(metric);
        }
    }

    let value = found.ok_or_else(|| RunFailure::TestMetricMissing {
        metric: metric.to_string(),
        epoch,
    })?;
    value.as_f64().ok_or_else(|| RunFailure::NonNumericValue {
        metric: metric.to_string(),
    })
}

/// Pick the run's epoch and read every test score at it.
///
/// All-or-nothing: any missing score fails the whole run.
pub fn evaluate_run(
    state: &TrainerState,
    criteria: &SelectionCriteria,
) -> Result<RunScores, RunFailure> {
    let history = &state.log_history;
    let epoch = selected_epoch(history, &criteria.best_metrics)?;

    let mut scores = Vec::with_capacity(criteria.selected_metrics.len());
    for metric in &criteria.selected_metrics {
        let Some(test_metric) = test_metric_name(metric) else {
            continue;
        };
        let value = score_at_epoch(history, &test_metric, epoch)?;
        scores.push(TestScore {
            metric: test_metric,
            value,
        });
    }

    Ok(RunScores { epoch, scores })
}
