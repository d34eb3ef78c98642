//! Score table accumulated across runs.

use crate::selection::outcome::RunScores;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregation key -> test metric -> one value per contributing run, in scan order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreTable {
    entries: BTreeMap<String, BTreeMap<String, Vec<f64>>>,
}

/// Mean and spread of one metric under one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub key: String,
    pub metric: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; `None` with fewer than two runs.
    pub std_dev: Option<f64>,
}

impl ScoreTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: &str, metric: &str, value: f64) {
        self.entries
            .entry(key.to_string())
            .or_default()
            .entry(metric.to_string())
            .or_default()
            .push(value);
    }

    /// Append every score of one successful run under `key`.
    pub fn merge_run(&mut self, key: &str, run: &RunScores) {
        for score in &run.scores {
            self.record(key, &score.metric, score.value);
        }
    }

    pub fn get(&self, key: &str, metric: &str) -> Option<&[f64]> {
        self.entries
            .get(key)
            .and_then(|m| m.get(metric))
            .map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn summary(&self) -> Vec<MetricSummary> {
        self.entries
            .iter()
            .flat_map(|(key, metrics)| {
                metrics.iter().map(move |(metric, values)| {
                    let count = values.len();
                    let mean = values.iter().sum::<f64>() / count as f64;
                    let std_dev = (count > 1).then(|| {
                        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
                            / (count - 1) as f64;
                        var.sqrt()
                    });
                    MetricSummary {
                        key: key.clone(),
                        metric: metric.clone(),
                        count,
                        mean,
                        std_dev,
                    }
                })
            })
            .collect()
    }
}
