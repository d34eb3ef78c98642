//! The trainer's `trainer_state.json` log.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::path::Path;

/// One entry of `log_history`: metric name to value, plus the epoch it was logged at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogRecord(pub Map<String, Value>);

impl LogRecord {
    /// Epoch of this record, if logged as a number.
    pub fn epoch(&self) -> Option<f64> {
        self.0.get("epoch").and_then(Value::as_f64)
    }

    pub fn get(&self, metric: &str) -> Option<&Value> {
        self.0.get(metric)
    }

    pub fn contains(&self, metric: &str) -> bool {
        self.0.contains_key(metric)
    }
}

impl From<Value> for LogRecord {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }
}

/// Parsed trainer state. Only `log_history` is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainerState {
    pub log_history: Vec<LogRecord>,
    #[serde(default)]
    pub best_metric: Option<f64>,
    #[serde(default)]
    pub best_model_checkpoint: Option<String>,
    #[serde(default)]
    pub epoch: Option<f64>,
    #[serde(default)]
    pub global_step: Option<u64>,
}

impl TrainerState {
    /// Parse a state file. The bare `NaN`, `Infinity` and `-Infinity` tokens
    /// Python's `json` module emits are read as `null`.
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(&nullify_non_finite(content))
    }

    /// Load from disk. Returns `Ok(None)` if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Option<Self>, crate::error::MlError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Some(Self::parse(&content)?))
    }
}

const NON_FINITE: [&str; 3] = ["-Infinity", "Infinity", "NaN"];

/// Replace non-finite number tokens outside string literals with `null`.
fn nullify_non_finite(content: &str) -> Cow<'_, str> {
    if !content.contains("NaN") && !content.contains("Infinity") {
        return Cow::Borrowed(content);
    }

    let bytes = content.as_bytes();
    let mut out = String::with_capacity(content.len());
    let mut copied = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        if b == b'"' {
            in_string = true;
            i += 1;
            continue;
        }
        match NON_FINITE
            .iter()
            .find(|token| bytes[i..].starts_with(token.as_bytes()))
        {
            Some(token) => {
                out.push_str(&content[copied..i]);
                out.push_str("null");
                i += token.len();
                copied = i;
            }
            None => i += 1,
        }
    }
    out.push_str(&content[copied..]);
    Cow::Owned(out)
}
