//! Split preparation for binary sequence classification.

use crate::data::source::DataBatch;
use crate::error::MlError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One example ready for the trainer: raw text and a 0/1 label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedExample {
    pub text: String,
    pub label: u8,
}

/// Drop every column not named in `keep`, preserving the original column order.
pub fn prune_columns(batch: DataBatch, keep: &[&str], split: &str) -> Result<DataBatch, MlError> {
    if let Some(missing) = keep.iter().find(|k| batch.column_index(k).is_none()) {
        return Err(MlError::dataset(format!(
            "column '{missing}' not found in {split} split (columns: {})",
            batch.columns.join(", ")
        )));
    }

    let indices: Vec<usize> = batch
        .columns
        .iter()
        .enumerate()
        .filter(|(_, c)| keep.contains(&c.as_str()))
        .map(|(i, _)| i)
        .collect();

    let columns = indices.iter().map(|&i| batch.columns[i].clone()).collect();
    let rows = batch
        .rows
        .into_iter()
        .map(|row| {
            indices
                .iter()
                .map(|&i| row.get(i).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    Ok(DataBatch { columns, rows })
}

/// Truthiness of a label cell: null, `false`, zero, and empty values map to 0.
pub fn binarize_label(value: &Value) -> u8 {
    let truthy = match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    };
    u8::from(truthy)
}

fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Prune a split to its text and label columns and emit prepared examples.
pub fn prepare_split(
    batch: DataBatch,
    text_column: &str,
    label_column: &str,
    split: &str,
) -> Result<Vec<PreparedExample>, MlError> {
    let batch = prune_columns(batch, &[text_column, label_column], split)?;
    let text_idx = batch
        .column_index(text_column)
        .ok_or_else(|| MlError::dataset(format!("column '{text_column}' missing")))?;
    let label_idx = batch
        .column_index(label_column)
        .ok_or_else(|| MlError::dataset(format!("column '{label_column}' missing")))?;

    batch
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let text = cell_text(&row[text_idx]).ok_or_else(|| {
                MlError::dataset(format!(
                    "{split} split row {}: empty '{text_column}' value",
                    i + 1
                ))
            })?;
            Ok(PreparedExample {
                text,
                label: binarize_label(&row[label_idx]),
            })
        })
        .collect()
}
