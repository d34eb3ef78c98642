//! Data source abstraction for loading tabular splits.

use crate::error::MlError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A batch of data rows with typed cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataBatch {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl DataBatch {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Metadata about where a batch came from, kept for lineage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceInfo {
    pub source_type: String,
    pub location: String,
    pub accessed_at: DateTime<Utc>,
    pub row_count: Option<usize>,
}

/// Trait for loading data from a source.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Load data from this source, optionally limiting the number of rows.
    async fn load(&self, limit: Option<usize>) -> Result<DataBatch, MlError>;

    /// Return metadata about this source for lineage tracking.
    fn source_info(&self) -> DataSourceInfo;
}

// ---------------------------------------------------------------------------
// CsvSource
// ---------------------------------------------------------------------------

/// CSV file data source. The first record is the header.
pub struct CsvSource {
    pub path: PathBuf,
    pub delimiter: u8,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: b',',
        }
    }
}

#[async_trait]
impl DataSource for CsvSource {
    async fn load(&self, limit: Option<usize>) -> Result<DataBatch, MlError> {
        let content = tokio::fs::read(&self.path).await.map_err(|e| {
            MlError::dataset(format!("Failed to read {}: {e}", self.path.display()))
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .from_reader(content.as_slice());

        let columns: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        if columns.is_empty() {
            return Err(MlError::dataset(format!(
                "Empty CSV file: {}",
                self.path.display()
            )));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            if limit.is_some_and(|max| rows.len() >= max) {
                break;
            }
            let record = record?;
            rows.push(record.iter().map(infer_cell).collect());
        }

        Ok(DataBatch { columns, rows })
    }

    fn source_info(&self) -> DataSourceInfo {
        DataSourceInfo {
            source_type: "csv".to_string(),
            location: self.path.display().to_string(),
            accessed_at: Utc::now(),
            row_count: None,
        }
    }
}

/// Type a raw CSV cell: empty -> null, then integer, float, bool, string.
///
/// Text is kept verbatim; only the type probe looks at the trimmed value.
pub fn infer_cell(raw: &str) -> serde_json::Value {
    let s = raw.trim();
    if s.is_empty() {
        serde_json::Value::Null
    } else if let Ok(i) = s.parse::<i64>() {
        serde_json::Value::Number(i.into())
    } else if let Some(n) = s.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        serde_json::Value::Number(n)
    } else if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false") {
        serde_json::Value::Bool(s.eq_ignore_ascii_case("true"))
    } else {
        serde_json::Value::String(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_infer_cell_types() {
        assert_eq!(infer_cell(""), json!(null));
        assert_eq!(infer_cell("   "), json!(null));
        assert_eq!(infer_cell("0"), json!(0));
        assert_eq!(infer_cell("1"), json!(1));
        assert_eq!(infer_cell("0.5"), json!(0.5));
        assert_eq!(infer_cell("True"), json!(true));
        assert_eq!(infer_cell("false"), json!(false));
        assert_eq!(infer_cell(" spaced text "), json!(" spaced text "));
        // NaN has no JSON number form and stays text.
        assert_eq!(infer_cell("NaN"), json!("NaN"));
    }

    #[tokio::test]
    async fn test_csv_load_quoted_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("train.csv");
        std::fs::write(
            &path,
            "id,clue,is_target\n1,\"river, bank\",1\n2,\"say \"\"hi\"\"\",\n",
        )
        .unwrap();

        let batch = CsvSource::new(&path).load(None).await.unwrap();
        assert_eq!(batch.columns, vec!["id", "clue", "is_target"]);
        assert_eq!(batch.row_count(), 2);
        assert_eq!(batch.rows[0], vec![json!(1), json!("river, bank"), json!(1)]);
        assert_eq!(batch.rows[1], vec![json!(2), json!("say \"hi\""), json!(null)]);
    }

    #[tokio::test]
    async fn test_csv_load_limit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("split.csv");
        std::fs::write(&path, "a\n1\n2\n3\n").unwrap();

        let batch = CsvSource::new(&path).load(Some(2)).await.unwrap();
        assert_eq!(batch.row_count(), 2);
    }

    #[tokio::test]
    async fn test_csv_missing_file() {
        let err = CsvSource::new("/nonexistent/split.csv")
            .load(None)
            .await
            .unwrap_err();
        assert!(matches!(err, MlError::Dataset(_)));
    }

    #[tokio::test]
    async fn test_csv_ragged_row_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "a,b\n1,2\n3\n").unwrap();

        let err = CsvSource::new(&path).load(None).await.unwrap_err();
        assert!(matches!(err, MlError::Csv(_)));
    }

    #[test]
    fn test_csv_source_info() {
        let src = CsvSource::new("data/train.csv");
        let info = src.source_info();
        assert_eq!(info.source_type, "csv");
        assert_eq!(info.location, "data/train.csv");
    }
}
