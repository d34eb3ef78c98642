//! Data preparation: CSV loading, column pruning and label binarization.

pub mod source;
pub mod transform;

pub use source::{CsvSource, DataBatch, DataSource, DataSourceInfo};
pub use transform::{PreparedExample, binarize_label, prepare_split, prune_columns};
