//! Tabular storage
//!
//! Input datasets, the append-only checkpoint of completed results, and the merged output
//! artifact. All three are CSV files.

pub mod checkpoint;
pub mod dataset;
pub mod output;

pub use checkpoint::{CheckpointStore, CheckpointTable, CsvCheckpointStore};
pub use dataset::{Case, CaseId, Dataset, INDEX_COLUMN};
pub use output::{ensure_parent_dir, write_csv_table};
