//! Left join of generated results onto the input dataset.

use crate::error::PipelineError;
use crate::store::{write_csv_table, CheckpointTable, Dataset};
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

/// Input columns followed by renamed result columns, one row per input case in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl MergedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Write the table as CSV, replacing `path` atomically.
    pub fn write(&self, path: &Path) -> Result<(), PipelineError> {
        write_csv_table(path, &self.columns, &self.rows)
    }
}

/// Output names for `fields` after applying `rename_map`.
///
/// A name that collides with an input column (or an earlier result column) gets the first free
/// `_2`, `_3`, ... suffix instead of silently shadowing it.
pub fn rename_result_columns(
    fields: &[String],
    rename_map: &[(&str, &str)],
    input_columns: &[String],
) -> Vec<String> {
    let mut taken: HashSet<String> = input_columns.iter().cloned().collect();
    let mut renamed = Vec::with_capacity(fields.len());

    for field in fields {
        let target = rename_map
            .iter()
            .find(|(from, _)| *from == field.as_str())
            .map(|(_, to)| (*to).to_string())
            .unwrap_or_else(|| field.clone());

        let mut name = target.clone();
        let mut suffix = 2;
        while taken.contains(&name) {
            name = format!("{}_{}", target, suffix);
            suffix += 1;
        }
        if name != target {
            warn!(
                field = %field,
                column = %target,
                renamed = %name,
                "Result column collides with an existing column"
            );
        }

        taken.insert(name.clone());
        renamed.push(name);
    }
    renamed
}

/// Join `results` onto `dataset` by case id.
///
/// Every input row appears exactly once, in input order. Cases without a result get empty
/// result cells; results for ids not in the dataset are dropped. The index column is not part
/// of the output.
pub fn merge_results(
    dataset: &Dataset,
    results: &CheckpointTable,
    rename_map: &[(&str, &str)],
) -> MergedTable {
    let fields = results.fields();
    let mut columns = dataset.columns().to_vec();
    columns.extend(rename_result_columns(fields, rename_map, dataset.columns()));

    let rows = dataset
        .cases()
        .iter()
        .map(|case| {
            let result = results.get(case.id);
            let mut row = case.values.clone();
            row.extend(fields.iter().map(|field| {
                result
                    .and_then(|r| r.get(field))
                    .unwrap_or_default()
                    .to_string()
            }));
            row
        })
        .collect();

    MergedTable { columns, rows }
}
