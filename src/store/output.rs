//! Final merged artifact writer.

use crate::error::{PipelineError, StorageError};
use std::path::{Path, PathBuf};

/// Write `columns` + `rows` to `path` as CSV.
///
/// The table is written to a sibling temporary file and renamed into place, so readers never
/// observe a partially written output.
pub fn write_csv_table(
    path: &Path,
    columns: &[String],
    rows: &[Vec<String>],
) -> Result<(), PipelineError> {
    let tmp = temp_path(path);
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(&tmp)
        .map_err(|e| StorageError::csv(&tmp, e))?;

    writer
        .write_record(columns)
        .map_err(|e| StorageError::csv(&tmp, e))?;
    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| StorageError::csv(&tmp, e))?;
    }
    writer.flush().map_err(StorageError::from)?;
    drop(writer);

    std::fs::rename(&tmp, path).map_err(StorageError::from)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Create the parent directory of `path` if it has one.
pub fn ensure_parent_dir(path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(StorageError::from)?;
        }
    }
    Ok(())
}
