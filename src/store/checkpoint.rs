//! Append-only CSV checkpoint of completed generation results.
//!
//! The file holds a header row followed by one row per successfully generated case. Rows are
//! appended one at a time, each in a single write followed by a flush to disk. A write that
//! fails partway is truncated back to the previous length. An unterminated trailing row left
//! by a killed process is ignored on load and discarded before the next append, so a torn
//! write costs at most the in-flight case.

use crate::error::{PipelineError, StorageError};
use crate::generation::GenerationResult;
use crate::store::dataset::CaseId;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Durable record of completed cases.
pub trait CheckpointStore {
    /// Read every persisted result. `None` when nothing has been checkpointed yet.
    fn load(&self) -> Result<Option<CheckpointTable>, PipelineError>;

    /// Persist one result. Must be durable before returning.
    fn append(&self, id: CaseId, result: &GenerationResult) -> Result<(), PipelineError>;
}

/// In-memory view of a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointTable {
    index_column: String,
    fields: Vec<String>,
    records: BTreeMap<CaseId, GenerationResult>,
}

impl CheckpointTable {
    pub fn empty(index_column: impl Into<String>) -> Self {
        Self {
            index_column: index_column.into(),
            fields: Vec::new(),
            records: BTreeMap::new(),
        }
    }

    /// Add a record, keeping the first one stored for an id. Returns whether it was added.
    ///
    /// New field names extend the header in first-seen order.
    pub fn insert(&mut self, id: CaseId, result: GenerationResult) -> bool {
        if self.records.contains_key(&id) {
            return false;
        }
        for name in result.field_names() {
            if !self.fields.iter().any(|f| f == name) {
                self.fields.push(name.to_string());
            }
        }
        self.records.insert(id, result);
        true
    }

    pub fn index_column(&self) -> &str {
        &self.index_column
    }

    /// Result field names in header order, excluding the index column.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn get(&self, id: CaseId) -> Option<&GenerationResult> {
        self.records.get(&id)
    }

    pub fn contains(&self, id: CaseId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn ids(&self) -> BTreeSet<CaseId> {
        self.records.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// CSV-file backed checkpoint store. Opened for append on every write, never held open.
#[derive(Debug, Clone)]
pub struct CsvCheckpointStore {
    path: PathBuf,
    index_column: String,
}

impl CsvCheckpointStore {
    pub fn new(path: impl Into<PathBuf>, index_column: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            index_column: index_column.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_len(&self) -> Result<u64, StorageError> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Length of the file up to the end of its last newline-terminated record.
    fn complete_len(&self) -> Result<u64, StorageError> {
        let len = self.file_len()?;
        if len == 0 || self.ends_with_newline()? {
            return Ok(len);
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| StorageError::csv(&self.path, e))?;
        let mut record = csv::ByteRecord::new();
        let mut last_start = 0;
        loop {
            let start = reader.position().byte();
            let more = reader
                .read_byte_record(&mut record)
                .map_err(|e| StorageError::csv(&self.path, e))?;
            if !more {
                break;
            }
            last_start = start;
        }
        Ok(last_start)
    }

    /// Cut the file back to `len` bytes.
    fn truncate_to(&self, len: u64) -> Result<(), StorageError> {
        let file = OpenOptions::new().write(true).open(&self.path)?;
        file.set_len(len)?;
        file.sync_data()?;
        Ok(())
    }

    fn read_header(&self) -> Result<Vec<String>, PipelineError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)
            .map_err(|e| StorageError::csv(&self.path, e))?;
        let headers = reader
            .headers()
            .map_err(|e| StorageError::csv(&self.path, e))?;
        Ok(headers.iter().map(str::to_string).collect())
    }

    fn ends_with_newline(&self) -> Result<bool, StorageError> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::End(-1))?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last)?;
        Ok(last[0] == b'\n')
    }

    /// Lay out `result` in the order of an existing header.
    fn row_for_header(
        &self,
        header: &[String],
        id: CaseId,
        result: &GenerationResult,
    ) -> Result<Vec<String>, StorageError> {
        if let Some(extra) = result
            .field_names()
            .find(|name| !header.iter().any(|h| h.as_str() == *name))
        {
            return Err(StorageError::SchemaMismatch {
                path: self.path.clone(),
                detail: format!("result field '{}' is not in the header", extra),
            });
        }

        header
            .iter()
            .map(|column| {
                if *column == self.index_column {
                    Ok(id.to_string())
                } else {
                    result
                        .get(column)
                        .map(str::to_string)
                        .ok_or_else(|| StorageError::SchemaMismatch {
                            path: self.path.clone(),
                            detail: format!("result is missing field '{}'", column),
                        })
                }
            })
            .collect()
    }
}

impl CheckpointStore for CsvCheckpointStore {
    fn load(&self) -> Result<Option<CheckpointTable>, PipelineError> {
        let complete = self.complete_len()?;
        if complete == 0 {
            return Ok(None);
        }
        if complete < self.file_len()? {
            warn!(
                checkpoint = %self.path.display(),
                "Ignoring unterminated trailing checkpoint row"
            );
        }

        let file = File::open(&self.path).map_err(StorageError::from)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(file.take(complete));
        let header: Vec<String> = reader
            .headers()
            .map_err(|e| StorageError::csv(&self.path, e))?
            .iter()
            .map(str::to_string)
            .collect();

        let index_pos = header
            .iter()
            .position(|h| *h == self.index_column)
            .ok_or_else(|| {
                PipelineError::Config(format!(
                    "Expected column '{}' in {}, found columns: [{}]",
                    self.index_column,
                    self.path.display(),
                    header.join(", ")
                ))
            })?;

        let fields: Vec<String> = header
            .iter()
            .enumerate()
            .filter(|(pos, _)| *pos != index_pos)
            .map(|(_, name)| name.clone())
            .collect();

        let mut records = BTreeMap::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|e| {
                PipelineError::Config(format!(
                    "Malformed checkpoint {} at data row {}: {}",
                    self.path.display(),
                    line + 1,
                    e
                ))
            })?;

            let raw_id = record.get(index_pos).unwrap_or_default();
            let id = raw_id.parse::<CaseId>().map_err(|_| {
                PipelineError::Config(format!(
                    "Malformed checkpoint {}: invalid identifier '{}' at data row {}",
                    self.path.display(),
                    raw_id,
                    line + 1
                ))
            })?;

            let result: GenerationResult = header
                .iter()
                .zip(record.iter())
                .enumerate()
                .filter(|(pos, _)| *pos != index_pos)
                .map(|(_, (name, value))| (name.as_str(), value))
                .collect();

            if records.contains_key(&id) {
                warn!(
                    case_id = %id,
                    checkpoint = %self.path.display(),
                    "Duplicate checkpoint row ignored; keeping the first"
                );
                continue;
            }
            records.insert(id, result);
        }

        Ok(Some(CheckpointTable {
            index_column: self.index_column.clone(),
            fields,
            records,
        }))
    }

    fn append(&self, id: CaseId, result: &GenerationResult) -> Result<(), PipelineError> {
        let complete = self.complete_len()?;
        if complete < self.file_len()? {
            warn!(
                case_id = %id,
                checkpoint = %self.path.display(),
                "Discarding unterminated trailing checkpoint row before append"
            );
            self.truncate_to(complete)?;
        }
        let existing = complete > 0;

        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        if existing {
            let header = self.read_header()?;
            let row = self.row_for_header(&header, id, result)?;
            writer
                .write_record(&row)
                .map_err(|e| StorageError::csv(&self.path, e))?;
        } else {
            let mut header = vec![self.index_column.clone()];
            header.extend(result.field_names().map(str::to_string));
            let mut row = vec![id.to_string()];
            row.extend(result.iter().map(|(_, v)| v.to_string()));
            writer
                .write_record(&header)
                .map_err(|e| StorageError::csv(&self.path, e))?;
            writer
                .write_record(&row)
                .map_err(|e| StorageError::csv(&self.path, e))?;
        }

        let buffer = writer
            .into_inner()
            .map_err(|e| StorageError::IoError(e.into_error()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(StorageError::from)?;
        if let Err(e) = file.write_all(&buffer).and_then(|()| file.sync_data()) {
            if let Err(rollback) = file.set_len(complete) {
                warn!(
                    case_id = %id,
                    checkpoint = %self.path.display(),
                    error = %rollback,
                    "Failed to roll back partial checkpoint write"
                );
            }
            return Err(StorageError::from(e).into());
        }

        debug!(case_id = %id, checkpoint = %self.path.display(), "Checkpointed result");
        Ok(())
    }
}
