//! Input dataset: an ordered, indexed table of cases loaded from CSV.

use crate::error::{PipelineError, StorageError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Column holding the stable case identifier across runs.
pub const INDEX_COLUMN: &str = "original_index";

/// Stable identifier of a case, reused across resumed runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CaseId(pub u64);

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CaseId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(CaseId)
    }
}

/// One row of the dataset. `values` lines up with [`Dataset::columns`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    pub id: CaseId,
    pub values: Vec<String>,
}

/// Ordered collection of cases keyed by [`CaseId`].
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<String>,
    cases: Vec<Case>,
    positions: HashMap<CaseId, usize>,
}

impl Dataset {
    /// Build a dataset whose identifiers follow row order (0, 1, 2, ...).
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, PipelineError> {
        let cases = rows
            .into_iter()
            .enumerate()
            .map(|(i, values)| Case {
                id: CaseId(i as u64),
                values,
            })
            .collect();
        Self::from_cases(columns, cases)
    }

    /// Build a dataset from cases that already carry identifiers.
    ///
    /// Fails when identifiers repeat or a row's width differs from the header.
    pub fn from_cases(columns: Vec<String>, cases: Vec<Case>) -> Result<Self, PipelineError> {
        let mut positions = HashMap::with_capacity(cases.len());
        for (pos, case) in cases.iter().enumerate() {
            if case.values.len() != columns.len() {
                return Err(PipelineError::Config(format!(
                    "Case {} has {} values but the dataset has {} columns",
                    case.id,
                    case.values.len(),
                    columns.len()
                )));
            }
            if positions.insert(case.id, pos).is_some() {
                return Err(PipelineError::Config(format!(
                    "Duplicate identifier {} in column '{}'; identifiers must be unique",
                    case.id, INDEX_COLUMN
                )));
            }
        }
        Ok(Self {
            columns,
            cases,
            positions,
        })
    }

    /// Load a dataset from a CSV file.
    ///
    /// When the file carries an [`INDEX_COLUMN`] it is reused as the identifier and removed
    /// from the visible columns; otherwise identifiers are derived from row order.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| StorageError::csv(path, e))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| StorageError::csv(path, e))?
            .iter()
            .map(str::to_string)
            .collect();
        let index_pos = headers.iter().position(|h| h == INDEX_COLUMN);

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| StorageError::csv(path, e))?;
            rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }

        let Some(index_pos) = index_pos else {
            return Self::from_rows(headers, rows);
        };

        let mut columns = headers;
        columns.remove(index_pos);
        let mut cases = Vec::with_capacity(rows.len());
        for (line, mut values) in rows.into_iter().enumerate() {
            let raw = values.remove(index_pos);
            let id = raw.parse::<CaseId>().map_err(|_| {
                PipelineError::Config(format!(
                    "Invalid identifier '{}' in column '{}' of {} (data row {}); expected a non-negative integer",
                    raw,
                    INDEX_COLUMN,
                    path.display(),
                    line + 1
                ))
            })?;
            cases.push(Case { id, values });
        }
        Self::from_cases(columns, cases)
    }

    /// Visible columns, excluding the identifier.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn ids(&self) -> BTreeSet<CaseId> {
        self.cases.iter().map(|c| c.id).collect()
    }

    pub fn get(&self, id: CaseId) -> Option<&Case> {
        self.positions.get(&id).map(|&pos| &self.cases[pos])
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Position of `name`, or a configuration error listing the available columns.
    pub fn require_column(&self, name: &str) -> Result<usize, PipelineError> {
        self.column_index(name).ok_or_else(|| {
            PipelineError::Config(format!(
                "Column '{}' not found in input data. Available columns: [{}]",
                name,
                self.columns
                    .iter()
                    .map(|c| format!("'{}'", c))
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })
    }

    /// Value of column `column` for case `id`.
    pub fn value(&self, id: CaseId, column: usize) -> Option<&str> {
        self.get(id)
            .and_then(|case| case.values.get(column))
            .map(String::as_str)
    }
}
