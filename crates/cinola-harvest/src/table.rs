//! Parsing of normalized output files into numeric tables.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result, TableError};

/// A parsed output table: `name_[unit]` columns and rows of numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTable {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl NormalizedTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of the named column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }
}

/// Reads normalized text into a [`NormalizedTable`].
pub struct TableParser;

impl TableParser {
    /// Parse normalized text. Blank lines are skipped; line numbers in
    /// errors are 1-based.
    pub fn parse_str(text: &str) -> std::result::Result<NormalizedTable, TableError> {
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        let (_, header) = lines.next().ok_or(TableError::MissingHeader)?;
        let columns: Vec<String> = header.split_whitespace().map(str::to_string).collect();

        let mut rows = Vec::new();
        for (idx, line) in lines {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != columns.len() {
                return Err(TableError::RaggedRow {
                    line: idx + 1,
                    expected: columns.len(),
                    found: fields.len(),
                });
            }

            let row = fields
                .iter()
                .zip(&columns)
                .map(|(field, column)| {
                    field.parse::<f64>().map_err(|_| TableError::InvalidNumber {
                        line: idx + 1,
                        column: column.clone(),
                        value: field.to_string(),
                    })
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.push(row);
        }

        Ok(NormalizedTable { columns, rows })
    }

    /// Read and parse a normalized file.
    pub fn parse_file(path: &Path) -> Result<NormalizedTable> {
        let text = fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;
        Self::parse_str(&text).map_err(|source| HarvestError::Table {
            path: path.to_path_buf(),
            source,
        })
    }
}
