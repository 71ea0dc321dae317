//! Error taxonomy for output harvesting.
//!
//! Two tiers: [`HarvestError`] aborts a run (filesystem, configuration),
//! while [`StageError`] and [`TableError`] describe a single malformed file
//! and are collected per file by the aggregator.

use std::path::{Path, PathBuf};

use crate::stage::RepairStage;

/// Structural problems a repair stage can detect in a file's lines.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructureError {
    #[error("expected a header line and a unit line, found {found} line(s)")]
    TooFewLines { found: usize },

    #[error("{names} column name(s) but only {units} unit(s)")]
    MissingUnits { names: usize, units: usize },

    #[error("{names} column name(s) but {units} unit(s)")]
    UnitCountMismatch { names: usize, units: usize },

    #[error("header is already combined into name_[unit] tokens")]
    AlreadyCombined,
}

/// A structural failure tagged with the stage that detected it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stage {stage} rejected file: {reason}")]
pub struct StageError {
    pub stage: RepairStage,
    #[source]
    pub reason: StructureError,
}

impl StageError {
    pub fn new(stage: RepairStage, reason: StructureError) -> Self {
        Self { stage, reason }
    }
}

/// Errors produced while parsing a normalized file into a table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("file has no header line")]
    MissingHeader,

    #[error("line {line}: expected {expected} field(s), found {found}")]
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: column {column} value {value:?} is not a number")]
    InvalidNumber {
        line: usize,
        column: String,
        value: String,
    },
}

/// Run-level errors. Any of these aborts the harvest.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("table error in {}: {source}", .path.display())]
    Table {
        path: PathBuf,
        #[source]
        source: TableError,
    },

    #[error("no content supplied for input key: {0}")]
    MissingInputContent(String),
}

impl HarvestError {
    /// Attach a path to an I/O error.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        HarvestError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Result type for run-level harvest operations.
pub type Result<T> = std::result::Result<T, HarvestError>;
