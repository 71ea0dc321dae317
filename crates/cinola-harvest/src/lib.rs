//! Cinola output harvesting.
//!
//! Cinola writes one whitespace/tab-delimited table per scan point, with a
//! header line, a unit line and rows that are not all the same width. This
//! crate:
//! - Finds the tables for a field (`B`) or temperature (`T`) scan by filename
//! - Repairs them in place so the header describes every column
//! - Parses them into numeric tables grouped by scan value

pub mod aggregate;
pub mod config;
pub mod error;
pub mod filename;
pub mod input;
pub mod normalize;
pub mod stage;
pub mod table;
pub mod telemetry;

pub use aggregate::{
    collect_output, FileFailure, HarvestReport, ParameterRecord, ResultAggregator,
    ResultCollection,
};
pub use config::HarvestConfig;
pub use error::{HarvestError, Result, StageError, StructureError, TableError};
pub use filename::{FilenameMatcher, MatchedFile, OutputName, ParamKind};
pub use input::{copy_input_files, write_input_files, InputFile, INPUT_FILES};
pub use normalize::{repair_lines, repair_text, BatchOutcome, OutputNormalizer, RepairedFile};
pub use stage::{RepairStage, UnitPolicy};
pub use table::{NormalizedTable, TableParser};
pub use telemetry::init_tracing;
