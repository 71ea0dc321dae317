//! Repair stages for Cinola output tables.
//!
//! Each stage is a pure function from lines to lines. The stages are not
//! idempotent and only make sense in the order of [`RepairStage::ORDERED`].

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StageError, StructureError};

/// Upper bound on the common field count, matching the tool's widest table.
pub const MAX_FIELDS: usize = 99;

/// Placeholder name for columns the tool leaves unnamed.
pub const MISSING_NAME: &str = "NO";

/// Unit given to the acceptance-rate column, which the tool leaves unitless.
pub const ACCEPTANCE_UNIT: &str = "1";

/// The four repair stages, in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RepairStage {
    /// Truncate every line to the narrowest common width.
    OutputFormatCleanup,

    /// Insert `NO` where the header or unit line has an empty column.
    AddMissingColumnName,

    /// Merge `acceptance rate` into one token and give it a unit.
    FixAcceptanceNameAndUnit,

    /// Fold the unit line into the header as `name_[unit]` tokens.
    CombineNameAndUnit,
}

impl RepairStage {
    pub const ORDERED: [RepairStage; 4] = [
        RepairStage::OutputFormatCleanup,
        RepairStage::AddMissingColumnName,
        RepairStage::FixAcceptanceNameAndUnit,
        RepairStage::CombineNameAndUnit,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RepairStage::OutputFormatCleanup => "output_format_cleanup",
            RepairStage::AddMissingColumnName => "add_missing_column_name",
            RepairStage::FixAcceptanceNameAndUnit => "fix_acceptance_name_and_unit",
            RepairStage::CombineNameAndUnit => "combine_name_and_unit",
        }
    }

    /// Tag used in backup file names. `fixaccaptance` is spelled the way
    /// existing backup directories already use it.
    pub fn backup_tag(&self) -> &'static str {
        match self {
            RepairStage::OutputFormatCleanup => "outputformatcleanup",
            RepairStage::AddMissingColumnName => "missingcol",
            RepairStage::FixAcceptanceNameAndUnit => "fixaccaptance",
            RepairStage::CombineNameAndUnit => "combinenameunit",
        }
    }

    /// Backup location for `path` before this stage rewrites it:
    /// `<dir>/<stem>_B<tag>`, without extension.
    pub fn backup_path(&self, path: &Path) -> PathBuf {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_name = format!("{stem}_B{}", self.backup_tag());
        match path.parent() {
            Some(dir) => dir.join(file_name),
            None => PathBuf::from(file_name),
        }
    }

    /// Run this stage over `lines`.
    pub fn apply(
        &self,
        lines: &[String],
        policy: UnitPolicy,
    ) -> Result<Vec<String>, StageError> {
        let result = match self {
            RepairStage::OutputFormatCleanup => Ok(output_format_cleanup(lines)),
            RepairStage::AddMissingColumnName => add_missing_column_name(lines),
            RepairStage::FixAcceptanceNameAndUnit => fix_acceptance_name_and_unit(lines),
            RepairStage::CombineNameAndUnit => combine_name_and_unit(lines, policy),
        };
        result.map_err(|reason| StageError::new(*self, reason))
    }
}

impl fmt::Display for RepairStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How [`combine_name_and_unit`] treats a unit line longer than the header.
///
/// Names without a unit are always rejected. Surplus units are normal: the
/// cleanup stage truncates the header to the data width, after which the
/// acceptance unit appended by stage three has no column left to describe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitPolicy {
    /// Drop trailing units that have no column.
    #[default]
    DropSurplus,
    /// Any count mismatch is an error.
    Strict,
}

fn require_header_and_units(lines: &[String]) -> Result<(), StructureError> {
    if lines.len() < 2 {
        return Err(StructureError::TooFewLines { found: lines.len() });
    }
    Ok(())
}

/// Keep the first `minFields` tokens of every line, where `minFields` is the
/// smallest token count of any non-blank line (capped at [`MAX_FIELDS`]).
/// Blank lines are dropped.
pub fn output_format_cleanup(lines: &[String]) -> Vec<String> {
    let tokenized: Vec<Vec<&str>> = lines
        .iter()
        .map(|line| line.split_whitespace().collect::<Vec<_>>())
        .filter(|tokens| !tokens.is_empty())
        .collect();

    let min_fields = tokenized
        .iter()
        .map(Vec::len)
        .min()
        .unwrap_or(0)
        .min(MAX_FIELDS);

    tokenized
        .iter()
        .map(|tokens| tokens[..min_fields].join(" "))
        .collect()
}

fn fill_missing_names(line: &str) -> String {
    line.replace('\t', " ").replace("  ", &format!(" {MISSING_NAME} "))
}

/// Replace tabs with spaces and each double space with ` NO ` on the header
/// and unit lines. Data lines pass through untouched.
pub fn add_missing_column_name(lines: &[String]) -> Result<Vec<String>, StructureError> {
    require_header_and_units(lines)?;

    let mut out = Vec::with_capacity(lines.len());
    out.push(fill_missing_names(&lines[0]));
    out.push(fill_missing_names(&lines[1]));
    out.extend_from_slice(&lines[2..]);
    Ok(out)
}

/// Merge `acceptance rate` into `acceptance_rate` in the header and append
/// the dimensionless unit to the unit line.
pub fn fix_acceptance_name_and_unit(lines: &[String]) -> Result<Vec<String>, StructureError> {
    require_header_and_units(lines)?;

    let mut out = Vec::with_capacity(lines.len());
    out.push(lines[0].replace("acceptance rate", "acceptance_rate"));
    out.push(format!("{} {ACCEPTANCE_UNIT}", lines[1].trim_end()));
    out.extend_from_slice(&lines[2..]);
    Ok(out)
}

/// Whether `token` already has the `name_[unit]` shape.
pub fn is_combined_token(token: &str) -> bool {
    token.ends_with(']') && token.find("_[").is_some_and(|idx| idx > 0)
}

/// Replace the header and unit lines with one `name_[unit]` header.
pub fn combine_name_and_unit(
    lines: &[String],
    policy: UnitPolicy,
) -> Result<Vec<String>, StructureError> {
    require_header_and_units(lines)?;

    let names: Vec<&str> = lines[0].split_whitespace().collect();
    let units: Vec<&str> = lines[1].split_whitespace().collect();

    if !names.is_empty() && names.iter().all(|name| is_combined_token(name)) {
        return Err(StructureError::AlreadyCombined);
    }
    if units.len() < names.len() {
        return Err(StructureError::MissingUnits {
            names: names.len(),
            units: units.len(),
        });
    }
    if units.len() > names.len() {
        if policy == UnitPolicy::Strict {
            return Err(StructureError::UnitCountMismatch {
                names: names.len(),
                units: units.len(),
            });
        }
        debug!(
            dropped = ?&units[names.len()..],
            "Dropping units beyond the last column"
        );
    }

    let header = names
        .iter()
        .zip(&units)
        .map(|(name, unit)| format!("{name}_[{unit}]"))
        .collect::<Vec<_>>()
        .join(" ");

    let mut out = Vec::with_capacity(lines.len() - 1);
    out.push(header);
    out.extend_from_slice(&lines[2..]);
    Ok(out)
}
