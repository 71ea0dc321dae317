//! Output filename convention and discovery.
//!
//! Cinola writes one table per scan point, named
//! `<prefix>_<kind><value>_run_1_<suffix>.txt`, e.g. `run_B0.50_run_1_x.txt`.
//! The grammar is parsed by hand rather than with a regex so that a malformed
//! decimal value is rejected explicitly.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HarvestError, Result};

/// Run-index segment. Only the first repetition is harvested.
pub const RUN_MARKER: &str = "_run_1_";

/// Extension of Cinola output tables.
pub const OUTPUT_EXTENSION: &str = "txt";

/// Physical quantity a scan was performed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParamKind {
    /// Field strength.
    B,
    /// Temperature.
    T,
}

impl ParamKind {
    /// Both kinds, in harvesting order.
    pub const ALL: [ParamKind; 2] = [ParamKind::B, ParamKind::T];

    /// The letter used in filenames.
    pub fn letter(&self) -> char {
        match self {
            ParamKind::B => 'B',
            ParamKind::T => 'T',
        }
    }

    /// Name of the scanned quantity, for logs and reports.
    pub fn description(&self) -> &'static str {
        match self {
            ParamKind::B => "field strength",
            ParamKind::T => "temperature",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for ParamKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "B" | "b" => Ok(ParamKind::B),
            "T" | "t" => Ok(ParamKind::T),
            other => Err(format!("unknown parameter kind: {other}")),
        }
    }
}

/// The parts of a recognised output filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputName {
    pub prefix: String,
    pub kind: ParamKind,
    /// Scan value exactly as written, e.g. `"0.50"`.
    pub value: String,
    pub suffix: String,
}

impl OutputName {
    /// Parse a bare file name (no directory) for the given kind.
    ///
    /// When several `_<kind><value>_run_1_` fragments are present the
    /// rightmost one is used, the rest becomes part of the prefix.
    pub fn parse(file_name: &str, kind: ParamKind) -> Option<Self> {
        let stem = file_name.strip_suffix(&format!(".{OUTPUT_EXTENSION}"))?;
        let needle = format!("_{}", kind.letter());

        for (idx, _) in stem.rmatch_indices(&needle) {
            let rest = &stem[idx + needle.len()..];
            let Some(value_len) = decimal_len(rest) else {
                continue;
            };
            let Some(suffix) = rest[value_len..].strip_prefix(RUN_MARKER) else {
                continue;
            };
            return Some(Self {
                prefix: stem[..idx].to_string(),
                kind,
                value: rest[..value_len].to_string(),
                suffix: suffix.to_string(),
            });
        }
        None
    }

    /// Rebuild the file name this was parsed from.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}{}{}{}.{}",
            self.prefix, self.kind, self.value, RUN_MARKER, self.suffix, OUTPUT_EXTENSION
        )
    }
}

/// Length of a `<digits>.<digits>` literal at the start of `s`.
fn decimal_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let int_len = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    if int_len == 0 || bytes.get(int_len) != Some(&b'.') {
        return None;
    }
    let frac_len = bytes[int_len + 1..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if frac_len == 0 {
        return None;
    }
    Some(int_len + 1 + frac_len)
}

/// An output file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedFile {
    pub path: PathBuf,
    pub name: OutputName,
}

impl MatchedFile {
    pub fn value(&self) -> &str {
        &self.name.value
    }
}

/// Finds the output files of one parameter kind in a working directory.
#[derive(Debug, Clone, Copy)]
pub struct FilenameMatcher {
    kind: ParamKind,
}

impl FilenameMatcher {
    pub fn new(kind: ParamKind) -> Self {
        Self { kind }
    }

    /// Match a bare file name.
    pub fn matches(&self, file_name: &str) -> Option<OutputName> {
        OutputName::parse(file_name, self.kind)
    }

    /// List matching regular files directly inside `dir`, sorted by file name.
    ///
    /// Non-matching and non-UTF-8 names are skipped without error.
    pub fn discover(&self, dir: &Path) -> Result<Vec<MatchedFile>> {
        let entries = fs::read_dir(dir).map_err(|e| HarvestError::io(dir, e))?;

        let mut matched = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| HarvestError::io(dir, e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            match self.matches(file_name) {
                Some(name) => matched.push(MatchedFile { path, name }),
                None => debug!(file = %file_name, kind = %self.kind, "Skipping non-matching file"),
            }
        }

        matched.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_name() {
        let name = OutputName::parse("run_B0.50_run_1_x.txt", ParamKind::B).unwrap();
        assert_eq!(name.prefix, "run");
        assert_eq!(name.kind, ParamKind::B);
        assert_eq!(name.value, "0.50");
        assert_eq!(name.suffix, "x");
    }

    #[test]
    fn test_parse_keeps_value_as_text() {
        let name = OutputName::parse("sim_T010.000_run_1_out.txt", ParamKind::T).unwrap();
        assert_eq!(name.value, "010.000");
    }

    #[test]
    fn test_parse_empty_prefix_and_suffix() {
        let name = OutputName::parse("_T2.5_run_1_.txt", ParamKind::T).unwrap();
        assert_eq!(name.prefix, "");
        assert_eq!(name.suffix, "");
        assert_eq!(name.value, "2.5");
    }

    #[test]
    fn test_parse_rejects_wrong_run_index() {
        assert!(OutputName::parse("run_B0.50_run_2_x.txt", ParamKind::B).is_none());
        assert!(OutputName::parse("run_B0.50_run_10_x.txt", ParamKind::B).is_none());
    }

    #[test]
    fn test_parse_rejects_malformed_decimal() {
        for name in [
            "run_B1_run_1_x.txt",
            "run_B1._run_1_x.txt",
            "run_B.5_run_1_x.txt",
            "run_B1.2.3_run_1_x.txt",
            "run_B-1.0_run_1_x.txt",
        ] {
            assert!(OutputName::parse(name, ParamKind::B).is_none(), "{name}");
        }
    }

    #[test]
    fn test_parse_rejects_other_kind_and_extension() {
        assert!(OutputName::parse("run_B0.50_run_1_x.txt", ParamKind::T).is_none());
        assert!(OutputName::parse("run_B0.50_run_1_x.dat", ParamKind::B).is_none());
        assert!(OutputName::parse("run_B0.50_run_1_x_Bmissingcol", ParamKind::B).is_none());
    }

    #[test]
    fn test_parse_prefers_rightmost_fragment() {
        let name = OutputName::parse("a_B1.0_run_1_b_B2.0_run_1_c.txt", ParamKind::B).unwrap();
        assert_eq!(name.prefix, "a_B1.0_run_1_b");
        assert_eq!(name.value, "2.0");
        assert_eq!(name.suffix, "c");
    }

    #[test]
    fn test_parse_skips_non_matching_fragment_to_the_right() {
        let name = OutputName::parse("x_B1.5_run_1_y_B.txt", ParamKind::B).unwrap();
        assert_eq!(name.value, "1.5");
        assert_eq!(name.suffix, "y_B");
    }

    #[test]
    fn test_value_roundtrips_through_file_name() {
        for file in [
            "run_B0.50_run_1_x.txt",
            "p_T300.0_run_1_long_suffix.txt",
            "_B0.000_run_1_.txt",
        ] {
            let kind = if file.contains("_T") { ParamKind::T } else { ParamKind::B };
            let name = OutputName::parse(file, kind).unwrap();
            assert_eq!(name.file_name(), file);
            let again = OutputName::parse(&name.file_name(), kind).unwrap();
            assert_eq!(again.value, name.value);
        }
    }

    #[test]
    fn test_param_kind_display_and_parse() {
        assert_eq!(ParamKind::B.to_string(), "B");
        assert_eq!("T".parse::<ParamKind>().unwrap(), ParamKind::T);
        assert!("X".parse::<ParamKind>().is_err());
        assert_eq!(ParamKind::B.description(), "field strength");
        assert_eq!(ParamKind::T.description(), "temperature");
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for file in [
            "run_B1.00_run_1_x.txt",
            "run_B0.50_run_1_x.txt",
            "run_B0.50_run_2_x.txt",
            "run_T5.0_run_1_x.txt",
            "notes.txt",
            "run_B0.75_run_1_x_Bmissingcol",
        ] {
            std::fs::write(dir.path().join(file), "").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub_B9.9_run_1_dir.txt")).unwrap();

        let found = FilenameMatcher::new(ParamKind::B)
            .discover(dir.path())
            .unwrap();
        let values: Vec<&str> = found.iter().map(|m| m.value()).collect();
        assert_eq!(values, vec!["0.50", "1.00"]);
    }

    #[test]
    fn test_discover_missing_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = FilenameMatcher::new(ParamKind::T)
            .discover(&missing)
            .unwrap_err();
        assert!(matches!(err, HarvestError::Io { .. }));
    }
}
