//! Harvesting a working directory into tables grouped by scan parameter.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::HarvestConfig;
use crate::error::Result;
use crate::filename::{FilenameMatcher, ParamKind};
use crate::normalize::OutputNormalizer;
use crate::table::{NormalizedTable, TableParser};

/// One scan point: the parameter value and its table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterRecord {
    /// Value as written in the filename, e.g. `"0.50"`.
    pub value: String,
    pub table: NormalizedTable,
    pub source: PathBuf,
    /// SHA-256 of the file before repair.
    pub raw_digest: String,
}

/// Records per parameter kind. Always holds an entry for every kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultCollection(BTreeMap<ParamKind, Vec<ParameterRecord>>);

impl ResultCollection {
    pub fn new() -> Self {
        Self(ParamKind::ALL.iter().map(|kind| (*kind, Vec::new())).collect())
    }

    pub fn get(&self, kind: ParamKind) -> &[ParameterRecord] {
        self.0.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn push(&mut self, kind: ParamKind, record: ParameterRecord) {
        self.0.entry(kind).or_default().push(record);
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParamKind, &[ParameterRecord])> {
        self.0.iter().map(|(kind, records)| (*kind, records.as_slice()))
    }

    pub fn record_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}

impl Default for ResultCollection {
    fn default() -> Self {
        Self::new()
    }
}

/// A matched file that could not be turned into a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub kind: ParamKind,
    pub error: String,
}

/// Everything one harvest produced.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    pub directory: PathBuf,
    pub harvested_at: DateTime<Utc>,
    pub results: ResultCollection,
    pub failures: Vec<FileFailure>,
}

impl HarvestReport {
    /// Whether every matched file produced a table.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome for one file, kept so a file matched by both kinds is only
/// repaired once per harvest.
#[derive(Debug, Clone)]
enum Harvested {
    Table {
        table: NormalizedTable,
        raw_digest: String,
    },
    Failed(String),
}

/// Drives discovery, normalization and parsing for both parameter kinds.
#[derive(Debug, Clone, Default)]
pub struct ResultAggregator {
    normalizer: OutputNormalizer,
}

impl ResultAggregator {
    pub fn new(config: &HarvestConfig) -> Self {
        Self {
            normalizer: OutputNormalizer::new(config),
        }
    }

    /// Harvest `dir` for `B` and `T`.
    ///
    /// Structural problems are reported per file in
    /// [`HarvestReport::failures`]; I/O errors abort the harvest.
    pub fn collect(&self, dir: &Path) -> Result<HarvestReport> {
        info!(dir = %dir.display(), "Starting harvest");

        let mut seen: HashMap<PathBuf, Harvested> = HashMap::new();
        let mut results = ResultCollection::new();
        let mut failures = Vec::new();

        for kind in ParamKind::ALL {
            let matched = FilenameMatcher::new(kind).discover(dir)?;
            info!(
                kind = %kind,
                quantity = kind.description(),
                matched = matched.len(),
                "Discovered output files"
            );

            let fresh: Vec<PathBuf> = matched
                .iter()
                .filter(|m| !seen.contains_key(&m.path))
                .map(|m| m.path.clone())
                .collect();
            self.harvest_batch(&fresh, &mut seen)?;

            for file in &matched {
                let Some(harvested) = seen.get(&file.path) else {
                    continue;
                };
                match harvested {
                    Harvested::Table { table, raw_digest } => results.push(
                        kind,
                        ParameterRecord {
                            value: file.value().to_string(),
                            table: table.clone(),
                            source: file.path.clone(),
                            raw_digest: raw_digest.clone(),
                        },
                    ),
                    Harvested::Failed(error) => failures.push(FileFailure {
                        path: file.path.clone(),
                        kind,
                        error: error.clone(),
                    }),
                }
            }
        }

        info!(
            records = results.record_count(),
            failures = failures.len(),
            "Harvest finished"
        );

        Ok(HarvestReport {
            directory: dir.to_path_buf(),
            harvested_at: Utc::now(),
            results,
            failures,
        })
    }

    fn harvest_batch(
        &self,
        paths: &[PathBuf],
        seen: &mut HashMap<PathBuf, Harvested>,
    ) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }

        let outcome = self.normalizer.normalize_batch(paths)?;
        for (path, err) in outcome.rejected {
            seen.insert(path, Harvested::Failed(err.to_string()));
        }
        for repaired in outcome.repaired {
            let harvested = match TableParser::parse_str(&repaired.content) {
                Ok(table) => Harvested::Table {
                    table,
                    raw_digest: repaired.raw_digest,
                },
                Err(err) => {
                    warn!(path = %repaired.path.display(), error = %err, "Repaired file did not parse");
                    Harvested::Failed(err.to_string())
                }
            };
            seen.insert(repaired.path, harvested);
        }
        Ok(())
    }
}

/// Harvest `dir` with the default configuration.
pub fn collect_output(dir: impl AsRef<Path>) -> Result<HarvestReport> {
    ResultAggregator::default().collect(dir.as_ref())
}
