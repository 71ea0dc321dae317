//! Applies the repair stages to output files on disk.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::HarvestConfig;
use crate::error::{HarvestError, Result, StageError};
use crate::stage::{RepairStage, UnitPolicy};

/// Output of running every stage over one file's lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repair {
    /// Final lines: one combined header followed by the data rows.
    pub lines: Vec<String>,

    /// The input each stage saw, in stage order. Empty unless requested.
    pub snapshots: Vec<(RepairStage, Vec<String>)>,
}

/// Run all four stages over `lines`, in order.
pub fn repair_lines(
    lines: Vec<String>,
    policy: UnitPolicy,
    keep_snapshots: bool,
) -> std::result::Result<Repair, StageError> {
    let mut current = lines;
    let mut snapshots = Vec::new();

    for stage in RepairStage::ORDERED {
        let next = stage.apply(&current, policy)?;
        if keep_snapshots {
            snapshots.push((stage, current));
        }
        current = next;
    }

    Ok(Repair {
        lines: current,
        snapshots,
    })
}

/// Run all four stages over a file's text, returning the repaired text.
pub fn repair_text(text: &str, policy: UnitPolicy) -> std::result::Result<String, StageError> {
    let lines = text.lines().map(str::to_string).collect();
    let repair = repair_lines(lines, policy, false)?;
    Ok(join_lines(&repair.lines))
}

fn join_lines(lines: &[String]) -> String {
    let mut text = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    text
}

/// A file rewritten in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairedFile {
    pub path: PathBuf,

    /// SHA-256 of the file as Cinola wrote it.
    pub raw_digest: String,

    /// Text now on disk.
    pub content: String,
}

/// Result of normalizing a batch of files.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub repaired: Vec<RepairedFile>,

    /// Files left untouched because a stage rejected them.
    pub rejected: Vec<(PathBuf, StageError)>,
}

impl BatchOutcome {
    pub fn repaired_count(&self) -> usize {
        self.repaired.len()
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }
}

/// Rewrites matched output files so they parse as tables.
#[derive(Debug, Clone, Default)]
pub struct OutputNormalizer {
    keep_backups: bool,
    policy: UnitPolicy,
}

impl OutputNormalizer {
    pub fn new(config: &HarvestConfig) -> Self {
        Self {
            keep_backups: config.keep_backups,
            policy: config.unit_policy(),
        }
    }

    /// Normalize every file in `paths`.
    ///
    /// Each file is read once, passed through all stages in memory and
    /// written back once. A file a stage rejects is left as it was and
    /// reported in [`BatchOutcome::rejected`]; the rest of the batch carries
    /// on. I/O errors abort the batch.
    pub fn normalize_batch(&self, paths: &[PathBuf]) -> Result<BatchOutcome> {
        info!(files = paths.len(), backups = self.keep_backups, "Normalizing output files");

        let mut outcome = BatchOutcome::default();
        for path in paths {
            match self.normalize_file(path)? {
                Ok(repaired) => outcome.repaired.push(repaired),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Output file rejected");
                    outcome.rejected.push((path.clone(), err));
                }
            }
        }

        info!(
            repaired = outcome.repaired_count(),
            rejected = outcome.rejected_count(),
            "Normalization finished"
        );
        Ok(outcome)
    }

    /// Normalize a single file. The outer result carries I/O failures, the
    /// inner one structural rejection.
    pub fn normalize_file(
        &self,
        path: &Path,
    ) -> Result<std::result::Result<RepairedFile, StageError>> {
        let raw = fs::read(path).map_err(|e| HarvestError::io(path, e))?;
        let raw_digest = hex::encode(Sha256::digest(&raw));
        let text = String::from_utf8_lossy(&raw);
        let lines = text.lines().map(str::to_string).collect();

        let repair = match repair_lines(lines, self.policy, self.keep_backups) {
            Ok(repair) => repair,
            Err(err) => return Ok(Err(err)),
        };

        let permissions = fs::metadata(path)
            .map_err(|e| HarvestError::io(path, e))?
            .permissions();

        for (stage, snapshot) in &repair.snapshots {
            let backup = stage.backup_path(path);
            write_atomic(&backup, &join_lines(snapshot), &permissions)?;
            debug!(backup = %backup.display(), stage = %stage, "Wrote backup snapshot");
        }

        let content = join_lines(&repair.lines);
        write_atomic(path, &content, &permissions)?;
        debug!(path = %path.display(), lines = repair.lines.len(), "Rewrote output file");

        Ok(Ok(RepairedFile {
            path: path.to_path_buf(),
            raw_digest,
            content,
        }))
    }
}

/// Write via a temp file in the same directory, then rename over `path`.
///
/// The temp file is created owner-only, so `permissions` are applied before
/// the rename; rewritten outputs and their backups keep the source's mode.
fn write_atomic(path: &Path, contents: &str, permissions: &fs::Permissions) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| HarvestError::io(dir, e))?;
    tmp.write_all(contents.as_bytes())
        .map_err(|e| HarvestError::io(tmp.path(), e))?;
    tmp.as_file()
        .set_permissions(permissions.clone())
        .map_err(|e| HarvestError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| HarvestError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StructureError;

    const RAW: &str = "T\tMag  \tMag\tacceptance rate\n\
                       K\tmu_B\temu/mol\n\
                       1.0 0.5 0.25 0.9 0.1\n\
                       2.0 0.4 0.20\n";

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_repair_text_full_pipeline() {
        let out = repair_text(RAW, UnitPolicy::DropSurplus).unwrap();
        assert_eq!(
            out,
            "T_[K] Mag_[mu_B] Mag_[emu/mol]\n1.0 0.5 0.25\n2.0 0.4 0.20\n"
        );
    }

    #[test]
    fn test_repair_text_strict_rejects_surplus_unit() {
        let err = repair_text(RAW, UnitPolicy::Strict).unwrap_err();
        assert_eq!(err.stage, RepairStage::CombineNameAndUnit);
        assert!(matches!(err.reason, StructureError::UnitCountMismatch { .. }));
    }

    #[test]
    fn test_repair_lines_snapshots_hold_stage_inputs() {
        let input = lines(&["T Mag", "K mu_B", "1 2"]);
        let repair = repair_lines(input.clone(), UnitPolicy::DropSurplus, true).unwrap();

        let stages: Vec<_> = repair.snapshots.iter().map(|(s, _)| *s).collect();
        assert_eq!(stages, RepairStage::ORDERED.to_vec());
        assert_eq!(repair.snapshots[0].1, input);
        assert_eq!(repair.snapshots[3].1, lines(&["T Mag", "K mu_B 1", "1 2"]));
        assert_eq!(repair.lines, lines(&["T_[K] Mag_[mu_B]", "1 2"]));
    }

    #[test]
    fn test_repair_rejects_header_only() {
        let err = repair_text("T Mag\n", UnitPolicy::DropSurplus).unwrap_err();
        assert_eq!(err.stage, RepairStage::AddMissingColumnName);
        assert_eq!(err.reason, StructureError::TooFewLines { found: 1 });
    }

    #[test]
    fn test_repair_twice_is_rejected() {
        let once = repair_text(RAW, UnitPolicy::DropSurplus).unwrap();
        let err = repair_text(&once, UnitPolicy::DropSurplus).unwrap_err();
        assert_eq!(err.reason, StructureError::AlreadyCombined);
    }

    #[test]
    fn test_normalize_file_rewrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_T5.0_run_1_x.txt");
        std::fs::write(&path, RAW).unwrap();

        let normalizer = OutputNormalizer::new(&HarvestConfig::default());
        let repaired = normalizer.normalize_file(&path).unwrap().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), repaired.content);
        assert_eq!(repaired.raw_digest, hex::encode(Sha256::digest(RAW.as_bytes())));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_normalize_file_writes_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_T5.0_run_1_x.txt");
        std::fs::write(&path, RAW).unwrap();

        let config = HarvestConfig::default().with_backups(true);
        OutputNormalizer::new(&config)
            .normalize_file(&path)
            .unwrap()
            .unwrap();

        for stage in RepairStage::ORDERED {
            assert!(stage.backup_path(&path).is_file(), "missing {stage} backup");
        }
        let first = std::fs::read_to_string(
            RepairStage::OutputFormatCleanup.backup_path(&path),
        )
        .unwrap();
        assert_eq!(first, RAW);
    }

    #[cfg(unix)]
    #[test]
    fn test_normalize_file_keeps_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_B0.50_run_1_x.txt");
        std::fs::write(&path, RAW).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let config = HarvestConfig::default().with_backups(true);
        OutputNormalizer::new(&config)
            .normalize_file(&path)
            .unwrap()
            .unwrap();

        let mode = |p: &Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&path), 0o644);
        for stage in RepairStage::ORDERED {
            assert_eq!(mode(&stage.backup_path(&path)), 0o644, "{stage} backup mode");
        }
    }

    #[test]
    fn test_batch_continues_past_rejected_file() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("a_B1.0_run_1_x.txt");
        let good = dir.path().join("b_B2.0_run_1_x.txt");
        std::fs::write(&bad, "only a header\n").unwrap();
        std::fs::write(&good, RAW).unwrap();

        let outcome = OutputNormalizer::default()
            .normalize_batch(&[bad.clone(), good.clone()])
            .unwrap();

        assert_eq!(outcome.repaired_count(), 1);
        assert_eq!(outcome.rejected_count(), 1);
        assert_eq!(outcome.rejected[0].0, bad);
        assert_eq!(std::fs::read_to_string(&bad).unwrap(), "only a header\n");
    }

    #[test]
    fn test_batch_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = OutputNormalizer::default()
            .normalize_batch(&[dir.path().join("gone_B1.0_run_1_x.txt")])
            .unwrap_err();
        assert!(matches!(err, HarvestError::Io { .. }));
    }
}
