//! Staging of Cinola input files into a working directory.
//!
//! The simulation reads a fixed set of configuration files. Each one is
//! either copied from a template directory or written from pre-rendered
//! content looked up by key.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{HarvestError, Result};

/// A configuration file Cinola reads at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputFile {
    pub file_name: &'static str,

    /// Key of the rendered content for this file. `None` for files that can
    /// only come from a template.
    pub content_key: Option<&'static str>,
}

const fn input(file_name: &'static str, content_key: Option<&'static str>) -> InputFile {
    InputFile {
        file_name,
        content_key,
    }
}

/// Every input file, in the order Cinola lists them.
pub const INPUT_FILES: &[InputFile] = &[
    input("mm.dat", None),
    input("cinola.aa", Some("aniso_axes_string")),
    input("cinola.ae", Some("aniso_energies_string")),
    input("cinola.am", Some("aniso_and_moment_assign_string")),
    input("cinola.co", Some("general_config_string")),
    input("cinola.jj", Some("jij_assign_string")),
    input("cinola.jv", Some("jvalues_string")),
    input("cinola.mm", Some("moments_string")),
    input("cinola.nn", Some("neighborhoods_string")),
    input("cinola.po", Some("positions_string")),
];

/// Copy every input file present in `template_dir` into `working_dir`.
///
/// Files missing from the template directory are skipped. Returns the
/// paths that were written.
pub fn copy_input_files(template_dir: &Path, working_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut copied = Vec::new();
    for file in INPUT_FILES {
        let source = template_dir.join(file.file_name);
        let dest = working_dir.join(file.file_name);
        match fs::copy(&source, &dest) {
            Ok(_) => copied.push(dest),
            Err(e) if e.kind() == ErrorKind::NotFound && !source.exists() => {
                debug!(source = %source.display(), "Template file missing, skipping");
            }
            Err(e) => return Err(HarvestError::io(&source, e)),
        }
    }

    info!(
        copied = copied.len(),
        from = %template_dir.display(),
        "Staged input files from templates"
    );
    Ok(copied)
}

/// Write every keyed input file from `contents` into `working_dir`.
///
/// All keys are checked before anything is written.
pub fn write_input_files(
    working_dir: &Path,
    contents: &BTreeMap<String, String>,
) -> Result<Vec<PathBuf>> {
    let mut planned = Vec::new();
    for file in INPUT_FILES {
        let Some(key) = file.content_key else {
            continue;
        };
        let body = contents
            .get(key)
            .ok_or_else(|| HarvestError::MissingInputContent(key.to_string()))?;
        planned.push((working_dir.join(file.file_name), body));
    }

    let mut written = Vec::with_capacity(planned.len());
    for (dest, body) in planned {
        fs::write(&dest, body).map_err(|e| HarvestError::io(&dest, e))?;
        written.push(dest);
    }

    info!(written = written.len(), dir = %working_dir.display(), "Wrote input files");
    Ok(written)
}
