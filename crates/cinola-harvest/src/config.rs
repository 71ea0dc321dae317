//! Harvest configuration, loaded from TOML.
//!
//! ```toml
//! keep_backups = true
//! strict_units = false
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};
use crate::stage::UnitPolicy;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarvestConfig {
    /// Write a `<stem>_B<tag>` snapshot before every stage rewrites a file.
    pub keep_backups: bool,

    /// Reject files whose unit line is longer than the header.
    pub strict_units: bool,
}

impl HarvestConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn with_backups(mut self, keep_backups: bool) -> Self {
        self.keep_backups = keep_backups;
        self
    }

    pub fn with_strict_units(mut self, strict_units: bool) -> Self {
        self.strict_units = strict_units;
        self
    }

    pub fn unit_policy(&self) -> UnitPolicy {
        if self.strict_units {
            UnitPolicy::Strict
        } else {
            UnitPolicy::DropSurplus
        }
    }
}
