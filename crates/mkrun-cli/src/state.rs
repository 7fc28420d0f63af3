//! JSON persistence of the last executed target.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{from_str, to_string_pretty};

use mkrun_core::{LastExecutedTarget, Result, StateStore};

const STATE_FILE: &str = "last-target.json";

/// Stores the last executed target in `<folder>/last-target.json`.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    /// Creates a store in `folder`; the folder is created on first save.
    pub fn new(folder: &Path) -> Self {
        Self {
            path: folder.join(STATE_FILE),
        }
    }

    /// Path of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonStateStore {
    fn save_last(&self, target: &LastExecutedTarget) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, to_string_pretty(target)?)?;
        tracing::debug!("Saved last target {} to {}", target.name, self.path.display());
        Ok(())
    }

    fn load_last(&self) -> Result<Option<LastExecutedTarget>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(Some(from_str(&contents)?))
    }
}
