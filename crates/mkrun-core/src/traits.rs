//! Collaborator traits for discovery, loading, execution and state.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::Result;
use crate::document::DocumentRef;
use crate::launch::{ExecutionOutcome, RenderedCommand};
use crate::state::LastExecutedTarget;

/// Finds files below a base directory.
#[async_trait]
pub trait FileDiscovery: Send + Sync {
    /// Returns the files under `base_dir` matching any of `patterns`, skipping
    /// those matching any of `excludes`.
    ///
    /// Patterns are relative to `base_dir`. The order of the result must be
    /// stable for the same tree.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Discovery`] if a pattern is malformed.
    async fn find_files(
        &self,
        base_dir: &Path,
        patterns: &[String],
        excludes: &[String],
    ) -> Result<Vec<PathBuf>>;
}

/// Opens documents by path.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Opens the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DocumentNotFound`] if the path does not exist or
    /// is not readable.
    async fn open_document(&self, path: &Path) -> Result<DocumentRef>;
}

/// Hands rendered commands to a process.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Executes `command` and reports how it finished.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Execution`] if the process cannot be started.
    async fn execute(&self, command: &RenderedCommand) -> Result<ExecutionOutcome>;
}

/// Persists the last executed target.
pub trait StateStore: Send + Sync {
    /// Records `target` as the last executed one.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be written.
    fn save_last(&self, target: &LastExecutedTarget) -> Result<()>;

    /// Loads the last executed target, if one was recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if the state exists but cannot be read.
    fn load_last(&self) -> Result<Option<LastExecutedTarget>>;
}
