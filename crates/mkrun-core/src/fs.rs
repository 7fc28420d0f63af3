//! Filesystem-backed discovery and document loading.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use glob::{MatchOptions, Pattern, glob_with};
use tokio::fs::read_to_string;
use tokio::task::spawn_blocking;

use crate::document::{DocumentRef, SourceDocument};
use crate::paths::{normalize, relative_to};
use crate::traits::{DocumentLoader, FileDiscovery};
use crate::{Error, Result};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// [`FileDiscovery`] over the local filesystem using glob patterns.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobDiscovery;

impl GlobDiscovery {
    /// Synchronous discovery, run on a blocking task by the trait impl.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`] if a pattern or exclude is malformed.
    pub fn find_files_blocking(
        base_dir: &Path,
        patterns: &[String],
        excludes: &[String],
    ) -> Result<Vec<PathBuf>> {
        let excluded = excludes
            .iter()
            .map(|exclude| {
                Pattern::new(exclude)
                    .map_err(|err| Error::Discovery(format!("invalid exclude '{exclude}': {err}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let escaped_base = Pattern::escape(&base_dir.to_string_lossy());
        let mut files = Vec::new();
        for pattern in patterns {
            let full_pattern = Path::new(&escaped_base).join(pattern);
            let entries = glob_with(&full_pattern.to_string_lossy(), MATCH_OPTIONS)
                .map_err(|err| Error::Discovery(format!("invalid pattern '{pattern}': {err}")))?;

            for entry in entries {
                let path = match entry {
                    Ok(path) => normalize(&path),
                    Err(err) => {
                        tracing::debug!("skipping unreadable glob entry: {err}");
                        continue;
                    }
                };
                if !path.is_file() {
                    continue;
                }
                let relative = relative_to(&path, &normalize(base_dir)).to_path_buf();
                if excluded
                    .iter()
                    .any(|exclude| exclude.matches_path_with(&relative, MATCH_OPTIONS))
                {
                    tracing::trace!("excluded {}", path.display());
                    continue;
                }
                files.push(path);
            }
        }
        files.sort();
        files.dedup();
        Ok(files)
    }
}

#[async_trait]
impl FileDiscovery for GlobDiscovery {
    async fn find_files(
        &self,
        base_dir: &Path,
        patterns: &[String],
        excludes: &[String],
    ) -> Result<Vec<PathBuf>> {
        let base = base_dir.to_path_buf();
        let owned_patterns = patterns.to_vec();
        let owned_excludes = excludes.to_vec();
        spawn_blocking(move || Self::find_files_blocking(&base, &owned_patterns, &owned_excludes))
            .await
            .map_err(|err| Error::Discovery(format!("discovery task failed: {err}")))?
    }
}

/// [`DocumentLoader`] reading UTF-8 files from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDocumentLoader;

#[async_trait]
impl DocumentLoader for FsDocumentLoader {
    async fn open_document(&self, path: &Path) -> Result<DocumentRef> {
        let text = read_to_string(path)
            .await
            .map_err(|err| Error::DocumentNotFound {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;
        Ok(SourceDocument::new(normalize(path), text).shared())
    }
}
