//! Project-wide scans for target files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt as _;

use crate::config::Settings;
use crate::grammar::Grammars;
use crate::paths::{normalize, parent_dir, relative_to};
use crate::target::TargetOccurrence;
use crate::target_file::TargetFile;
use crate::traits::{DocumentLoader, FileDiscovery};
use crate::walker::IncludeWalker;
use crate::{Notice, Result};

/// Label of files at the top of the project.
pub const ROOT_LABEL: &str = "root";

/// A target file found by a scan.
#[derive(Debug, Clone)]
pub struct WorkspaceFile {
    /// Project-relative directory of the file, [`ROOT_LABEL`] at the top
    pub label: String,
    /// The file itself
    pub file: TargetFile,
}

/// Targets of one scanned file, direct ones first.
#[derive(Debug, Clone)]
pub struct FileTargets {
    /// The scanned file
    pub entry: WorkspaceFile,
    /// Every target reachable from the file
    pub targets: Vec<TargetOccurrence>,
}

/// Result of a scan with the zero-result conditions met along the way.
#[derive(Debug, Clone)]
pub struct Scan<T> {
    /// Items found
    pub items: Vec<T>,
    /// Informational notices, never errors
    pub notices: Vec<Notice>,
}

impl<T> Default for Scan<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            notices: Vec::new(),
        }
    }
}

/// A project tree with the collaborators needed to scan it.
#[derive(Clone)]
pub struct Workspace {
    root: PathBuf,
    settings: Arc<Settings>,
    grammars: Grammars,
    discovery: Arc<dyn FileDiscovery>,
    loader: Arc<dyn DocumentLoader>,
}

impl Workspace {
    /// Creates a workspace rooted at `root`.
    pub fn new(
        root: &Path,
        settings: Arc<Settings>,
        grammars: Grammars,
        discovery: Arc<dyn FileDiscovery>,
        loader: Arc<dyn DocumentLoader>,
    ) -> Self {
        Self {
            root: normalize(root),
            settings,
            grammars,
            discovery,
            loader,
        }
    }

    /// Project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Settings the workspace was created with.
    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// Known grammars.
    pub fn grammars(&self) -> &Grammars {
        &self.grammars
    }

    /// Document loader.
    pub fn loader(&self) -> &Arc<dyn DocumentLoader> {
        &self.loader
    }

    /// Walker resolving includes with this workspace's collaborators.
    pub fn walker(&self) -> IncludeWalker {
        IncludeWalker::new(Arc::clone(&self.discovery), Arc::clone(&self.loader))
    }

    /// Opens `path` as a target file of the runner matching its name.
    ///
    /// Relative paths resolve against the project root.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DocumentNotFound`] if the file cannot be read.
    pub async fn open(&self, path: &Path) -> Result<Option<TargetFile>> {
        let document = self.loader.open_document(&self.resolve(path)).await?;
        TargetFile::detect(document, &self.settings, &self.grammars)
    }

    /// Target files of `runner` below the root, `active` first when it is
    /// one of them.
    ///
    /// Files that cannot be read are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] or [`crate::Error::UnknownRunner`] if
    /// the runner cannot be used, or [`crate::Error::Discovery`] if its file
    /// patterns are malformed.
    pub async fn target_files(
        &self,
        runner: &str,
        active: Option<&Path>,
    ) -> Result<Scan<WorkspaceFile>> {
        let runner_settings = self.settings.runner(runner)?;
        let grammar = self.grammars.get(runner)?;
        let mut paths = self
            .discovery
            .find_files(
                &self.root,
                &runner_settings.workspace_patterns(),
                &self.settings.excluded_folders,
            )
            .await?;

        let active_position = active.map(|path| self.resolve(path)).and_then(|active_path| {
            paths
                .iter()
                .position(|path| normalize(path) == active_path)
        });
        if let Some(position) = active_position {
            let active_file = paths.remove(position);
            paths.insert(0, active_file);
        }

        let mut scan = Scan::default();
        for path in paths {
            match self.loader.open_document(&path).await {
                Ok(document) => scan.items.push(WorkspaceFile {
                    label: self.label(&path),
                    file: TargetFile::new(document, Arc::clone(&grammar)),
                }),
                Err(err) => tracing::warn!("skipping {}: {err}", path.display()),
            }
        }
        if scan.items.is_empty() {
            scan.notices.push(Notice::NoFilesFound {
                runner: runner.to_owned(),
            });
        }
        tracing::debug!(
            "found {} {runner} file(s) in {}",
            scan.items.len(),
            self.root.display()
        );
        Ok(scan)
    }

    /// Every target of every target file of `runner`, grouped by file.
    ///
    /// # Errors
    ///
    /// See [`Self::target_files`].
    pub async fn all_targets(
        &self,
        runner: &str,
        active: Option<&Path>,
    ) -> Result<Scan<FileTargets>> {
        let files = self.target_files(runner, active).await?;
        let walker = self.walker();
        let mut scan = Scan {
            items: Vec::with_capacity(files.items.len()),
            notices: files.notices,
        };
        for entry in files.items {
            let targets: Vec<_> = walker.all_targets(&entry.file).collect().await;
            if targets.is_empty() {
                scan.notices.push(Notice::NoTargetsFound {
                    path: entry.file.path().to_path_buf(),
                });
            }
            scan.items.push(FileTargets { entry, targets });
        }
        Ok(scan)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        normalize(&self.root.join(path))
    }

    fn label(&self, path: &Path) -> String {
        let directory = relative_to(parent_dir(path), &self.root);
        if directory.as_os_str().is_empty() || directory == Path::new(".") {
            ROOT_LABEL.to_owned()
        } else {
            directory.to_string_lossy().into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{FsDocumentLoader, GlobDiscovery};
    use crate::grammar::{JUST_RUNNER, MAKE_RUNNER};
    use crate::Error;
    use std::fs::{create_dir_all, write};
    use tempfile::TempDir;

    fn workspace(root: &Path, settings: Settings) -> Workspace {
        Workspace::new(
            root,
            Arc::new(settings),
            Grammars::builtin().expect("builtin grammars"),
            Arc::new(GlobDiscovery),
            Arc::new(FsDocumentLoader),
        )
    }

    fn project() -> TempDir {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let root = temp.path();
        create_dir_all(root.join("app")).expect("Failed to create dirs");
        create_dir_all(root.join("node_modules/dep")).expect("Failed to create dirs");
        write(root.join("Makefile"), "include app/rules.mk\nall:\n").expect("Failed to write");
        write(root.join("app/rules.mk"), "# app rules\napp:\n").expect("Failed to write");
        write(root.join("app/Makefile"), "serve:\n").expect("Failed to write");
        write(root.join("node_modules/dep/Makefile"), "dep:\n").expect("Failed to write");
        write(root.join("empty.mk"), "VAR := 1\n").expect("Failed to write");
        temp
    }

    #[tokio::test]
    async fn test_target_files_active_first_and_labels() {
        let temp = project();
        let workspace = workspace(temp.path(), Settings::default());
        let scan = workspace
            .target_files(MAKE_RUNNER, Some(Path::new("app/Makefile")))
            .await
            .expect("scan succeeds");

        let found: Vec<_> = scan
            .items
            .iter()
            .map(|entry| {
                (
                    entry.label.clone(),
                    relative_to(entry.file.path(), workspace.root()).to_path_buf(),
                )
            })
            .collect();
        assert_eq!(found.first(), Some(&("app".to_owned(), PathBuf::from("app/Makefile"))));
        assert!(found.contains(&(ROOT_LABEL.to_owned(), PathBuf::from("Makefile"))));
        assert!(found.contains(&("app".to_owned(), PathBuf::from("app/rules.mk"))));
        assert_eq!(found.len(), 4, "got {found:?}");
        assert!(scan.notices.is_empty());
    }

    #[tokio::test]
    async fn test_all_targets_with_notices() {
        let temp = project();
        let workspace = workspace(temp.path(), Settings::default());
        let scan = workspace
            .all_targets(MAKE_RUNNER, None)
            .await
            .expect("scan succeeds");

        let root_targets = scan
            .items
            .iter()
            .find(|group| group.entry.file.path() == workspace.root().join("Makefile"))
            .expect("root Makefile scanned");
        let names: Vec<_> = root_targets.targets.iter().map(TargetOccurrence::name).collect();
        assert_eq!(names, vec!["all", "app"]);
        assert!(root_targets.targets.get(1).is_some_and(TargetOccurrence::is_included));

        assert_eq!(
            scan.notices,
            vec![Notice::NoTargetsFound {
                path: workspace.root().join("empty.mk")
            }]
        );
    }

    #[tokio::test]
    async fn test_no_files_found_is_a_notice() {
        let temp = project();
        let workspace = workspace(temp.path(), Settings::default());
        let scan = workspace
            .target_files(JUST_RUNNER, None)
            .await
            .expect("scan succeeds");
        assert!(scan.items.is_empty());
        assert_eq!(
            scan.notices,
            vec![Notice::NoFilesFound {
                runner: JUST_RUNNER.to_owned()
            }]
        );
    }

    #[tokio::test]
    async fn test_misconfigured_runner_fails_alone() {
        let temp = project();
        let mut settings = Settings::default();
        if let Some(just) = settings.runners.get_mut(JUST_RUNNER) {
            just.file_patterns.clear();
        }
        let workspace = workspace(temp.path(), settings);
        assert!(matches!(
            workspace.target_files(JUST_RUNNER, None).await,
            Err(Error::Config(_))
        ));
        assert!(workspace.target_files(MAKE_RUNNER, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_open_detects_runner() {
        let temp = project();
        let workspace = workspace(temp.path(), Settings::default());
        let file = workspace
            .open(Path::new("app/rules.mk"))
            .await
            .expect("file opens")
            .expect("file is a target file");
        assert_eq!(file.grammar().runner(), MAKE_RUNNER);
        assert!(matches!(
            workspace.open(Path::new("missing.mk")).await,
            Err(Error::DocumentNotFound { .. })
        ));
    }
}
