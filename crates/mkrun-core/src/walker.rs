//! Include resolution.
//!
//! The walk is depth-first and pre-order: an included file is yielded before
//! the files it includes in turn. It is driven by the consumer; dropping the
//! stream abandons the remaining work. Each top-level call owns its visited
//! set, seeded with the root document, so a document is entered at most once
//! per traversal and include cycles terminate.

use core::fmt;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt as _};

use crate::document::{DocumentRef, LineInfo};
use crate::paths::normalize;
use crate::target::{IncludeSite, IncludedTarget, TargetOccurrence};
use crate::target_file::{IncludeEdge, IncludedFile, TargetFile};
use crate::traits::{DocumentLoader, FileDiscovery};

/// An include directive of a root file with the number of targets reachable
/// through it.
#[derive(Debug, Clone)]
pub struct IncludeAnchor {
    /// Directive line
    pub line: LineInfo,
    /// Argument after the directive
    pub argument: String,
    /// Targets reachable through this directive, transitively
    pub target_count: usize,
}

/// Resolves include directives through discovery and loading collaborators.
#[derive(Clone)]
pub struct IncludeWalker {
    discovery: Arc<dyn FileDiscovery>,
    loader: Arc<dyn DocumentLoader>,
    excludes: Vec<String>,
}

impl IncludeWalker {
    /// Creates a walker that expands include arguments with `discovery` and
    /// opens the results with `loader`.
    pub fn new(discovery: Arc<dyn FileDiscovery>, loader: Arc<dyn DocumentLoader>) -> Self {
        Self {
            discovery,
            loader,
            excludes: Vec::new(),
        }
    }

    /// Skips included paths matching any of `excludes`.
    #[must_use]
    pub fn with_excludes(mut self, excludes: Vec<String>) -> Self {
        self.excludes = excludes;
        self
    }

    /// Files reached through `root`'s include directives.
    ///
    /// With `recursive` unset only the immediate includes are yielded.
    pub fn included_files(
        &self,
        root: &TargetFile,
        recursive: bool,
    ) -> BoxStream<'static, IncludedFile> {
        self.included_files_with_visited(root, recursive, HashSet::new())
    }

    /// Like [`Self::included_files`], treating the paths in `visited` as
    /// already entered.
    pub fn included_files_with_visited(
        &self,
        root: &TargetFile,
        recursive: bool,
        visited: HashSet<PathBuf>,
    ) -> BoxStream<'static, IncludedFile> {
        let edges = root.include_edges().into();
        WalkState::new(self.clone(), root.clone(), edges, recursive, visited).into_stream()
    }

    /// Targets declared in files reached through `root`'s includes, each
    /// anchored to its nearest include directive and executed from `root`.
    pub fn included_targets(&self, root: &TargetFile) -> BoxStream<'static, IncludedTarget> {
        let root_document = Arc::clone(root.document());
        self.included_files(root, true)
            .flat_map(move |included| stream::iter(included.targets(&root_document)))
            .boxed()
    }

    /// Direct targets of `root`, then every target reachable through its
    /// includes, in discovery order.
    pub fn all_targets(&self, root: &TargetFile) -> BoxStream<'static, TargetOccurrence> {
        let direct: Vec<_> = root.direct_targets().map(TargetOccurrence::from).collect();
        stream::iter(direct)
            .chain(self.included_targets(root).map(TargetOccurrence::from))
            .boxed()
    }

    /// Targets reachable through the include directives on `line` (0-based)
    /// of `root`.
    ///
    /// Only directives of `root` itself are considered; each one is followed
    /// transitively.
    pub async fn included_targets_at_line(
        &self,
        root: &TargetFile,
        line: usize,
    ) -> Vec<IncludedTarget> {
        let edges = root
            .include_edges()
            .into_iter()
            .filter(|edge| root.document().line_at(edge.offset).number == line)
            .collect();
        self.targets_through(root, edges).await
    }

    /// Include directives of `root`, each with the number of targets
    /// reachable through it.
    pub async fn include_anchors(&self, root: &TargetFile) -> Vec<IncludeAnchor> {
        let mut anchors = Vec::new();
        for edge in root.include_edges() {
            let line = root.document().line_at(edge.offset);
            let argument = edge.argument.clone();
            let target_count = self.targets_through(root, VecDeque::from([edge])).await.len();
            anchors.push(IncludeAnchor {
                line,
                argument,
                target_count,
            });
        }
        anchors
    }

    async fn targets_through(
        &self,
        root: &TargetFile,
        edges: VecDeque<IncludeEdge>,
    ) -> Vec<IncludedTarget> {
        let root_document = Arc::clone(root.document());
        WalkState::new(self.clone(), root.clone(), edges, true, HashSet::new())
            .into_stream()
            .flat_map(move |included| stream::iter(included.targets(&root_document)))
            .collect()
            .await
    }
}

impl fmt::Debug for IncludeWalker {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("IncludeWalker")
            .field("excludes", &self.excludes)
            .finish_non_exhaustive()
    }
}

/// A file whose include directives are being expanded.
struct Frame {
    file: TargetFile,
    depth: usize,
    edges: VecDeque<IncludeEdge>,
    pending: VecDeque<PathBuf>,
    edge_offset: usize,
}

impl Frame {
    fn new(file: TargetFile, depth: usize, edges: VecDeque<IncludeEdge>) -> Self {
        Self {
            file,
            depth,
            edges,
            pending: VecDeque::new(),
            edge_offset: 0,
        }
    }
}

/// Explicit stack of the depth-first walk.
struct WalkState {
    walker: IncludeWalker,
    recursive: bool,
    visited: HashSet<PathBuf>,
    stack: Vec<Frame>,
}

impl WalkState {
    fn new(
        walker: IncludeWalker,
        root: TargetFile,
        edges: VecDeque<IncludeEdge>,
        recursive: bool,
        mut visited: HashSet<PathBuf>,
    ) -> Self {
        visited.insert(normalize(root.path()));
        Self {
            walker,
            recursive,
            visited,
            stack: vec![Frame::new(root, 0, edges)],
        }
    }

    fn into_stream(self) -> BoxStream<'static, IncludedFile> {
        stream::unfold(self, |mut state| async move {
            let included = state.next_file().await?;
            Some((included, state))
        })
        .boxed()
    }

    async fn next_file(&mut self) -> Option<IncludedFile> {
        loop {
            let frame = self.stack.last_mut()?;

            if let Some(path) = frame.pending.pop_front() {
                let site = IncludeSite {
                    document: Arc::clone(frame.file.document()),
                    offset: frame.edge_offset,
                };
                let depth = frame.depth + 1;
                let grammar = Arc::clone(frame.file.grammar());

                if !self.visited.insert(normalize(&path)) {
                    tracing::trace!(
                        "include of {} from {} already visited, skipping",
                        path.display(),
                        site.document.path().display()
                    );
                    continue;
                }

                let document: DocumentRef = match self.walker.loader.open_document(&path).await {
                    Ok(document) => document,
                    Err(err) if err.is_recoverable() => {
                        tracing::warn!("skipping include {}: {err}", path.display());
                        continue;
                    }
                    Err(err) => {
                        tracing::error!("failed to load include {}: {err}", path.display());
                        continue;
                    }
                };
                let file = TargetFile::new(document, grammar);
                if self.recursive {
                    let edges = file.include_edges().into();
                    self.stack.push(Frame::new(file.clone(), depth, edges));
                }
                return Some(IncludedFile { file, site, depth });
            }

            if let Some(edge) = frame.edges.pop_front() {
                frame.edge_offset = edge.offset;
                let base_dir = frame.file.directory_path().to_path_buf();
                match self
                    .walker
                    .discovery
                    .find_files(&base_dir, &[edge.argument.clone()], &self.walker.excludes)
                    .await
                {
                    Ok(paths) => {
                        tracing::debug!(
                            "include '{}' in {} matched {} file(s)",
                            edge.argument,
                            frame.file.path().display(),
                            paths.len()
                        );
                        frame.pending = paths.into();
                    }
                    Err(err) if err.is_recoverable() => {
                        tracing::warn!(
                            "skipping include '{}' in {}: {err}",
                            edge.argument,
                            frame.file.path().display()
                        );
                    }
                    Err(err) => {
                        tracing::error!(
                            "failed to expand include '{}' in {}: {err}",
                            edge.argument,
                            frame.file.path().display()
                        );
                    }
                }
                continue;
            }

            self.stack.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SourceDocument;
    use crate::grammar::Grammar;
    use crate::{Error, Result};
    use async_trait::async_trait;
    use glob::Pattern;
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::Mutex;

    /// In-memory file tree serving both discovery and loading.
    #[derive(Default)]
    struct MemoryTree {
        files: BTreeMap<PathBuf, String>,
        opened: Mutex<Vec<PathBuf>>,
    }

    impl MemoryTree {
        fn with(files: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                files: files
                    .iter()
                    .map(|(path, text)| (PathBuf::from(path), (*text).to_owned()))
                    .collect(),
                opened: Mutex::new(Vec::new()),
            })
        }

        fn open_count(&self) -> usize {
            self.opened.lock().map(|opened| opened.len()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl FileDiscovery for MemoryTree {
        async fn find_files(
            &self,
            base_dir: &Path,
            patterns: &[String],
            _excludes: &[String],
        ) -> Result<Vec<PathBuf>> {
            let mut found = Vec::new();
            for pattern in patterns {
                let full = normalize(&base_dir.join(pattern));
                let compiled = Pattern::new(&full.to_string_lossy())
                    .map_err(|err| Error::Discovery(err.to_string()))?;
                found.extend(
                    self.files
                        .keys()
                        .filter(|path| compiled.matches_path(path))
                        .cloned(),
                );
            }
            Ok(found)
        }
    }

    #[async_trait]
    impl DocumentLoader for MemoryTree {
        async fn open_document(&self, path: &Path) -> Result<DocumentRef> {
            if let Ok(mut opened) = self.opened.lock() {
                opened.push(path.to_path_buf());
            }
            let text = self.files.get(path).ok_or_else(|| Error::DocumentNotFound {
                path: path.to_path_buf(),
                reason: "missing".to_owned(),
            })?;
            Ok(SourceDocument::new(path, text.clone()).shared())
        }
    }

    fn walker(tree: &Arc<MemoryTree>) -> IncludeWalker {
        let discovery: Arc<dyn FileDiscovery> = Arc::<MemoryTree>::clone(tree);
        let loader: Arc<dyn DocumentLoader> = Arc::<MemoryTree>::clone(tree);
        IncludeWalker::new(discovery, loader)
    }

    fn root_file(tree: &MemoryTree, path: &str) -> TargetFile {
        let text = tree.files.get(Path::new(path)).cloned().unwrap_or_default();
        let grammar = Arc::new(Grammar::make().expect("make grammar compiles"));
        TargetFile::new(SourceDocument::new(path, text).shared(), grammar)
    }

    async fn names(walker: &IncludeWalker, root: &TargetFile) -> Vec<String> {
        walker
            .all_targets(root)
            .map(|target| target.name().to_owned())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_cycle_terminates_once_each() {
        let tree = MemoryTree::with(&[
            ("/w/a.mk", "include b.mk\na1:\na2:\n"),
            ("/w/b.mk", "include a.mk\nb1:\n"),
        ]);
        let root = root_file(&tree, "/w/a.mk");
        assert_eq!(names(&walker(&tree), &root).await, vec!["a1", "a2", "b1"]);
    }

    #[tokio::test]
    async fn test_pre_order_depth_first() {
        let tree = MemoryTree::with(&[
            ("/w/Makefile", "include one.mk\ninclude two.mk\nroot:\n"),
            ("/w/one.mk", "include deep/three.mk\none:\n"),
            ("/w/deep/three.mk", "three:\n"),
            ("/w/two.mk", "two:\n"),
        ]);
        let root = root_file(&tree, "/w/Makefile");
        let files: Vec<_> = walker(&tree)
            .included_files(&root, true)
            .map(|included| (included.file.path().to_path_buf(), included.depth))
            .collect()
            .await;
        assert_eq!(
            files,
            vec![
                (PathBuf::from("/w/one.mk"), 1),
                (PathBuf::from("/w/deep/three.mk"), 2),
                (PathBuf::from("/w/two.mk"), 1),
            ]
        );
        assert_eq!(
            names(&walker(&tree), &root).await,
            vec!["root", "one", "three", "two"]
        );
    }

    #[tokio::test]
    async fn test_non_recursive_yields_immediate_includes() {
        let tree = MemoryTree::with(&[
            ("/w/Makefile", "include one.mk\n"),
            ("/w/one.mk", "include two.mk\none:\n"),
            ("/w/two.mk", "two:\n"),
        ]);
        let root = root_file(&tree, "/w/Makefile");
        let files: Vec<_> = walker(&tree)
            .included_files(&root, false)
            .map(|included| included.file.path().to_path_buf())
            .collect()
            .await;
        assert_eq!(files, vec![PathBuf::from("/w/one.mk")]);
    }

    #[tokio::test]
    async fn test_nearest_include_site() {
        let tree = MemoryTree::with(&[
            ("/w/Makefile", "all:\ninclude lib/lib.mk\n"),
            ("/w/lib/lib.mk", "\ninclude extra.mk\nlib:\n"),
            ("/w/lib/extra.mk", "extra:\n"),
        ]);
        let root = root_file(&tree, "/w/Makefile");
        let targets: Vec<_> = walker(&tree).included_targets(&root).collect().await;
        let extra = targets
            .iter()
            .find(|target| target.original().name() == "extra")
            .expect("extra is reachable");
        assert_eq!(extra.site().document.path(), Path::new("/w/lib/lib.mk"));
        assert_eq!(extra.site().line().number, 1);
        assert_eq!(extra.file_path(), Path::new("/w/Makefile"));
        assert_eq!(extra.original().file_path(), Path::new("/w/lib/extra.mk"));
    }

    #[tokio::test]
    async fn test_glob_include_and_zero_matches() {
        let tree = MemoryTree::with(&[
            ("/w/Makefile", "include sub/*.mk\ninclude none/*.mk\n"),
            ("/w/sub/a.mk", "a:\n"),
            ("/w/sub/b.mk", "b:\n"),
        ]);
        let root = root_file(&tree, "/w/Makefile");
        let targets: Vec<_> = walker(&tree).included_targets(&root).collect().await;
        let declared: Vec<_> = targets
            .iter()
            .map(|target| target.original().file_path().to_path_buf())
            .collect();
        assert_eq!(declared, vec![PathBuf::from("/w/sub/a.mk"), PathBuf::from("/w/sub/b.mk")]);
        assert!(targets.iter().all(|target| target.site().offset == 0));
    }

    #[tokio::test]
    async fn test_failed_include_edges_are_skipped() {
        let tree = MemoryTree::with(&[
            ("/w/Makefile", "include [bad\ninclude a.mk\nroot:\n"),
            ("/w/a.mk", "a:\n"),
        ]);
        let root = root_file(&tree, "/w/Makefile");
        assert_eq!(names(&walker(&tree), &root).await, vec!["root", "a"]);
    }

    #[tokio::test]
    async fn test_diamond_enters_shared_file_once() {
        let tree = MemoryTree::with(&[
            ("/w/Makefile", "include left.mk\ninclude right.mk\n"),
            ("/w/left.mk", "include common.mk\nleft:\n"),
            ("/w/right.mk", "include common.mk\nright:\n"),
            ("/w/common.mk", "common:\n"),
        ]);
        let root = root_file(&tree, "/w/Makefile");
        let all = names(&walker(&tree), &root).await;
        assert_eq!(all, vec!["left", "common", "right"]);
        assert_eq!(tree.open_count(), 3);
    }

    #[tokio::test]
    async fn test_dropping_the_stream_stops_the_walk() {
        let tree = MemoryTree::with(&[
            ("/w/Makefile", "include one.mk\ninclude two.mk\n"),
            ("/w/one.mk", "one:\n"),
            ("/w/two.mk", "two:\n"),
        ]);
        let root = root_file(&tree, "/w/Makefile");
        let first = walker(&tree).included_files(&root, true).next().await;
        assert!(first.is_some());
        assert_eq!(tree.open_count(), 1);
    }

    #[tokio::test]
    async fn test_included_targets_at_line() {
        let tree = MemoryTree::with(&[
            ("/w/Makefile", "include one.mk\ninclude sub/*.mk\n"),
            ("/w/one.mk", "one:\n"),
            ("/w/sub/a.mk", "include ../deep.mk\na:\n"),
            ("/w/sub/b.mk", "b:\n"),
            ("/w/deep.mk", "deep:\n"),
        ]);
        let root = root_file(&tree, "/w/Makefile");
        let walker = walker(&tree);

        let at_second: Vec<_> = walker
            .included_targets_at_line(&root, 1)
            .await
            .iter()
            .map(|target| target.original().name().to_owned())
            .collect();
        assert_eq!(at_second, vec!["a", "deep", "b"]);

        let at_first = walker.included_targets_at_line(&root, 0).await;
        assert_eq!(at_first.len(), 1);
        assert!(walker.included_targets_at_line(&root, 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_include_anchors_count_targets() {
        let tree = MemoryTree::with(&[
            ("/w/Makefile", "include one.mk\nall:\ninclude sub/*.mk\n"),
            ("/w/one.mk", "one:\nuno:\n"),
            ("/w/sub/a.mk", "a:\n"),
        ]);
        let root = root_file(&tree, "/w/Makefile");
        let anchors: Vec<_> = walker(&tree)
            .include_anchors(&root)
            .await
            .into_iter()
            .map(|anchor| (anchor.line.number, anchor.argument, anchor.target_count))
            .collect();
        assert_eq!(
            anchors,
            vec![(0, "one.mk".to_owned(), 2), (2, "sub/*.mk".to_owned(), 1)]
        );
    }
}
