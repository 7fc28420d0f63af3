//! A build-description document viewed through its grammar.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::BoxStream;

use crate::Result;
use crate::config::Settings;
use crate::document::{DocumentRef, LineInfo};
use crate::grammar::{Grammar, Grammars};
use crate::paths::parent_dir;
use crate::target::{IncludeSite, IncludedTarget, InlinePlacement, Target};
use crate::walker::IncludeWalker;

/// One include directive line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeEdge {
    /// Byte offset of the directive line
    pub offset: usize,
    /// Argument after the directive, possibly a glob
    pub argument: String,
}

/// Line on which an inline runner is shown, with the target it runs.
#[derive(Debug, Clone)]
pub struct InlineAnchor {
    /// Anchor line
    pub line: LineInfo,
    /// Target run from the anchor
    pub target: Target,
}

/// Pure view over one document and the grammar it is written in.
///
/// Nothing is cached: every query reflects the document's current text.
#[derive(Debug, Clone)]
pub struct TargetFile {
    document: DocumentRef,
    grammar: Arc<Grammar>,
}

impl TargetFile {
    /// Views `document` through `grammar`.
    pub fn new(document: DocumentRef, grammar: Arc<Grammar>) -> Self {
        Self { document, grammar }
    }

    /// Views `document` with the grammar of the runner whose file patterns
    /// match its file name, or `None` if it is not a target file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownRunner`] if the configured runner has no
    /// grammar.
    pub fn detect(
        document: DocumentRef,
        settings: &Settings,
        grammars: &Grammars,
    ) -> Result<Option<Self>> {
        let Some(file_name) = document.path().file_name() else {
            return Ok(None);
        };
        let Some(runner) = settings.runner_for_file_name(&file_name.to_string_lossy()) else {
            return Ok(None);
        };
        let grammar = grammars.get(runner)?;
        Ok(Some(Self::new(document, grammar)))
    }

    /// Underlying document.
    pub fn document(&self) -> &DocumentRef {
        &self.document
    }

    /// Grammar used for matching.
    pub fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    /// Path of the document.
    pub fn path(&self) -> &Path {
        self.document.path()
    }

    /// Directory of the document; include arguments resolve against it.
    pub fn directory_path(&self) -> &Path {
        parent_dir(self.document.path())
    }

    /// Targets declared in this document, in document order.
    pub fn direct_targets(&self) -> impl Iterator<Item = Target> + '_ {
        self.grammar.matches(self.document.text()).map(|matched| {
            Target::new(
                Arc::clone(&self.document),
                Arc::clone(&self.grammar),
                matched,
            )
        })
    }

    /// Include directive lines, in document order.
    pub fn include_edges(&self) -> Vec<IncludeEdge> {
        self.grammar
            .include_arguments(self.document.text())
            .map(|(offset, argument)| IncludeEdge {
                offset,
                argument: argument.to_owned(),
            })
            .collect()
    }

    /// Direct target whose header line is `line` (0-based).
    ///
    /// When several targets share the line or a name, the first declared wins.
    pub fn target_at_line(&self, line: usize) -> Option<Target> {
        self.direct_targets()
            .find(|target| target.header_line().number == line)
    }

    /// First direct target called `name`.
    pub fn target_named(&self, name: &str) -> Option<Target> {
        self.direct_targets().find(|target| target.name() == name)
    }

    /// Inline runner anchors for every direct target.
    pub fn inline_anchors(&self, placement: InlinePlacement) -> Vec<InlineAnchor> {
        self.direct_targets()
            .map(|target| InlineAnchor {
                line: target.anchor_line(placement),
                target,
            })
            .collect()
    }

    /// Files reached through this document's include directives.
    ///
    /// See [`IncludeWalker::included_files`].
    pub fn included_files(
        &self,
        walker: &IncludeWalker,
        recursive: bool,
    ) -> BoxStream<'static, IncludedFile> {
        walker.included_files(self, recursive)
    }

    /// Like [`Self::included_files`], continuing a traversal that has already
    /// entered the paths in `visited`.
    pub fn included_files_with_visited(
        &self,
        walker: &IncludeWalker,
        recursive: bool,
        visited: HashSet<PathBuf>,
    ) -> BoxStream<'static, IncludedFile> {
        walker.included_files_with_visited(self, recursive, visited)
    }
}

/// A file reached through an include directive.
#[derive(Debug, Clone)]
pub struct IncludedFile {
    /// The included file, read with the including file's grammar
    pub file: TargetFile,
    /// Directive in the nearest including file
    pub site: IncludeSite,
    /// Number of include edges between the root and this file
    pub depth: usize,
}

impl IncludedFile {
    /// Direct targets of the included file, re-anchored to `root`.
    pub fn targets(&self, root: &DocumentRef) -> Vec<IncludedTarget> {
        self.file
            .direct_targets()
            .map(|target| IncludedTarget::new(target, Arc::clone(root), self.site.clone()))
            .collect()
    }
}
