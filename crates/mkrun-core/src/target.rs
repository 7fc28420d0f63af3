//! Resolved target occurrences.
//!
//! A [`Target`] is a header declared directly in a document. An
//! [`IncludedTarget`] is the same header reached through one or more include
//! directives; it keeps the declaring [`Target`] for location data but runs as
//! if invoked from the root document. [`TargetOccurrence`] unifies both.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::document::{DocumentRef, LineInfo};
use crate::grammar::{Grammar, TargetMatch};
use crate::paths::parent_dir;

/// Where the inline runner is anchored for a target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InlinePlacement {
    /// On the header line
    #[default]
    Target,
    /// On the leading comment line, falling back to the header line
    Comment,
}

/// A target declared directly in a document.
#[derive(Debug, Clone)]
pub struct Target {
    document: DocumentRef,
    grammar: Arc<Grammar>,
    matched: TargetMatch,
}

impl Target {
    /// Creates a target from a header match in `document`.
    pub fn new(document: DocumentRef, grammar: Arc<Grammar>, matched: TargetMatch) -> Self {
        Self {
            document,
            grammar,
            matched,
        }
    }

    /// Name of the target.
    pub fn name(&self) -> &str {
        &self.matched.name
    }

    /// Leading comment, empty when there is none.
    pub fn comment(&self) -> &str {
        &self.matched.comment
    }

    /// Raw match data.
    pub fn matched(&self) -> &TargetMatch {
        &self.matched
    }

    /// Byte offset of the match in the declaring document.
    pub fn offset(&self) -> usize {
        self.matched.offset
    }

    /// Declaring document.
    pub fn document(&self) -> &DocumentRef {
        &self.document
    }

    /// Grammar the target was matched with.
    pub fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    /// Runner identifier.
    pub fn runner(&self) -> &str {
        self.grammar.runner()
    }

    /// Path of the declaring document.
    pub fn file_path(&self) -> &Path {
        self.document.path()
    }

    /// Directory of the declaring document.
    pub fn directory_path(&self) -> &Path {
        parent_dir(self.document.path())
    }

    /// The header line, i.e. the line after the leading comment if there is one.
    pub fn header_line(&self) -> LineInfo {
        self.document.line_at(self.matched.header_offset)
    }

    /// The leading comment line, if the target has a comment.
    pub fn comment_line(&self) -> Option<LineInfo> {
        (self.matched.offset < self.matched.header_offset)
            .then(|| self.document.line_at(self.matched.offset))
    }

    /// Line on which an inline runner should be shown.
    pub fn anchor_line(&self, placement: InlinePlacement) -> LineInfo {
        match placement {
            InlinePlacement::Target => self.header_line(),
            InlinePlacement::Comment => self.comment_line().unwrap_or_else(|| self.header_line()),
        }
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.file_path() == other.file_path()
            && self.runner() == other.runner()
            && self.matched == other.matched
    }
}

impl Eq for Target {}

/// Position of an include directive.
#[derive(Debug, Clone)]
pub struct IncludeSite {
    /// Document containing the directive
    pub document: DocumentRef,
    /// Byte offset of the directive line
    pub offset: usize,
}

impl IncludeSite {
    /// Line of the include directive.
    pub fn line(&self) -> LineInfo {
        self.document.line_at(self.offset)
    }
}

impl PartialEq for IncludeSite {
    fn eq(&self, other: &Self) -> bool {
        self.document.path() == other.document.path() && self.offset == other.offset
    }
}

impl Eq for IncludeSite {}

/// A target reached through include directives, executed from the root document.
#[derive(Debug, Clone)]
pub struct IncludedTarget {
    original: Target,
    root: DocumentRef,
    site: IncludeSite,
}

impl IncludedTarget {
    /// Re-anchors `original` to `root`, reached through the directive at `site`.
    pub fn new(original: Target, root: DocumentRef, site: IncludeSite) -> Self {
        Self {
            original,
            root,
            site,
        }
    }

    /// The target as declared in the included document.
    pub fn original(&self) -> &Target {
        &self.original
    }

    /// Root document the traversal started from.
    pub fn root(&self) -> &DocumentRef {
        &self.root
    }

    /// The include directive nearest to the declaring document.
    pub fn site(&self) -> &IncludeSite {
        &self.site
    }

    /// Path used for execution: the root document, never the declaring one.
    pub fn file_path(&self) -> &Path {
        self.root.path()
    }

    /// Directory used for execution.
    pub fn directory_path(&self) -> &Path {
        parent_dir(self.root.path())
    }
}

impl PartialEq for IncludedTarget {
    fn eq(&self, other: &Self) -> bool {
        self.original == other.original
            && self.root.path() == other.root.path()
            && self.site == other.site
    }
}

impl Eq for IncludedTarget {}

/// A target as presented to callers: declared here, or reached through includes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOccurrence {
    /// Declared in the queried document
    Direct(Target),
    /// Reached through one or more include directives
    Included(IncludedTarget),
}

impl TargetOccurrence {
    /// The declaring target.
    pub fn declared(&self) -> &Target {
        match self {
            Self::Direct(target) => target,
            Self::Included(included) => included.original(),
        }
    }

    /// Name of the target.
    pub fn name(&self) -> &str {
        self.declared().name()
    }

    /// Leading comment, empty when there is none.
    pub fn comment(&self) -> &str {
        self.declared().comment()
    }

    /// Runner identifier.
    pub fn runner(&self) -> &str {
        self.declared().runner()
    }

    /// Grammar of the declaring document.
    pub fn grammar(&self) -> &Arc<Grammar> {
        self.declared().grammar()
    }

    /// Path used to execute the target.
    pub fn file_path(&self) -> &Path {
        match self {
            Self::Direct(target) => target.file_path(),
            Self::Included(included) => included.file_path(),
        }
    }

    /// Directory used to execute the target.
    pub fn directory_path(&self) -> &Path {
        match self {
            Self::Direct(target) => target.directory_path(),
            Self::Included(included) => included.directory_path(),
        }
    }

    /// Include directive the target was reached through, if any.
    pub fn include_site(&self) -> Option<&IncludeSite> {
        match self {
            Self::Direct(_) => None,
            Self::Included(included) => Some(included.site()),
        }
    }

    /// Whether the target was reached through an include.
    pub fn is_included(&self) -> bool {
        matches!(self, Self::Included(_))
    }
}

impl From<Target> for TargetOccurrence {
    fn from(target: Target) -> Self {
        Self::Direct(target)
    }
}

impl From<IncludedTarget> for TargetOccurrence {
    fn from(included: IncludedTarget) -> Self {
        Self::Included(included)
    }
}
