//! Target resolution for Makefiles and justfiles.
//!
//! This crate finds the targets declared in build-description files, follows
//! `include` / `!include` directives (globs included) into a merged view of
//! reachable targets, maps every target back to its source location, and
//! renders the commands that run them.
//!
//! Resolution is pure over the text of documents; file discovery, document
//! loading, process execution, and state persistence sit behind the traits in
//! [`traits`].
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::too_many_lines,
        reason = "Allow for tests"
    )
)]

/// Configuration of runners, discovery, and inline runners.
pub mod config;
/// Text documents and offset to line mapping.
pub mod document;
/// Error types and result definitions.
pub mod error;
/// Filesystem-backed collaborators.
pub mod fs;
/// Grammars recognizing target headers and include directives.
pub mod grammar;
/// Command rendering and execution hand-off.
pub mod launch;
/// Lexical path helpers.
pub mod paths;
/// Command templates and actions.
pub mod render;
/// Persisted last executed target.
pub mod state;
/// Target occurrences.
pub mod target;
/// Documents viewed through a grammar.
pub mod target_file;
/// Collaborator interfaces.
pub mod traits;
/// Include resolution.
pub mod walker;
/// Project-wide scans.
pub mod workspace;

pub use config::{InlineRunnerSettings, RunnerSettings, Settings};
pub use document::{DocumentRef, LineInfo, SourceDocument, TextDocument};
pub use error::{Error, Notice, Result};
pub use fs::{FsDocumentLoader, GlobDiscovery};
pub use grammar::{Grammar, Grammars, TargetMatch};
pub use launch::{ExecutionOutcome, Launcher, RenderedCommand};
pub use render::{Action, Placeholder, render_command};
pub use state::LastExecutedTarget;
pub use target::{IncludeSite, IncludedTarget, InlinePlacement, Target, TargetOccurrence};
pub use target_file::{IncludeEdge, IncludedFile, InlineAnchor, TargetFile};
pub use traits::{CommandExecutor, DocumentLoader, FileDiscovery, StateStore};
pub use walker::{IncludeAnchor, IncludeWalker};
pub use workspace::{FileTargets, Scan, Workspace, WorkspaceFile};
