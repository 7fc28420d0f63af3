//! Per-syntax grammars for recognizing target headers and include directives.
//!
//! A [`Grammar`] is compiled once and shared. Every call to
//! [`Grammar::matches`] creates a fresh [`TargetMatches`] scanner with its own
//! cursor, so independent queries never observe each other's scan position.

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::{Captures, Regex, escape};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Name of the capture group holding the leading comment.
pub const COMMENT_GROUP: &str = "comment";
/// Name of the capture group holding the target name.
pub const TARGET_GROUP: &str = "target";

/// Runner identifier of the make-like grammar.
pub const MAKE_RUNNER: &str = "make";
/// Runner identifier of the just-like grammar.
pub const JUST_RUNNER: &str = "just";

const LEADING_COMMENT: &str = r"(?:#[ \t]*(?P<comment>[^\r\n]*?)[ \t]*\r?\n)?";
const TARGET_NAME: &str = r"(?P<target>[A-Za-z0-9_-]+)";

/// A target header found in a document's text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetMatch {
    /// Name of the target, never empty
    pub name: String,
    /// Leading comment without the `#` marker, empty when absent
    pub comment: String,
    /// Byte offset where the match starts (the comment line, if any)
    pub offset: usize,
    /// Byte offset of the header line itself
    pub header_offset: usize,
}

/// Immutable description of one build-file syntax.
#[derive(Debug, Clone)]
pub struct Grammar {
    runner: String,
    include_directive: String,
    header: Regex,
    include: Regex,
    supports_dry_run: bool,
}

impl Grammar {
    /// Compiles a grammar.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GrammarConstruction`] if `header_pattern` does not
    /// compile or does not expose both the `comment` and `target` groups.
    pub fn new(
        runner: &str,
        include_directive: &str,
        header_pattern: &str,
        supports_dry_run: bool,
    ) -> Result<Self> {
        let construction_error = |reason: String| Error::GrammarConstruction {
            runner: runner.to_owned(),
            reason,
        };

        let header = Regex::new(header_pattern)
            .map_err(|err| construction_error(format!("invalid header pattern: {err}")))?;
        for required in [COMMENT_GROUP, TARGET_GROUP] {
            if !header.capture_names().flatten().any(|name| name == required) {
                return Err(construction_error(format!(
                    "header pattern lacks the named group '{required}'"
                )));
            }
        }

        if include_directive.trim().is_empty() {
            return Err(construction_error("include directive is empty".to_owned()));
        }
        let include = Regex::new(&format!(
            r"(?m)^{}[ \t]+(?P<argument>[^\r\n]*)",
            escape(include_directive)
        ))
        .map_err(|err| construction_error(format!("invalid include directive: {err}")))?;

        Ok(Self {
            runner: runner.to_owned(),
            include_directive: include_directive.to_owned(),
            header,
            include,
            supports_dry_run,
        })
    }

    /// Grammar for Makefiles: `include` directives and `name:` headers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GrammarConstruction`] if the built-in pattern is rejected.
    pub fn make() -> Result<Self> {
        Self::new(
            MAKE_RUNNER,
            "include",
            &format!(r"(?m)^{LEADING_COMMENT}{TARGET_NAME}[ \t]*:"),
            true,
        )
    }

    /// Grammar for justfiles: `!include` directives and recipe headers,
    /// optionally quiet (`@name:`) or with parameters (`name arg='x':`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::GrammarConstruction`] if the built-in pattern is rejected.
    pub fn just() -> Result<Self> {
        Self::new(
            JUST_RUNNER,
            "!include",
            &format!(r"(?m)^{LEADING_COMMENT}@?{TARGET_NAME}(?:[ \t]+[^:\r\n]*)?:"),
            true,
        )
    }

    /// Identifier of the runner this grammar belongs to.
    pub fn runner(&self) -> &str {
        &self.runner
    }

    /// Keyword that starts an include line.
    pub fn include_directive(&self) -> &str {
        &self.include_directive
    }

    /// Whether the runner has a dry-run mode.
    pub fn supports_dry_run(&self) -> bool {
        self.supports_dry_run
    }

    /// Scans `text` for target headers in document order.
    pub fn matches<'grammar, 'text>(
        &'grammar self,
        text: &'text str,
    ) -> TargetMatches<'grammar, 'text> {
        TargetMatches {
            grammar: self,
            text,
            cursor: 0,
        }
    }

    /// Finds include lines in `text`, yielding `(offset, argument)` pairs.
    ///
    /// The argument is the trimmed rest of the line; empty arguments are skipped.
    pub fn include_arguments<'text>(
        &self,
        text: &'text str,
    ) -> impl Iterator<Item = (usize, &'text str)> {
        self.include.captures_iter(text).filter_map(|captures| {
            let whole = captures.get(0)?;
            let argument = captures.name("argument")?.as_str().trim();
            (!argument.is_empty()).then_some((whole.start(), argument))
        })
    }

    /// Turns one regex match into a [`TargetMatch`], or `None` when the match
    /// is not a real header.
    fn accept(&self, text: &str, captures: &Captures<'_>) -> Option<TargetMatch> {
        let whole = captures.get(0)?;
        let name = captures.name(TARGET_GROUP)?;

        // `name := value` and `name ::= value` are assignments, not headers.
        let rest = &text[whole.end()..];
        if rest.starts_with('=') || rest.starts_with(":=") {
            return None;
        }

        let header_offset = line_start(text, name.start());
        if continues_previous_line(text, header_offset) {
            return None;
        }

        let (offset, comment) = match captures.name(COMMENT_GROUP) {
            Some(comment) if !continues_previous_line(text, whole.start()) => {
                (whole.start(), comment.as_str().to_owned())
            }
            _ => (header_offset, String::new()),
        };

        Some(TargetMatch {
            name: name.as_str().to_owned(),
            comment,
            offset,
            header_offset,
        })
    }
}

/// Lazy scanner over the target headers of one text.
#[derive(Debug, Clone)]
pub struct TargetMatches<'grammar, 'text> {
    grammar: &'grammar Grammar,
    text: &'text str,
    cursor: usize,
}

impl Iterator for TargetMatches<'_, '_> {
    type Item = TargetMatch;

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor <= self.text.len() {
            let captures = self.grammar.header.captures_at(self.text, self.cursor)?;
            let whole = captures.get(0)?;
            self.cursor = whole.end().max(self.cursor + 1);
            if let Some(found) = self.grammar.accept(self.text, &captures) {
                return Some(found);
            }
        }
        None
    }
}

/// Offset of the first byte of the line containing `offset`.
fn line_start(text: &str, offset: usize) -> usize {
    text[..offset].rfind('\n').map_or(0, |index| index + 1)
}

/// Whether the line starting at `start` is a continuation of the line before
/// it, i.e. the previous line ends with a backslash.
fn continues_previous_line(text: &str, start: usize) -> bool {
    if start == 0 {
        return false;
    }
    let before = &text[..start];
    let previous = before.strip_suffix('\n').unwrap_or(before);
    previous
        .strip_suffix('\r')
        .unwrap_or(previous)
        .ends_with('\\')
}

/// Registry of the grammars known to the engine, keyed by runner.
#[derive(Debug, Clone)]
pub struct Grammars {
    by_runner: BTreeMap<String, Arc<Grammar>>,
}

impl Grammars {
    /// Registry holding the built-in make and just grammars.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GrammarConstruction`] if a built-in grammar is rejected.
    pub fn builtin() -> Result<Self> {
        Ok(Self::from_grammars([Grammar::make()?, Grammar::just()?]))
    }

    /// Registry holding exactly `grammars`; later entries replace earlier ones
    /// with the same runner.
    pub fn from_grammars(grammars: impl IntoIterator<Item = Grammar>) -> Self {
        let by_runner = grammars
            .into_iter()
            .map(|grammar| (grammar.runner().to_owned(), Arc::new(grammar)))
            .collect();
        Self { by_runner }
    }

    /// Looks up the grammar of `runner`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRunner`] if no grammar is registered for it.
    pub fn get(&self, runner: &str) -> Result<Arc<Grammar>> {
        self.by_runner
            .get(runner)
            .map(Arc::clone)
            .ok_or_else(|| Error::UnknownRunner(runner.to_owned()))
    }

    /// Registered grammars in runner order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Grammar>> {
        self.by_runner.values()
    }
}
