//! Text documents and byte-offset to line mapping.
//!
//! The resolution engine never touches the filesystem to read text; it works
//! on [`TextDocument`] values handed to it by a [`crate::DocumentLoader`] or
//! by an editor host.

use core::fmt::Debug;
use core::iter;
use core::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared handle to a document.
pub type DocumentRef = Arc<dyn TextDocument>;

/// End-of-line convention of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOfLine {
    /// `\n`
    Lf,
    /// `\r\n`
    CrLf,
}

impl EndOfLine {
    /// Detects the convention from the first line break in `text`.
    ///
    /// Text without any line break is treated as `Lf`.
    pub fn detect(text: &str) -> Self {
        match text.find('\n') {
            Some(index) if index > 0 && text.as_bytes()[index - 1] == b'\r' => Self::CrLf,
            _ => Self::Lf,
        }
    }

    /// The line terminator as a string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }
}

/// A single line of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInfo {
    /// Zero-based line number
    pub number: usize,
    /// Line content without its terminator
    pub text: String,
    /// Byte range of the content, terminator excluded
    pub range: Range<usize>,
}

/// Read access to a build-description document.
pub trait TextDocument: Debug + Send + Sync {
    /// Path the document was loaded from.
    fn path(&self) -> &Path;

    /// Full text of the document.
    fn text(&self) -> &str;

    /// Resolves a byte offset to the line containing it.
    ///
    /// Offsets past the end resolve to the last line.
    fn line_at(&self, offset: usize) -> LineInfo;

    /// Returns the line with the given zero-based number, if it exists.
    fn line(&self, number: usize) -> Option<LineInfo>;

    /// End-of-line convention of the document.
    fn end_of_line(&self) -> EndOfLine {
        EndOfLine::detect(self.text())
    }
}

/// Start offsets of every line in a text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    /// Builds the index for `text`.
    pub fn new(text: &str) -> Self {
        let starts = iter::once(0)
            .chain(text.match_indices('\n').map(|(index, _)| index + 1))
            .collect();
        Self {
            starts,
            len: text.len(),
        }
    }

    /// Number of lines. An empty text has one empty line.
    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Zero-based line number containing `offset`.
    pub fn line_number(&self, offset: usize) -> usize {
        let clamped = offset.min(self.len);
        match self.starts.binary_search(&clamped) {
            Ok(line) => line,
            Err(insert_at) => insert_at.saturating_sub(1),
        }
    }

    /// Content range of line `number`, terminator excluded.
    pub fn line_range(&self, text: &str, number: usize) -> Option<Range<usize>> {
        let start = *self.starts.get(number)?;
        let raw_end = self
            .starts
            .get(number + 1)
            .map_or(self.len, |next| next - 1);
        let end = if raw_end > start && text.as_bytes().get(raw_end - 1) == Some(&b'\r') {
            raw_end - 1
        } else {
            raw_end
        };
        Some(start..end)
    }

    /// Builds the [`LineInfo`] for line `number`.
    pub fn line_info(&self, text: &str, number: usize) -> Option<LineInfo> {
        let range = self.line_range(text, number)?;
        Some(LineInfo {
            number,
            text: text.get(range.clone())?.to_owned(),
            range,
        })
    }
}

/// In-memory document with a precomputed line index.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    path: PathBuf,
    text: String,
    lines: LineIndex,
}

impl SourceDocument {
    /// Creates a document from its path and full text.
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let text = text.into();
        let lines = LineIndex::new(&text);
        Self {
            path: path.into(),
            text,
            lines,
        }
    }

    /// Wraps the document in a shared [`DocumentRef`].
    pub fn shared(self) -> DocumentRef {
        Arc::new(self)
    }
}

impl TextDocument for SourceDocument {
    fn path(&self) -> &Path {
        &self.path
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn line_at(&self, offset: usize) -> LineInfo {
        let number = self.lines.line_number(offset);
        self.lines
            .line_info(&self.text, number)
            .unwrap_or_else(|| LineInfo {
                number,
                text: String::new(),
                range: self.text.len()..self.text.len(),
            })
    }

    fn line(&self, number: usize) -> Option<LineInfo> {
        self.lines.line_info(&self.text, number)
    }
}
