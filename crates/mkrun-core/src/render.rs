//! Command template rendering.
//!
//! Templates reference target attributes as `<placeholder>`. The set of
//! placeholders is closed: see [`Placeholder`]. Values are inserted verbatim,
//! without shell quoting.

use core::fmt;
use core::str::FromStr;
use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::config::RunnerSettings;
use crate::target::TargetOccurrence;
use crate::{Error, Result};

static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| match Regex::new(r"<([A-Za-z]+)>") {
        Ok(regex) => regex,
        Err(err) => panic!("Placeholder regex is invalid: {err}"),
    });

/// Target attribute that can appear in a command template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// `<name>`
    Name,
    /// `<comment>`
    Comment,
    /// `<runner>`
    Runner,
    /// `<filePath>`, also accepted as `<fsPath>`
    FilePath,
    /// `<directoryPath>`, also accepted as `<dir>`
    DirectoryPath,
}

impl Placeholder {
    /// Every placeholder in canonical order.
    pub const ALL: [Self; 5] = [
        Self::Name,
        Self::Comment,
        Self::Runner,
        Self::FilePath,
        Self::DirectoryPath,
    ];

    /// Parses the text between the angle brackets.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "name" => Some(Self::Name),
            "comment" => Some(Self::Comment),
            "runner" => Some(Self::Runner),
            "filePath" | "fsPath" => Some(Self::FilePath),
            "directoryPath" | "dir" => Some(Self::DirectoryPath),
            _ => None,
        }
    }

    /// Canonical name, as written in templates.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Comment => "comment",
            Self::Runner => "runner",
            Self::FilePath => "filePath",
            Self::DirectoryPath => "directoryPath",
        }
    }

    /// Value of this attribute for `target`.
    ///
    /// Paths come from the executable identity, so an included target yields
    /// the root document's path.
    pub fn value<'target>(self, target: &'target TargetOccurrence) -> Cow<'target, str> {
        match self {
            Self::Name => Cow::Borrowed(target.name()),
            Self::Comment => Cow::Borrowed(target.comment()),
            Self::Runner => Cow::Borrowed(target.runner()),
            Self::FilePath => target.file_path().to_string_lossy(),
            Self::DirectoryPath => target.directory_path().to_string_lossy(),
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "<{}>", self.as_str())
    }
}

/// Replaces every known placeholder in `template` with the value from `target`.
///
/// Unknown placeholders are left as they are.
pub fn render_command(template: &str, target: &TargetOccurrence) -> String {
    PLACEHOLDER_REGEX
        .replace_all(template, |captures: &Captures<'_>| {
            let known = captures
                .get(1)
                .and_then(|name| Placeholder::from_name(name.as_str()));
            match (known, captures.get(0)) {
                (Some(placeholder), _) => placeholder.value(target).into_owned(),
                (None, Some(whole)) => whole.as_str().to_owned(),
                (None, None) => String::new(),
            }
        })
        .into_owned()
}

/// What to do with a target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// Run the target and remember it
    #[default]
    Run,
    /// Show what running the target would do
    DryRun,
}

impl Action {
    /// Template of this action in `settings`, `None` for a dry run without a
    /// dry-run template.
    pub fn template(self, settings: &RunnerSettings) -> Option<&str> {
        match self {
            Self::Run => Some(settings.run_command.as_str()),
            Self::DryRun => settings
                .dry_run_command
                .as_deref()
                .filter(|command| !command.trim().is_empty()),
        }
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "run" => Ok(Self::Run),
            "dry-run" | "dryRun" | "dry_run" => Ok(Self::DryRun),
            other => Err(Error::UnknownAction(other.to_owned())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run => write!(formatter, "run"),
            Self::DryRun => write!(formatter, "dry-run"),
        }
    }
}
