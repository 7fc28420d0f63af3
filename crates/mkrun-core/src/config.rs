//! Configuration for runners, discovery, and inline runners.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::grammar::{JUST_RUNNER, MAKE_RUNNER};
use crate::target::InlinePlacement;
use crate::{Error, Result};

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Per-runner settings keyed by runner identifier
    pub runners: BTreeMap<String, RunnerSettings>,
    /// Glob patterns of folders skipped by workspace scans
    pub excluded_folders: Vec<String>,
    /// Inline runner settings
    pub inline_runner: InlineRunnerSettings,
}

/// Settings of one runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerSettings {
    /// File-name glob patterns identifying target files
    pub file_patterns: Vec<String>,
    /// Command template used to run a target
    pub run_command: String,
    /// Command template used for a dry run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run_command: Option<String>,
}

/// Inline runner settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InlineRunnerSettings {
    /// Whether inline runners are shown
    pub enabled: bool,
    /// Line the inline runner is anchored to
    pub placement: InlinePlacement,
}

impl Default for InlineRunnerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            placement: InlinePlacement::Target,
        }
    }
}

impl RunnerSettings {
    /// Defaults for make.
    pub fn make() -> Self {
        Self {
            file_patterns: ["Makefile", "makefile", "GNUmakefile", "*.mk"]
                .map(str::to_owned)
                .to_vec(),
            run_command: "make -f <filePath> <name>".to_owned(),
            dry_run_command: Some("make --dry-run -f <filePath> <name>".to_owned()),
        }
    }

    /// Defaults for just.
    pub fn just() -> Self {
        Self {
            file_patterns: ["justfile", "Justfile", ".justfile", "*.just"]
                .map(str::to_owned)
                .to_vec(),
            run_command: "just --justfile <filePath> <name>".to_owned(),
            dry_run_command: Some("just --dry-run --justfile <filePath> <name>".to_owned()),
        }
    }

    /// Checks that the runner can be used.
    fn validate(&self, runner: &str) -> Result<()> {
        if self.file_patterns.iter().all(|pattern| pattern.trim().is_empty()) {
            return Err(Error::Config(format!(
                "no file patterns configured for runner '{runner}'"
            )));
        }
        if self.run_command.trim().is_empty() {
            return Err(Error::Config(format!(
                "no run command configured for runner '{runner}'"
            )));
        }
        Ok(())
    }

    /// Whether `file_name` matches one of the file patterns.
    pub fn matches_file_name(&self, file_name: &str) -> bool {
        self.file_patterns.iter().any(|pattern| {
            Pattern::new(pattern).is_ok_and(|compiled| compiled.matches(file_name))
        })
    }

    /// File patterns anchored anywhere below a base directory.
    pub fn workspace_patterns(&self) -> Vec<String> {
        self.file_patterns
            .iter()
            .filter(|pattern| !pattern.trim().is_empty())
            .map(|pattern| format!("**/{pattern}"))
            .collect()
    }
}

impl Default for Settings {
    fn default() -> Self {
        let runners = [
            (MAKE_RUNNER.to_owned(), RunnerSettings::make()),
            (JUST_RUNNER.to_owned(), RunnerSettings::just()),
        ]
        .into_iter()
        .collect();
        Self {
            runners,
            excluded_folders: vec!["**/node_modules/**".to_owned(), "**/.git/**".to_owned()],
            inline_runner: InlineRunnerSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let settings: Self = toml::from_str(&contents)?;
        tracing::debug!(
            "Loaded settings from {}: runners={:?}",
            path.display(),
            settings.runners.keys().collect::<Vec<_>>()
        );
        Ok(settings)
    }

    /// Load settings from `path` if it exists, defaults otherwise.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::debug!("No settings at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save settings to a TOML file, creating parent directories.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        let header = "# mkrun configuration\n\
                      # Command templates accept <name>, <comment>, <runner>, <filePath>, <directoryPath>\n\n";
        fs::write(path, format!("{header}{contents}"))?;
        Ok(())
    }

    /// Settings of `runner`, validated on access so that one broken runner
    /// does not disable the others.
    ///
    /// # Errors
    /// Returns [`Error::UnknownRunner`] if the runner is not configured, or
    /// [`Error::Config`] if its patterns or run command are empty.
    pub fn runner(&self, runner: &str) -> Result<&RunnerSettings> {
        let settings = self
            .runners
            .get(runner)
            .ok_or_else(|| Error::UnknownRunner(runner.to_owned()))?;
        settings.validate(runner)?;
        Ok(settings)
    }

    /// Runner whose file patterns match `file_name`, if any.
    ///
    /// Runners are tried in identifier order; invalid runners are skipped.
    pub fn runner_for_file_name(&self, file_name: &str) -> Option<&str> {
        self.runners
            .iter()
            .filter(|(runner, settings)| settings.validate(runner).is_ok())
            .find(|(_, settings)| settings.matches_file_name(file_name))
            .map(|(runner, _)| runner.as_str())
    }
}
