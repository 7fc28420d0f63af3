//! Error types and scan notices.

use core::fmt;
use core::result::Result as CoreResult;
use std::io::Error as IoError;
use std::path::PathBuf;

use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use toml::de::Error as TomlError;
use toml::ser::Error as TomlSerializeError;

/// Result type for core operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors that can occur while resolving or launching targets.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),

    /// TOML serialization failed.
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] TomlSerializeError),

    /// A required configuration value is missing or empty.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A grammar's header pattern is invalid or lacks a required named group.
    #[error("Invalid grammar for runner '{runner}': {reason}")]
    GrammarConstruction {
        /// Runner the grammar was built for
        runner: String,
        /// Why construction failed
        reason: String,
    },

    /// A document could not be opened.
    #[error("Document not found: {}: {reason}", .path.display())]
    DocumentNotFound {
        /// Path that was requested
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },

    /// File discovery failed, usually because of an invalid glob.
    #[error("File discovery failed: {0}")]
    Discovery(String),

    /// A runner identifier that no grammar or configuration knows about.
    #[error("Unknown runner: {0}")]
    UnknownRunner(String),

    /// An action name that is neither run nor dry run.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// No target with the requested name or position exists.
    #[error("Target not found: {0}")]
    TargetNotFound(String),

    /// The command could not be handed to a process.
    #[error("Execution failed: {0}")]
    Execution(String),
}

impl Error {
    /// Determines whether a traversal may skip the failing include edge and continue.
    ///
    /// Returns `true` for document and discovery failures, which only ever mean
    /// that fewer targets are found.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::DocumentNotFound { .. } | Self::Discovery(_)
        )
    }
}

/// Zero-result conditions of a scan.
///
/// These are informational and never abort an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// No target file matched the runner's file patterns.
    NoFilesFound {
        /// Runner that was scanned for
        runner: String,
    },
    /// A target file was scanned but declares no targets.
    NoTargetsFound {
        /// File that was scanned
        path: PathBuf,
    },
}

impl fmt::Display for Notice {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFilesFound { runner } => {
                write!(formatter, "No target files found for runner '{runner}'")
            }
            Self::NoTargetsFound { path } => {
                write!(formatter, "No targets found in {}", path.display())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value as JsonValue, from_str};
    use std::io;

    #[test]
    fn test_error_display() {
        let error1 = Error::Config("no file patterns for runner 'make'".to_owned());
        assert_eq!(
            error1.to_string(),
            "Configuration error: no file patterns for runner 'make'"
        );

        let error2 = Error::GrammarConstruction {
            runner: "make".to_owned(),
            reason: "missing group 'comment'".to_owned(),
        };
        assert_eq!(
            error2.to_string(),
            "Invalid grammar for runner 'make': missing group 'comment'"
        );

        let error3 = Error::DocumentNotFound {
            path: PathBuf::from("/tmp/lib.mk"),
            reason: "no such file".to_owned(),
        };
        assert_eq!(
            error3.to_string(),
            "Document not found: /tmp/lib.mk: no such file"
        );
    }

    #[test]
    fn test_error_is_recoverable() {
        let error1 = Error::DocumentNotFound {
            path: PathBuf::from("missing.mk"),
            reason: "gone".to_owned(),
        };
        assert!(error1.is_recoverable());
        assert!(Error::Discovery("bad glob".to_owned()).is_recoverable());

        assert!(!Error::Config("bad config".to_owned()).is_recoverable());
        assert!(!Error::UnknownRunner("ninja".to_owned()).is_recoverable());
        assert!(!Error::UnknownAction("explode".to_owned()).is_recoverable());
    }

    #[test]
    fn test_error_from_io() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: Error = io_error.into();
        assert!(matches!(error, Error::Io(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_error = from_str::<JsonValue>("invalid json").unwrap_err();
        let error: Error = json_error.into();
        assert!(matches!(error, Error::Json(_)));
    }

    #[test]
    fn test_notice_display() {
        let notice1 = Notice::NoFilesFound {
            runner: "just".to_owned(),
        };
        assert_eq!(notice1.to_string(), "No target files found for runner 'just'");

        let notice2 = Notice::NoTargetsFound {
            path: PathBuf::from("Makefile"),
        };
        assert_eq!(notice2.to_string(), "No targets found in Makefile");
    }
}
