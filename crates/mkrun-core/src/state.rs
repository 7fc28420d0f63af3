//! Persisted "last executed target".
//!
//! The snapshot keeps the target's identity rather than only its rendered
//! command, so a rerun re-reads the declaring document and renders with the
//! configuration current at that time. The rendered command is kept alongside
//! for display.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::document::DocumentRef;
use crate::grammar::Grammars;
use crate::paths::normalize;
use crate::target::{IncludeSite, IncludedTarget, Target, TargetOccurrence};
use crate::target_file::TargetFile;
use crate::traits::DocumentLoader;
use crate::{Error, Result};

/// Where an included target was reached from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeOrigin {
    /// Root document the target is executed from
    pub root: PathBuf,
    /// Document holding the nearest include directive
    pub site_path: PathBuf,
    /// Byte offset of that directive
    pub site_offset: usize,
}

/// Snapshot of the last target that was run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastExecutedTarget {
    /// Runner identifier
    pub runner: String,
    /// Target name
    pub name: String,
    /// Document declaring the target
    pub declared_in: PathBuf,
    /// Byte offset of the match in the declaring document
    pub offset: usize,
    /// Set when the target was reached through includes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub included_from: Option<IncludeOrigin>,
    /// Command as rendered when the target was run
    pub command: String,
}

impl LastExecutedTarget {
    /// Snapshots `target`, rendered as `command`.
    pub fn new(target: &TargetOccurrence, command: &str) -> Self {
        let declared = target.declared();
        let included_from = match target {
            TargetOccurrence::Direct(_) => None,
            TargetOccurrence::Included(included) => Some(IncludeOrigin {
                root: included.root().path().to_path_buf(),
                site_path: included.site().document.path().to_path_buf(),
                site_offset: included.site().offset,
            }),
        };
        Self {
            runner: declared.runner().to_owned(),
            name: declared.name().to_owned(),
            declared_in: declared.file_path().to_path_buf(),
            offset: declared.offset(),
            included_from,
            command: command.to_owned(),
        }
    }

    /// Rebuilds the target from the current contents of its documents.
    ///
    /// The target is looked up at its recorded offset first; if the document
    /// changed since, the first target with the recorded name is used.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRunner`] if the runner has no grammar,
    /// [`Error::DocumentNotFound`] if a document is gone, or
    /// [`Error::TargetNotFound`] if no target with the name remains.
    pub async fn restore(
        &self,
        loader: &dyn DocumentLoader,
        grammars: &Grammars,
    ) -> Result<TargetOccurrence> {
        let grammar = grammars.get(&self.runner)?;
        let document = loader.open_document(&self.declared_in).await?;
        let file = TargetFile::new(document, grammar);
        let target = self.find_in(&file).ok_or_else(|| {
            Error::TargetNotFound(format!(
                "{} in {}",
                self.name,
                self.declared_in.display()
            ))
        })?;

        let Some(origin) = &self.included_from else {
            return Ok(TargetOccurrence::from(target));
        };
        let root = loader.open_document(&origin.root).await?;
        let site_document: DocumentRef =
            if normalize(&origin.site_path) == normalize(&origin.root) {
                Arc::clone(&root)
            } else {
                loader.open_document(&origin.site_path).await?
            };
        let site = IncludeSite {
            document: site_document,
            offset: origin.site_offset,
        };
        Ok(TargetOccurrence::from(IncludedTarget::new(target, root, site)))
    }

    fn find_in(&self, file: &TargetFile) -> Option<Target> {
        file.direct_targets()
            .find(|target| target.offset() == self.offset && target.name() == self.name)
            .or_else(|| file.target_named(&self.name))
    }
}
