//! Rendering targets into commands and handing them to an executor.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::grammar::Grammars;
use crate::render::{Action, render_command};
use crate::state::LastExecutedTarget;
use crate::target::TargetOccurrence;
use crate::traits::{CommandExecutor, DocumentLoader, StateStore};
use crate::{Error, Result};

/// A command ready to be executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedCommand {
    /// Shell command line
    pub command: String,
    /// Directory to run the command in
    pub working_directory: PathBuf,
    /// Action the command was rendered for
    pub action: Action,
    /// Runner identifier
    pub runner: String,
    /// Target name
    pub name: String,
}

/// How an executed command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Exit code, absent when the process was killed by a signal
    pub exit_code: Option<i32>,
}

impl ExecutionOutcome {
    /// Whether the command exited with status 0.
    pub fn success(self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Renders targets and hands them to an executor, recording runs.
#[derive(Clone)]
pub struct Launcher {
    settings: Arc<Settings>,
    executor: Arc<dyn CommandExecutor>,
    store: Arc<dyn StateStore>,
}

impl Launcher {
    /// Creates a launcher.
    pub fn new(
        settings: Arc<Settings>,
        executor: Arc<dyn CommandExecutor>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            settings,
            executor,
            store,
        }
    }

    /// Settings commands are rendered with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Renders `target` for `action` without side effects.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the runner is misconfigured or has no
    /// dry run, or [`Error::UnknownRunner`] if it is not configured at all.
    pub fn render(&self, target: &TargetOccurrence, action: Action) -> Result<RenderedCommand> {
        let runner = target.runner();
        let runner_settings = self.settings.runner(runner)?;
        if action == Action::DryRun && !target.grammar().supports_dry_run() {
            return Err(Error::Config(format!(
                "runner '{runner}' does not support dry runs"
            )));
        }
        let template = action.template(runner_settings).ok_or_else(|| {
            Error::Config(format!("no {action} command configured for runner '{runner}'"))
        })?;

        Ok(RenderedCommand {
            command: render_command(template, target),
            working_directory: target.directory_path().to_path_buf(),
            action,
            runner: runner.to_owned(),
            name: target.name().to_owned(),
        })
    }

    /// Renders and executes `target`, recording it as the last executed one.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering, recording, or execution fails.
    pub async fn run(&self, target: &TargetOccurrence) -> Result<ExecutionOutcome> {
        let rendered = self.render(target, Action::Run)?;
        self.store
            .save_last(&LastExecutedTarget::new(target, &rendered.command))?;
        tracing::debug!("running {} ({})", rendered.name, rendered.command);
        self.executor.execute(&rendered).await
    }

    /// Renders and executes the dry-run command of `target`. Nothing is recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or execution fails.
    pub async fn dry_run(&self, target: &TargetOccurrence) -> Result<ExecutionOutcome> {
        let rendered = self.render(target, Action::DryRun)?;
        tracing::debug!("dry run of {} ({})", rendered.name, rendered.command);
        self.executor.execute(&rendered).await
    }

    /// Dispatches to [`Self::run`] or [`Self::dry_run`].
    ///
    /// # Errors
    ///
    /// See [`Self::run`] and [`Self::dry_run`].
    pub async fn execute(
        &self,
        target: &TargetOccurrence,
        action: Action,
    ) -> Result<ExecutionOutcome> {
        match action {
            Action::Run => self.run(target).await,
            Action::DryRun => self.dry_run(target).await,
        }
    }

    /// Restores the last executed target from current documents, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be read or the target no longer exists.
    pub async fn last_target(
        &self,
        loader: &dyn DocumentLoader,
        grammars: &Grammars,
    ) -> Result<Option<TargetOccurrence>> {
        let Some(last) = self.store.load_last()? else {
            return Ok(None);
        };
        last.restore(loader, grammars).await.map(Some)
    }

    /// Runs the last executed target again, rendered with current settings.
    ///
    /// Returns `Ok(None)` when nothing has been run yet.
    ///
    /// # Errors
    ///
    /// See [`Self::last_target`] and [`Self::run`].
    pub async fn rerun_last(
        &self,
        loader: &dyn DocumentLoader,
        grammars: &Grammars,
    ) -> Result<Option<ExecutionOutcome>> {
        let Some(target) = self.last_target(loader, grammars).await? else {
            return Ok(None);
        };
        self.run(&target).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentRef, SourceDocument};
    use crate::grammar::{Grammar, MAKE_RUNNER};
    use crate::target::{IncludeSite, IncludedTarget, Target};
    use crate::target_file::TargetFile;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingExecutor {
        commands: Mutex<Vec<RenderedCommand>>,
    }

    impl RecordingExecutor {
        fn commands(&self) -> Vec<String> {
            self.commands
                .lock()
                .map(|commands| commands.iter().map(|rendered| rendered.command.clone()).collect())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl CommandExecutor for RecordingExecutor {
        async fn execute(&self, command: &RenderedCommand) -> Result<ExecutionOutcome> {
            if let Ok(mut commands) = self.commands.lock() {
                commands.push(command.clone());
            }
            Ok(ExecutionOutcome { exit_code: Some(0) })
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        last: Mutex<Option<LastExecutedTarget>>,
    }

    impl StateStore for MemoryStore {
        fn save_last(&self, target: &LastExecutedTarget) -> Result<()> {
            if let Ok(mut last) = self.last.lock() {
                *last = Some(target.clone());
            }
            Ok(())
        }

        fn load_last(&self) -> Result<Option<LastExecutedTarget>> {
            Ok(self.last.lock().ok().and_then(|last| last.clone()))
        }
    }

    struct FixedLoader {
        document: DocumentRef,
    }

    #[async_trait]
    impl DocumentLoader for FixedLoader {
        async fn open_document(&self, path: &Path) -> Result<DocumentRef> {
            if path == self.document.path() {
                Ok(Arc::clone(&self.document))
            } else {
                Err(Error::DocumentNotFound {
                    path: path.to_path_buf(),
                    reason: "missing".to_owned(),
                })
            }
        }
    }

    struct Fixture {
        launcher: Launcher,
        executor: Arc<RecordingExecutor>,
        store: Arc<MemoryStore>,
    }

    fn fixture(settings: Settings) -> Fixture {
        let executor = Arc::new(RecordingExecutor::default());
        let store = Arc::new(MemoryStore::default());
        let launcher = Launcher::new(
            Arc::new(settings),
            Arc::clone(&executor) as Arc<dyn CommandExecutor>,
            Arc::clone(&store) as Arc<dyn StateStore>,
        );
        Fixture {
            launcher,
            executor,
            store,
        }
    }

    fn make_target(document: &DocumentRef, name: &str) -> Target {
        let grammar = Arc::new(Grammar::make().expect("make grammar compiles"));
        TargetFile::new(Arc::clone(document), grammar)
            .target_named(name)
            .expect("target exists")
    }

    #[tokio::test]
    async fn test_run_records_and_executes() {
        let fixture = fixture(Settings::default());
        let document = SourceDocument::new("/w/Makefile", "build:\n").shared();
        let target = TargetOccurrence::from(make_target(&document, "build"));

        let outcome = fixture.launcher.run(&target).await.expect("run succeeds");
        assert!(outcome.success());
        assert_eq!(fixture.executor.commands(), vec!["make -f /w/Makefile build"]);

        let last = fixture
            .store
            .load_last()
            .expect("state loads")
            .expect("run was recorded");
        assert_eq!(last.name, "build");
        assert_eq!(last.command, "make -f /w/Makefile build");
    }

    #[tokio::test]
    async fn test_dry_run_is_not_recorded() {
        let fixture = fixture(Settings::default());
        let document = SourceDocument::new("/w/Makefile", "build:\n").shared();
        let target = TargetOccurrence::from(make_target(&document, "build"));

        fixture
            .launcher
            .execute(&target, Action::DryRun)
            .await
            .expect("dry run succeeds");
        assert_eq!(
            fixture.executor.commands(),
            vec!["make --dry-run -f /w/Makefile build"]
        );
        assert!(fixture.store.load_last().expect("state loads").is_none());
    }

    #[test]
    fn test_render_included_target_from_root() {
        let fixture = fixture(Settings::default());
        let declaring = SourceDocument::new("/w/lib/lib.mk", "clean:\n").shared();
        let root = SourceDocument::new("/w/root.mk", "include lib/lib.mk\n").shared();
        let site = IncludeSite {
            document: Arc::clone(&root),
            offset: 0,
        };
        let target = TargetOccurrence::from(IncludedTarget::new(
            make_target(&declaring, "clean"),
            root,
            site,
        ));

        let rendered = fixture
            .launcher
            .render(&target, Action::Run)
            .expect("render succeeds");
        assert_eq!(rendered.command, "make -f /w/root.mk clean");
        assert_eq!(rendered.working_directory, PathBuf::from("/w"));
    }

    #[test]
    fn test_render_configuration_errors() {
        let mut settings = Settings::default();
        if let Some(make) = settings.runners.get_mut(MAKE_RUNNER) {
            make.dry_run_command = None;
        }
        let no_dry_run = fixture(settings);
        let document = SourceDocument::new("/w/Makefile", "build:\n").shared();
        let target = TargetOccurrence::from(make_target(&document, "build"));
        assert!(matches!(
            no_dry_run.launcher.render(&target, Action::DryRun),
            Err(Error::Config(_))
        ));

        let mut without_make = Settings::default();
        without_make.runners.remove(MAKE_RUNNER);
        let other = fixture(without_make);
        assert!(matches!(
            other.launcher.render(&target, Action::Run),
            Err(Error::UnknownRunner(_))
        ));
    }

    #[tokio::test]
    async fn test_rerun_uses_current_settings() {
        let document = SourceDocument::new("/w/Makefile", "build:\n").shared();
        let target = TargetOccurrence::from(make_target(&document, "build"));
        let first = fixture(Settings::default());
        first.launcher.run(&target).await.expect("run succeeds");

        let mut changed = Settings::default();
        if let Some(make) = changed.runners.get_mut(MAKE_RUNNER) {
            make.run_command = "make -C <directoryPath> <name>".to_owned();
        }
        let executor = Arc::new(RecordingExecutor::default());
        let second = Launcher::new(
            Arc::new(changed),
            Arc::clone(&executor) as Arc<dyn CommandExecutor>,
            Arc::clone(&first.store) as Arc<dyn StateStore>,
        );
        let loader = FixedLoader { document };
        let grammars = Grammars::builtin().expect("builtin grammars");

        let outcome = second
            .rerun_last(&loader, &grammars)
            .await
            .expect("rerun succeeds");
        assert!(outcome.is_some());
        assert_eq!(executor.commands(), vec!["make -C /w build"]);
    }

    #[tokio::test]
    async fn test_rerun_without_history() {
        let fixture = fixture(Settings::default());
        let loader = FixedLoader {
            document: SourceDocument::new("/w/Makefile", "").shared(),
        };
        let grammars = Grammars::builtin().expect("builtin grammars");
        let outcome = fixture
            .launcher
            .rerun_last(&loader, &grammars)
            .await
            .expect("rerun succeeds");
        assert!(outcome.is_none());
        assert!(fixture.executor.commands().is_empty());
    }
}
