//! Subcommand handlers.

use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf, absolute};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use futures::StreamExt as _;
use futures::future::ready;

use mkrun_core::paths::relative_to;
use mkrun_core::{
    Action, Error as CoreError, ExecutionOutcome, FsDocumentLoader, GlobDiscovery, Grammars,
    Launcher, Notice, Settings, TargetFile, TargetOccurrence, Workspace,
};

use crate::cli::{Cli, Commands};
use crate::shell::ShellExecutor;
use crate::state::JsonStateStore;

/// Environment variable overriding the state folder.
const FOLDER_ENV: &str = "MKRUN_FOLDER";
const DEFAULT_FOLDER: &str = ".mkrun";
const CONFIG_FILE: &str = "config.toml";

/// Runs the parsed command line.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded or the command fails.
pub async fn dispatch(cli: Cli) -> Result<ExitCode> {
    let app = App::new(&cli)?;
    let mut out = io::stdout();
    app.handle(cli.command, &mut out).await
}

/// Loaded configuration and collaborators.
struct App {
    workspace: Workspace,
    launcher: Launcher,
    config_path: PathBuf,
}

impl App {
    fn new(cli: &Cli) -> Result<Self> {
        let project = absolute(&cli.project)
            .with_context(|| format!("Invalid project path {}", cli.project.display()))?;
        let folder = state_folder(&project);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| folder.join(CONFIG_FILE));
        let settings = Arc::new(
            Settings::load_or_default(&config_path)
                .with_context(|| format!("Failed to load {}", config_path.display()))?,
        );

        let workspace = Workspace::new(
            &project,
            Arc::clone(&settings),
            Grammars::builtin()?,
            Arc::new(GlobDiscovery),
            Arc::new(FsDocumentLoader),
        );
        let launcher = Launcher::new(
            settings,
            Arc::new(ShellExecutor),
            Arc::new(JsonStateStore::new(&folder)),
        );
        Ok(Self {
            workspace,
            launcher,
            config_path,
        })
    }

    async fn handle(&self, command: Commands, out: &mut dyn Write) -> Result<ExitCode> {
        match command {
            Commands::List { runner, active } => {
                self.list(out, runner.as_deref(), active.as_deref()).await
            }
            Commands::Targets { file } => self.targets(out, &file).await,
            Commands::Run {
                file,
                name,
                line,
                dry_run,
                print,
            } => {
                self.run(out, &file, name.as_deref(), line, action(dry_run), print)
                    .await
            }
            Commands::Included {
                file,
                line,
                name,
                dry_run,
                print,
            } => {
                self.included(out, &file, line, name.as_deref(), action(dry_run), print)
                    .await
            }
            Commands::Rerun { print } => self.rerun(out, print).await,
            Commands::Lenses { file } => self.lenses(out, &file).await,
            Commands::Config { init } => self.config(out, init),
        }
    }

    async fn list(
        &self,
        out: &mut dyn Write,
        runner: Option<&str>,
        active: Option<&Path>,
    ) -> Result<ExitCode> {
        let runners: Vec<String> = match runner {
            Some(runner) => vec![runner.to_owned()],
            None => self.workspace.settings().runners.keys().cloned().collect(),
        };

        for runner in &runners {
            let scan = match self.workspace.all_targets(runner, active).await {
                Ok(scan) => scan,
                Err(err @ (CoreError::Config(_) | CoreError::UnknownRunner(_)))
                    if runners.len() > 1 =>
                {
                    tracing::warn!("Skipping runner '{runner}': {err}");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            report(&scan.notices);
            for group in &scan.items {
                writeln!(
                    out,
                    "[{runner}] {} ({})",
                    group.entry.label,
                    self.display_path(group.entry.file.path())
                )?;
                for target in &group.targets {
                    writeln!(out, "  {}", self.describe(target))?;
                }
            }
        }
        Ok(ExitCode::SUCCESS)
    }

    async fn targets(&self, out: &mut dyn Write, file: &Path) -> Result<ExitCode> {
        let target_file = self.open(file).await?;
        let direct: Vec<_> = target_file.direct_targets().map(TargetOccurrence::from).collect();
        for target in &direct {
            writeln!(
                out,
                "{}:{}  {}",
                self.display_path(target.file_path()),
                target.declared().header_line().number + 1,
                self.describe(target)
            )?;
        }

        let included: Vec<_> = self
            .workspace
            .walker()
            .included_targets(&target_file)
            .map(TargetOccurrence::from)
            .collect()
            .await;
        for target in &included {
            if let Some(site) = target.include_site() {
                writeln!(
                    out,
                    "{}:{}  {}",
                    self.display_path(site.document.path()),
                    site.line().number + 1,
                    self.describe(target)
                )?;
            }
        }

        if direct.is_empty() && included.is_empty() {
            report(&[Notice::NoTargetsFound {
                path: target_file.path().to_path_buf(),
            }]);
        }
        Ok(ExitCode::SUCCESS)
    }

    async fn run(
        &self,
        out: &mut dyn Write,
        file: &Path,
        name: Option<&str>,
        line: Option<usize>,
        action: Action,
        print: bool,
    ) -> Result<ExitCode> {
        let target_file = self.open(file).await?;
        let found = match (name, line) {
            (_, Some(line)) => target_file
                .target_at_line(line_index(line)?)
                .map(TargetOccurrence::from),
            (Some(name), None) => self.find_named(&target_file, name).await,
            (None, None) => bail!("Give a target name or --line"),
        };
        let target = found.ok_or_else(|| {
            CoreError::TargetNotFound(match (name, line) {
                (_, Some(line)) => format!("no target header on line {line} of {}", file.display()),
                _ => format!("{} in {}", name.unwrap_or_default(), file.display()),
            })
        })?;
        self.launch(out, &target, action, print).await
    }

    async fn included(
        &self,
        out: &mut dyn Write,
        file: &Path,
        line: usize,
        name: Option<&str>,
        action: Action,
        print: bool,
    ) -> Result<ExitCode> {
        let target_file = self.open(file).await?;
        let reachable = self
            .workspace
            .walker()
            .included_targets_at_line(&target_file, line_index(line)?)
            .await;

        let Some(name) = name else {
            if reachable.is_empty() {
                tracing::warn!("No targets reachable from line {line} of {}", file.display());
            }
            for target in reachable {
                writeln!(out, "{}", self.describe(&TargetOccurrence::from(target)))?;
            }
            return Ok(ExitCode::SUCCESS);
        };

        let target = reachable
            .into_iter()
            .find(|target| target.original().name() == name)
            .ok_or_else(|| {
                CoreError::TargetNotFound(format!(
                    "{name} through line {line} of {}",
                    file.display()
                ))
            })?;
        self.launch(out, &TargetOccurrence::from(target), action, print)
            .await
    }

    async fn rerun(&self, out: &mut dyn Write, print: bool) -> Result<ExitCode> {
        let loader = self.workspace.loader().as_ref();
        let grammars = self.workspace.grammars();
        if print {
            let Some(target) = self.launcher.last_target(loader, grammars).await? else {
                tracing::warn!("Nothing has been run yet");
                return Ok(ExitCode::SUCCESS);
            };
            let rendered = self.launcher.render(&target, Action::Run)?;
            writeln!(out, "{}", rendered.command)?;
            return Ok(ExitCode::SUCCESS);
        }

        match self.launcher.rerun_last(loader, grammars).await? {
            Some(outcome) => Ok(exit_code(outcome)),
            None => {
                tracing::warn!("Nothing has been run yet");
                Ok(ExitCode::SUCCESS)
            }
        }
    }

    async fn lenses(&self, out: &mut dyn Write, file: &Path) -> Result<ExitCode> {
        let inline_runner = self.workspace.settings().inline_runner;
        if !inline_runner.enabled {
            tracing::debug!("Inline runners are disabled");
            return Ok(ExitCode::SUCCESS);
        }

        let target_file = self.open(file).await?;
        for anchor in target_file.inline_anchors(inline_runner.placement) {
            writeln!(out, "{}  run {}", anchor.line.number + 1, anchor.target.name())?;
        }
        for anchor in self.workspace.walker().include_anchors(&target_file).await {
            writeln!(
                out,
                "{}  include {} ({} targets)",
                anchor.line.number + 1,
                anchor.argument,
                anchor.target_count
            )?;
        }
        Ok(ExitCode::SUCCESS)
    }

    fn config(&self, out: &mut dyn Write, init: bool) -> Result<ExitCode> {
        if init {
            if self.config_path.exists() {
                bail!("{} already exists", self.config_path.display());
            }
            Settings::default().save_to_file(&self.config_path)?;
            writeln!(out, "Wrote {}", self.config_path.display())?;
            return Ok(ExitCode::SUCCESS);
        }

        writeln!(out, "# {}", self.config_path.display())?;
        write!(out, "{}", toml::to_string_pretty(self.workspace.settings().as_ref())?)?;
        Ok(ExitCode::SUCCESS)
    }

    async fn open(&self, file: &Path) -> Result<TargetFile> {
        self.workspace
            .open(file)
            .await?
            .with_context(|| format!("{} is not a target file", file.display()))
    }

    /// First target called `name`: direct targets before included ones.
    async fn find_named(&self, target_file: &TargetFile, name: &str) -> Option<TargetOccurrence> {
        self.workspace
            .walker()
            .all_targets(target_file)
            .filter(|target| ready(target.name() == name))
            .next()
            .await
    }

    async fn launch(
        &self,
        out: &mut dyn Write,
        target: &TargetOccurrence,
        action: Action,
        print: bool,
    ) -> Result<ExitCode> {
        if print {
            let rendered = self.launcher.render(target, action)?;
            writeln!(out, "{}", rendered.command)?;
            return Ok(ExitCode::SUCCESS);
        }
        let outcome = self.launcher.execute(target, action).await?;
        Ok(exit_code(outcome))
    }

    fn describe(&self, target: &TargetOccurrence) -> String {
        let comment = if target.comment().is_empty() {
            String::new()
        } else {
            format!("  # {}", target.comment())
        };
        let origin = match target {
            TargetOccurrence::Direct(_) => String::new(),
            TargetOccurrence::Included(included) => {
                format!("  (from {})", self.display_path(included.original().file_path()))
            }
        };
        format!("{}{comment}{origin}", target.name())
    }

    fn display_path(&self, path: &Path) -> String {
        relative_to(path, self.workspace.root()).display().to_string()
    }
}

/// Folder holding configuration and state: `$MKRUN_FOLDER` or `.mkrun`,
/// relative to the project.
fn state_folder(project: &Path) -> PathBuf {
    env::var_os(FOLDER_ENV).map_or_else(
        || project.join(DEFAULT_FOLDER),
        |folder| project.join(folder),
    )
}

fn action(dry_run: bool) -> Action {
    if dry_run { Action::DryRun } else { Action::Run }
}

/// Converts a 1-based line from the command line to a line index.
fn line_index(line: usize) -> Result<usize> {
    line.checked_sub(1).context("Line numbers start at 1")
}

fn exit_code(outcome: ExecutionOutcome) -> ExitCode {
    match outcome.exit_code {
        Some(0) => ExitCode::SUCCESS,
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        None => ExitCode::FAILURE,
    }
}

fn report(notices: &[Notice]) {
    for notice in notices {
        tracing::warn!("{notice}");
    }
}
