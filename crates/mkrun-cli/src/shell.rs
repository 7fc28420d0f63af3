//! Process execution through the system shell.

use async_trait::async_trait;
use tokio::process::Command;

use mkrun_core::{CommandExecutor, Error, ExecutionOutcome, RenderedCommand, Result};

/// Runs rendered commands with `sh -c`, inheriting the terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellExecutor;

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(&self, command: &RenderedCommand) -> Result<ExecutionOutcome> {
        tracing::debug!(
            "Executing in {}: {}",
            command.working_directory.display(),
            command.command
        );
        let status = Command::new("sh")
            .arg("-c")
            .arg(&command.command)
            .current_dir(&command.working_directory)
            .status()
            .await
            .map_err(|err| {
                Error::Execution(format!("failed to start '{}': {err}", command.command))
            })?;

        let outcome = ExecutionOutcome {
            exit_code: status.code(),
        };
        tracing::debug!("{} finished with {:?}", command.name, outcome.exit_code);
        Ok(outcome)
    }
}
