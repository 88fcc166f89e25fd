//! External command execution seam

use std::process::{Command, Output};

use suitekit_core::{HarnessError, Result};

/// Executes fully configured commands on behalf of the provisioner
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion and capture its output
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Spawn` if the program cannot be started
    fn run(&self, command: &mut Command) -> Result<Output>;
}

/// Runs commands as real child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &mut Command) -> Result<Output> {
        command
            .output()
            .map_err(|e| HarnessError::spawn(program_name(command), e))
    }
}

/// Run and turn a non-zero exit status into `HarnessError::CommandFailed`
pub(crate) fn run_checked(runner: &dyn CommandRunner, command: &mut Command) -> Result<Output> {
    let output = runner.run(command)?;
    if output.status.success() {
        Ok(output)
    } else {
        Err(HarnessError::command_failed(program_name(command), &output))
    }
}

pub(crate) fn program_name(command: &Command) -> String {
    command.get_program().to_string_lossy().into_owned()
}
