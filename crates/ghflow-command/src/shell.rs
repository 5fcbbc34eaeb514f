use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::guards::{sanitize_command_output_text, validate_command_binary_path};
use crate::{CommandError, CommandRunner, ProcessCommandRunner};

const DEFAULT_SHELL: &str = "sh";

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub command: String,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn trimmed_stdout(&self) -> &str {
        self.stdout.trim()
    }

    /// Passes the output through on a zero exit, `CommandError::Failed` otherwise.
    pub fn check(self) -> Result<Self, CommandError> {
        if self.success() {
            return Ok(self);
        }

        Err(CommandError::Failed {
            command: self.command,
            exit_code: self.exit_code,
            stdout: sanitize_command_output_text(&self.stdout),
            stderr: sanitize_command_output_text(&self.stderr),
        })
    }

    /// Trimmed stdout on a zero exit, `CommandError::Failed` otherwise.
    pub fn into_result(self) -> Result<String, CommandError> {
        self.check().map(|output| output.stdout.trim().to_owned())
    }
}

pub fn render_command(program: &str, args: &[OsString]) -> String {
    let rendered = args
        .iter()
        .map(|arg| arg.to_string_lossy().to_string())
        .collect::<Vec<_>>();
    if rendered.is_empty() {
        return program.to_owned();
    }

    format!("{program} {}", shell_words::join(rendered))
}

/// Runs `program` through `runner` and captures the result. `rendered` is the
/// human-readable command used for logs and error messages.
pub fn execute<R: CommandRunner + ?Sized>(
    runner: &R,
    program: &str,
    args: &[OsString],
    cwd: Option<&Path>,
    rendered: &str,
) -> Result<CommandOutput, CommandError> {
    debug!(command = rendered, cwd = ?cwd, "running command");
    let output = runner
        .run(program, args, cwd)
        .map_err(|error| spawn_error(program, rendered, &error))?;

    let captured = CommandOutput {
        command: rendered.to_owned(),
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };
    if !captured.success() {
        debug!(command = rendered, exit_code = ?captured.exit_code, "command exited unsuccessfully");
    }

    Ok(captured)
}

fn spawn_error(program: &str, rendered: &str, error: &io::Error) -> CommandError {
    let detail = match error.kind() {
        io::ErrorKind::NotFound => format!(
            "`{program}` was not found. Install it or point the matching ghflow binary setting at a valid executable."
        ),
        _ => format!("could not start `{program}`: {error}"),
    };

    CommandError::Spawn {
        command: rendered.to_owned(),
        detail,
    }
}

/// Synchronous shell command execution. No retries and no timeout: a hung
/// command surfaces as a hung test.
pub struct Shell<R: CommandRunner = ProcessCommandRunner> {
    runner: R,
    binary: PathBuf,
}

impl Shell<ProcessCommandRunner> {
    pub fn system() -> Self {
        Self::with_binary(ProcessCommandRunner, PathBuf::from(DEFAULT_SHELL))
    }
}

impl<R: CommandRunner> Shell<R> {
    pub fn new(
        runner: R,
        binary: PathBuf,
        allow_unsafe_command_paths: bool,
    ) -> Result<Self, CommandError> {
        validate_command_binary_path(&binary, "shell.binary", allow_unsafe_command_paths)?;
        Ok(Self::with_binary(runner, binary))
    }

    pub fn with_binary(runner: R, binary: PathBuf) -> Self {
        Self { runner, binary }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Runs `command` through the shell and returns its trimmed stdout.
    pub fn run(&self, command: &str, cwd: Option<&Path>) -> Result<String, CommandError> {
        self.run_unchecked(command, cwd)?.into_result()
    }

    /// Like [`Shell::run`] but a non-zero exit is returned as data.
    pub fn run_unchecked(
        &self,
        command: &str,
        cwd: Option<&Path>,
    ) -> Result<CommandOutput, CommandError> {
        let program = self.program()?;
        let args = [OsString::from("-c"), OsString::from(command)];
        execute(&self.runner, program, &args, cwd, command)
    }

    pub fn run_args(
        &self,
        program: &str,
        args: &[OsString],
        cwd: Option<&Path>,
    ) -> Result<String, CommandError> {
        self.run_args_unchecked(program, args, cwd)?.into_result()
    }

    pub fn run_args_unchecked(
        &self,
        program: &str,
        args: &[OsString],
        cwd: Option<&Path>,
    ) -> Result<CommandOutput, CommandError> {
        let rendered = render_command(program, args);
        execute(&self.runner, program, args, cwd, &rendered)
    }

    fn program(&self) -> Result<&str, CommandError> {
        self.binary
            .to_str()
            .ok_or_else(|| CommandError::Configuration("Invalid shell binary path".to_owned()))
    }
}
