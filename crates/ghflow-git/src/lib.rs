use std::ffi::OsString;
use std::path::{Path, PathBuf};

use ghflow_command::{
    execute, render_command, validate_command_binary_path, CommandError, CommandOutput,
    CommandRunner, ProcessCommandRunner,
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("unexpected git output: {0}")]
    UnexpectedOutput(String),
}

/// Typed access to the `git` binary. Every invocation names its repository
/// with `-C` instead of relying on the process working directory.
pub struct GitCli<R: CommandRunner = ProcessCommandRunner> {
    runner: R,
    binary: PathBuf,
}

impl GitCli<ProcessCommandRunner> {
    pub fn system() -> Self {
        Self::with_binary(ProcessCommandRunner, PathBuf::from("git"))
    }
}

impl<R: CommandRunner> GitCli<R> {
    pub fn new(runner: R, binary: PathBuf, allow_unsafe_command_paths: bool) -> Result<Self, GitError> {
        validate_command_binary_path(&binary, "git.binary", allow_unsafe_command_paths)?;
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

    pub fn health_check_args() -> Vec<OsString> {
        vec![OsString::from("--version")]
    }

    fn repo_args(repo: &Path, rest: &[&str]) -> Vec<OsString> {
        let mut args = vec![OsString::from("-C"), repo.as_os_str().to_owned()];
        args.extend(rest.iter().map(OsString::from));
        args
    }

    pub fn current_branch_args(repo: &Path) -> Vec<OsString> {
        Self::repo_args(repo, &["branch", "--show-current"])
    }

    pub fn checkout_args(repo: &Path, branch: &str) -> Vec<OsString> {
        Self::repo_args(repo, &["checkout", branch])
    }

    pub fn create_branch_args(repo: &Path, branch: &str) -> Vec<OsString> {
        Self::repo_args(repo, &["checkout", "-b", branch])
    }

    pub fn delete_local_branch_args(repo: &Path, branch: &str) -> Vec<OsString> {
        Self::repo_args(repo, &["branch", "-D", branch])
    }

    pub fn delete_remote_branch_args(repo: &Path, remote: &str, branch: &str) -> Vec<OsString> {
        Self::repo_args(repo, &["push", remote, "--delete", branch])
    }

    pub fn push_upstream_args(repo: &Path, remote: &str, branch: &str) -> Vec<OsString> {
        Self::repo_args(repo, &["push", "-u", remote, branch])
    }

    pub fn local_branch_exists_args(repo: &Path, branch: &str) -> Vec<OsString> {
        let reference = format!("refs/heads/{branch}");
        Self::repo_args(repo, &["rev-parse", "--verify", "--quiet", reference.as_str()])
    }

    pub fn remote_branch_exists_args(repo: &Path, remote: &str, branch: &str) -> Vec<OsString> {
        Self::repo_args(repo, &["ls-remote", "--heads", remote, branch])
    }

    fn run_git_unchecked(&self, args: &[OsString]) -> Result<CommandOutput, GitError> {
        let program = self
            .binary
            .to_str()
            .ok_or_else(|| GitError::Configuration("Invalid git binary path".to_owned()))?;
        let rendered = render_command(program, args);
        Ok(execute(&self.runner, program, args, None, &rendered)?)
    }

    fn run_git(&self, args: &[OsString]) -> Result<String, GitError> {
        Ok(self.run_git_unchecked(args)?.into_result()?)
    }

    fn ensure_branch_name(branch: &str) -> Result<&str, GitError> {
        let branch = branch.trim();
        if branch.is_empty() {
            return Err(GitError::Configuration(
                "Branch name must be a non-empty string.".to_owned(),
            ));
        }
        if branch.starts_with('-') {
            return Err(GitError::Configuration(format!(
                "Branch name '{branch}' must not start with '-'."
            )));
        }

        Ok(branch)
    }

    pub fn health_check(&self) -> Result<(), GitError> {
        self.run_git(&Self::health_check_args()).map(|_| ())
    }

    /// Name of the checked-out branch. A detached HEAD is an error because
    /// there is no branch to return to afterwards.
    pub fn current_branch(&self, repo: &Path) -> Result<String, GitError> {
        let branch = self.run_git(&Self::current_branch_args(repo))?;
        if branch.is_empty() {
            return Err(GitError::UnexpectedOutput(format!(
                "'{}' is on a detached HEAD; check out a branch first.",
                repo.display()
            )));
        }

        Ok(branch)
    }

    pub fn checkout(&self, repo: &Path, branch: &str) -> Result<(), GitError> {
        let branch = Self::ensure_branch_name(branch)?;
        self.run_git(&Self::checkout_args(repo, branch)).map(|_| ())
    }

    pub fn create_branch(&self, repo: &Path, branch: &str) -> Result<(), GitError> {
        let branch = Self::ensure_branch_name(branch)?;
        self.run_git(&Self::create_branch_args(repo, branch)).map(|_| ())
    }

    pub fn delete_local_branch(&self, repo: &Path, branch: &str) -> Result<(), GitError> {
        let branch = Self::ensure_branch_name(branch)?;
        self.run_git(&Self::delete_local_branch_args(repo, branch))
            .map(|_| ())
    }

    pub fn delete_remote_branch(
        &self,
        repo: &Path,
        remote: &str,
        branch: &str,
    ) -> Result<(), GitError> {
        let branch = Self::ensure_branch_name(branch)?;
        self.run_git(&Self::delete_remote_branch_args(repo, remote, branch))
            .map(|_| ())
    }

    pub fn push_upstream(&self, repo: &Path, remote: &str, branch: &str) -> Result<(), GitError> {
        let branch = Self::ensure_branch_name(branch)?;
        self.run_git(&Self::push_upstream_args(repo, remote, branch))
            .map(|_| ())
    }

    pub fn pull(&self, repo: &Path) -> Result<(), GitError> {
        self.run_git(&Self::repo_args(repo, &["pull", "--ff-only"]))
            .map(|_| ())
    }

    pub fn add_all(&self, repo: &Path) -> Result<(), GitError> {
        self.run_git(&Self::repo_args(repo, &["add", "--all"]))
            .map(|_| ())
    }

    pub fn commit(&self, repo: &Path, message: &str) -> Result<(), GitError> {
        if message.trim().is_empty() {
            return Err(GitError::Configuration(
                "Commit message must be a non-empty string.".to_owned(),
            ));
        }
        self.run_git(&Self::repo_args(repo, &["commit", "-m", message]))
            .map(|_| ())
    }

    pub fn status_porcelain(&self, repo: &Path) -> Result<Vec<String>, GitError> {
        let output = self
            .run_git_unchecked(&Self::repo_args(repo, &["status", "--porcelain"]))?
            .check()?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(ToOwned::to_owned)
            .collect())
    }

    pub fn is_clean(&self, repo: &Path) -> Result<bool, GitError> {
        Ok(self.status_porcelain(repo)?.is_empty())
    }

    pub fn local_branch_exists(&self, repo: &Path, branch: &str) -> Result<bool, GitError> {
        let branch = Self::ensure_branch_name(branch)?;
        let output = self.run_git_unchecked(&Self::local_branch_exists_args(repo, branch))?;
        let exit_code = output.exit_code;
        match exit_code {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            other => {
                output.check()?;
                Err(GitError::UnexpectedOutput(format!(
                    "git rev-parse exited with {other:?}"
                )))
            }
        }
    }

    pub fn remote_branch_exists(
        &self,
        repo: &Path,
        remote: &str,
        branch: &str,
    ) -> Result<bool, GitError> {
        let branch = Self::ensure_branch_name(branch)?;
        let stdout = self.run_git(&Self::remote_branch_exists_args(repo, remote, branch))?;
        let suffix = format!("refs/heads/{branch}");
        let exists = stdout.lines().any(|line| line.trim_end().ends_with(&suffix));
        debug!(remote, branch, exists, "checked remote branch");
        Ok(exists)
    }
}
