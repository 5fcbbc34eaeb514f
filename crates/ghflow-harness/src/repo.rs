use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ghflow_command::{CommandRunner, ProcessCommandRunner};
use ghflow_config::{BinaryConfig, GhflowConfig};
use ghflow_git::GitCli;
use ghflow_github::{GhCli, IssueNumber, PrNumber};
use tracing::{debug, info, warn};

use crate::plan::reversal_plan;
use crate::staging::{missing_parent_dirs, snapshot_file, stage_fixture};
use crate::{
    HarnessError, ReversalAction, StagedFile, TeardownFailure, TeardownReport, TrackedArtifacts,
};

/// Where a scope runs. The working directory and starting branch are passed
/// in rather than read from process state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeConfig {
    pub repo_root: PathBuf,
    /// Copied into `repo_root` on entry when set.
    pub fixture_dir: Option<PathBuf>,
    /// Branch to return to at teardown. Read once from git when `None`.
    pub original_branch: Option<String>,
    pub base_branch: String,
    pub remote: String,
}

impl ScopeConfig {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        let defaults = GhflowConfig::default();
        Self {
            repo_root: repo_root.into(),
            fixture_dir: None,
            original_branch: None,
            base_branch: defaults.base_branch,
            remote: defaults.remote,
        }
    }

    pub fn from_config(config: &GhflowConfig) -> Self {
        let paths = config.paths();
        Self {
            repo_root: paths.repo_root,
            fixture_dir: None,
            original_branch: None,
            base_branch: config.base_branch.clone(),
            remote: config.remote.clone(),
        }
    }

    pub fn with_fixture(mut self, fixture_dir: impl Into<PathBuf>) -> Self {
        self.fixture_dir = Some(fixture_dir.into());
        self
    }

    pub fn with_original_branch(mut self, branch: impl Into<String>) -> Self {
        self.original_branch = Some(branch.into());
        self
    }
}

/// A repository under test whose mutations are reversed when the scope ends.
///
/// Teardown runs from [`TestRepo::teardown`] or, failing that, from `Drop`,
/// so it also happens when the test body panics.
pub struct TestRepo<R: CommandRunner = ProcessCommandRunner> {
    repo_root: PathBuf,
    original_branch: String,
    base_branch: String,
    remote: String,
    git: GitCli<Arc<R>>,
    gh: GhCli<Arc<R>>,
    artifacts: TrackedArtifacts,
    torn_down: bool,
}

impl TestRepo<ProcessCommandRunner> {
    /// Creates a private GitHub repository, clones it into `workdir/<name>`
    /// and scopes it. The repository is deleted at teardown.
    pub fn scratch(name: &str, workdir: &Path) -> Result<Self, HarnessError> {
        Self::scratch_with_runner(name, workdir, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> TestRepo<R> {
    pub fn enter(config: ScopeConfig, runner: R) -> Result<Self, HarnessError> {
        Self::enter_with_binaries(config, runner, &GhflowConfig::default().binaries())
    }

    pub fn enter_with_binaries(
        config: ScopeConfig,
        runner: R,
        binaries: &BinaryConfig,
    ) -> Result<Self, HarnessError> {
        let runner = Arc::new(runner);
        let git = GitCli::new(
            Arc::clone(&runner),
            binaries.git.clone(),
            binaries.allow_unsafe_command_paths,
        )?;
        let gh = GhCli::new(runner, binaries.gh.clone(), binaries.allow_unsafe_command_paths)?;

        let original_branch = match config.original_branch {
            Some(branch) => branch,
            None => git.current_branch(&config.repo_root)?,
        };

        let mut repo = Self {
            repo_root: config.repo_root,
            original_branch,
            base_branch: config.base_branch,
            remote: config.remote,
            git,
            gh,
            artifacts: TrackedArtifacts::new(),
            torn_down: false,
        };
        info!(
            repo = %repo.repo_root.display(),
            branch = %repo.original_branch,
            "entering test repository scope"
        );

        if let Some(fixture_dir) = config.fixture_dir {
            // On failure `repo` is dropped here and reverses the partial staging.
            stage_fixture(&fixture_dir, &repo.repo_root, &mut repo.artifacts)?;
        }

        Ok(repo)
    }

    /// Runs `body` inside a scope and tears it down afterwards, returning the
    /// body's value alongside the teardown report.
    pub fn scope<T>(
        config: ScopeConfig,
        runner: R,
        body: impl FnOnce(&mut Self) -> T,
    ) -> Result<(T, TeardownReport), HarnessError> {
        let mut repo = Self::enter(config, runner)?;
        let value = body(&mut repo);
        let report = repo.teardown();
        Ok((value, report))
    }

    pub fn scratch_with_runner(name: &str, workdir: &Path, runner: R) -> Result<Self, HarnessError> {
        let runner = Arc::new(runner);
        let git = GitCli::with_binary(Arc::clone(&runner), PathBuf::from("git"));
        let gh = GhCli::with_binary(runner, PathBuf::from("gh"));

        gh.create_repo(workdir, name, true)?;
        info!(name, "created scratch repository");

        let repo_root = workdir.join(name);
        let cloned = gh
            .clone_repo(workdir, name, &repo_root)
            .map_err(HarnessError::from)
            .and_then(|()| git.current_branch(&repo_root).map_err(HarnessError::from));
        let original_branch = match cloned {
            Ok(branch) => branch,
            Err(error) => {
                if let Err(cleanup) = gh.delete_repo(workdir, name) {
                    warn!(error = %cleanup, name, "failed to delete scratch repository");
                }
                return Err(error);
            }
        };

        let mut artifacts = TrackedArtifacts::new();
        artifacts.add_scratch_repo(name.to_owned());
        Ok(Self {
            repo_root,
            base_branch: original_branch.clone(),
            original_branch,
            remote: GhflowConfig::default().remote,
            git,
            gh,
            artifacts,
            torn_down: false,
        })
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn original_branch(&self) -> &str {
        &self.original_branch
    }

    pub fn base_branch(&self) -> &str {
        &self.base_branch
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn git(&self) -> &GitCli<Arc<R>> {
        &self.git
    }

    pub fn gh(&self) -> &GhCli<Arc<R>> {
        &self.gh
    }

    pub fn artifacts(&self) -> &TrackedArtifacts {
        &self.artifacts
    }

    pub fn track_issue(&mut self, issue: IssueNumber) -> bool {
        let added = self.artifacts.add_issue(issue);
        if added {
            debug!(%issue, "tracking issue");
        }
        added
    }

    pub fn track_pr(&mut self, pr: PrNumber) -> bool {
        let added = self.artifacts.add_pr(pr);
        if added {
            debug!(%pr, "tracking pull request");
        }
        added
    }

    /// Registers a branch for local and remote deletion. The base and
    /// original branches are never tracked.
    pub fn track_branch(&mut self, branch: &str) -> bool {
        let branch = branch.trim();
        if branch.is_empty() {
            warn!("refusing to track an empty branch name");
            return false;
        }
        if branch == self.base_branch || branch == self.original_branch {
            warn!(branch, "refusing to track a protected branch for deletion");
            return false;
        }

        let added = self.artifacts.add_branch(branch.to_owned());
        if added {
            debug!(branch, "tracking branch");
        }
        added
    }

    /// Records `path` (relative paths resolve against the repository root)
    /// so its current contents are restored, or the file removed, at teardown.
    /// Missing parent directories are recorded too and removed when empty.
    pub fn track_file(&mut self, path: impl AsRef<Path>) -> Result<bool, HarnessError> {
        let path = self.resolve(path.as_ref());
        if self.artifacts.is_file_tracked(&path) {
            return Ok(false);
        }

        let staged = snapshot_file(&path)?;
        if let StagedFile::New(_) = staged {
            for dir in missing_parent_dirs(&path) {
                self.artifacts.add_created_dir(dir);
            }
        }
        debug!(file = %path.display(), "tracking file");
        Ok(self.artifacts.add_file(staged))
    }

    /// Stops tracking `path`, for example once its change is committed on a
    /// tracked branch and leaves with that branch.
    pub fn untrack_file(&mut self, path: impl AsRef<Path>) -> bool {
        let path = self.resolve(path.as_ref());
        self.artifacts.remove_file(&path).is_some()
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.repo_root.join(path)
        }
    }

    pub fn reversal_plan(&self) -> Vec<ReversalAction> {
        reversal_plan(
            &self.artifacts,
            &self.repo_root,
            &self.original_branch,
            &self.remote,
        )
    }

    /// Reverses every tracked artifact. Each action runs on its own; a
    /// failure is logged and reported but never stops the remaining actions.
    /// The tracked set is drained, so calling this again is a no-op.
    pub fn teardown(&mut self) -> TeardownReport {
        if self.torn_down && self.artifacts.is_empty() {
            return TeardownReport::default();
        }

        let plan = self.reversal_plan();
        self.artifacts.drain();
        self.torn_down = true;

        let mut report = TeardownReport::default();
        for action in plan {
            report.attempted += 1;
            match self.reverse(&action) {
                Ok(()) => debug!(%action, "reversed"),
                Err(error) => {
                    warn!(error = %error, %action, "cleanup action failed");
                    report.failures.push(TeardownFailure {
                        action,
                        error: error.to_string(),
                    });
                }
            }
        }

        info!(
            attempted = report.attempted,
            succeeded = report.succeeded(),
            failed = report.failures.len(),
            "test repository scope torn down"
        );
        report
    }

    fn reverse(&self, action: &ReversalAction) -> Result<(), HarnessError> {
        match action {
            ReversalAction::RestoreBackup { original, backup } => {
                if !backup.exists() {
                    return Ok(());
                }
                fs::rename(backup, original)
                    .map_err(|source| HarnessError::io("restore backup", original, source))
            }
            ReversalAction::RestoreContents { path, contents } => fs::write(path, contents)
                .map_err(|source| HarnessError::io("restore contents", path, source)),
            ReversalAction::RemoveFile(path) => match fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(error) => Err(HarnessError::io("remove file", path, error)),
            },
            ReversalAction::RemoveEmptyDir(path) => remove_empty_dir(path),
            ReversalAction::CheckoutBranch(branch) => {
                let current = self.git.current_branch(&self.repo_root).ok();
                if current.as_deref() == Some(branch.as_str()) {
                    return Ok(());
                }
                let Err(error) = self.git.checkout(&self.repo_root, branch) else {
                    return Ok(());
                };
                if *branch == self.base_branch {
                    return Err(error.into());
                }

                // Leave the tracked branches so they can still be deleted.
                warn!(
                    error = %error,
                    branch = %branch,
                    fallback = %self.base_branch,
                    "checkout failed; falling back to the base branch"
                );
                if let Err(fallback) = self.git.checkout(&self.repo_root, &self.base_branch) {
                    warn!(error = %fallback, branch = %self.base_branch, "fallback checkout failed");
                }
                Err(error.into())
            }
            ReversalAction::DeleteLocalBranch(branch) => {
                if !self.git.local_branch_exists(&self.repo_root, branch)? {
                    return Ok(());
                }
                Ok(self.git.delete_local_branch(&self.repo_root, branch)?)
            }
            ReversalAction::DeleteRemoteBranch { remote, branch } => {
                if !self
                    .git
                    .remote_branch_exists(&self.repo_root, remote, branch)?
                {
                    return Ok(());
                }
                Ok(self
                    .git
                    .delete_remote_branch(&self.repo_root, remote, branch)?)
            }
            ReversalAction::ClosePr(pr) => Ok(self.gh.close_pr(&self.repo_root, *pr)?),
            ReversalAction::CloseIssue(issue) => {
                Ok(self.gh.close_issue(&self.repo_root, *issue)?)
            }
            ReversalAction::DeleteRepo(name) => {
                let workdir = self.repo_root.parent().unwrap_or(&self.repo_root);
                Ok(self.gh.delete_repo(workdir, name)?)
            }
        }
    }
}

fn remove_empty_dir(path: &Path) -> Result<(), HarnessError> {
    let mut entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(error) => return Err(HarnessError::io("read directory", path, error)),
    };
    if entries.next().is_some() {
        debug!(dir = %path.display(), "directory not empty; leaving it in place");
        return Ok(());
    }

    fs::remove_dir(path).map_err(|source| HarnessError::io("remove directory", path, source))
}

impl<R: CommandRunner> Drop for TestRepo<R> {
    fn drop(&mut self) {
        if self.torn_down && self.artifacts.is_empty() {
            return;
        }

        let report = self.teardown();
        if !report.is_clean() {
            warn!(
                failed = report.failures.len(),
                "test repository scope dropped with failed cleanup actions"
            );
        }
    }
}
