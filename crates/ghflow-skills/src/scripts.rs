use std::ffi::OsString;
use std::path::{Path, PathBuf};

use ghflow_command::{
    execute, render_command, validate_command_binary_path, CommandError, CommandOutput,
    CommandRunner, ProcessCommandRunner,
};
use ghflow_github::{parse_issue_number, parse_pr_number, IssueNumber, OutputContractError, PrNumber};
use thiserror::Error;
use tracing::{debug, info};

use crate::docs::{issue_doc_path, review_doc_path};

#[derive(Debug, Error)]
pub enum SkillError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("helper script not found: {}", .0.display())]
    MissingScript(PathBuf),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Contract(#[from] OutputContractError),
    #[error("{script} produced unexpected output: {detail}")]
    UnexpectedOutput { script: &'static str, detail: String },
}

/// The ghflow helper scripts, addressed relative to the skills directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillScript {
    CreateIssue,
    SaveIssue,
    CreateBranch,
    CommitChanges,
    CreatePr,
    FetchReviews,
    CheckApproval,
}

impl SkillScript {
    pub const ALL: [Self; 7] = [
        Self::CreateIssue,
        Self::SaveIssue,
        Self::CreateBranch,
        Self::CommitChanges,
        Self::CreatePr,
        Self::FetchReviews,
        Self::CheckApproval,
    ];

    pub const fn relative_path(self) -> &'static str {
        match self {
            Self::CreateIssue => "ghflow-issue-expander/scripts/create_issue.sh",
            Self::SaveIssue => "ghflow-issue-expander/scripts/save_issue.sh",
            Self::CreateBranch => "ghflow-feature-implementer/scripts/create_branch.sh",
            Self::CommitChanges => "ghflow-pr-creator/scripts/commit_changes.sh",
            Self::CreatePr => "ghflow-pr-creator/scripts/create_pr.sh",
            Self::FetchReviews => "ghflow-code-reviewer/scripts/fetch_reviews.sh",
            Self::CheckApproval => "ghflow-code-reviewer/scripts/check_approval.sh",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::CreateIssue => "create_issue.sh",
            Self::SaveIssue => "save_issue.sh",
            Self::CreateBranch => "create_branch.sh",
            Self::CommitChanges => "commit_changes.sh",
            Self::CreatePr => "create_pr.sh",
            Self::FetchReviews => "fetch_reviews.sh",
            Self::CheckApproval => "check_approval.sh",
        }
    }
}

/// Result of `check_approval.sh`. A non-zero exit is a valid "not approved"
/// answer rather than a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalStatus {
    pub approved: bool,
    pub status: String,
    pub detail: String,
}

impl ApprovalStatus {
    fn from_output(output: &CommandOutput) -> Self {
        let stdout = output.trimmed_stdout();
        let status = stdout
            .split_whitespace()
            .next()
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| "UNKNOWN".to_owned());
        let approved = output.success() && status.eq_ignore_ascii_case("approved");
        let detail = if stdout.is_empty() {
            output.stderr.trim().to_owned()
        } else {
            stdout.to_owned()
        };

        Self {
            approved,
            status,
            detail,
        }
    }
}

pub struct SkillScripts<R: CommandRunner = ProcessCommandRunner> {
    runner: R,
    bash: PathBuf,
    skills_dir: PathBuf,
    repo_root: PathBuf,
}

impl<R: CommandRunner> SkillScripts<R> {
    pub fn new(
        runner: R,
        bash: PathBuf,
        skills_dir: PathBuf,
        repo_root: PathBuf,
        allow_unsafe_command_paths: bool,
    ) -> Result<Self, SkillError> {
        validate_command_binary_path(&bash, "shell.bash_binary", allow_unsafe_command_paths)?;
        Ok(Self {
            runner,
            bash,
            skills_dir,
            repo_root,
        })
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn script_path(&self, script: SkillScript) -> PathBuf {
        self.skills_dir.join(script.relative_path())
    }

    pub fn ensure_present(&self, script: SkillScript) -> Result<PathBuf, SkillError> {
        let path = self.script_path(script);
        if !path.is_file() {
            return Err(SkillError::MissingScript(path));
        }

        Ok(path)
    }

    /// Scripts that are not installed under the skills directory.
    pub fn missing_scripts(&self) -> Vec<SkillScript> {
        SkillScript::ALL
            .into_iter()
            .filter(|script| !self.script_path(*script).is_file())
            .collect()
    }

    pub fn invocation_args(&self, script: SkillScript, args: &[&str]) -> Vec<OsString> {
        let mut invocation = vec![self.script_path(script).into_os_string()];
        invocation.extend(args.iter().map(OsString::from));
        invocation
    }

    fn run_script_unchecked(
        &self,
        script: SkillScript,
        args: &[&str],
    ) -> Result<CommandOutput, SkillError> {
        self.ensure_present(script)?;
        let program = self
            .bash
            .to_str()
            .ok_or_else(|| SkillError::Configuration("Invalid bash binary path".to_owned()))?;
        let invocation = self.invocation_args(script, args);
        let rendered = render_command(program, &invocation);
        Ok(execute(
            &self.runner,
            program,
            &invocation,
            Some(self.repo_root.as_path()),
            &rendered,
        )?)
    }

    fn run_script(&self, script: SkillScript, args: &[&str]) -> Result<String, SkillError> {
        Ok(self.run_script_unchecked(script, args)?.into_result()?)
    }

    pub fn create_issue(&self, title: &str, body: &str) -> Result<IssueNumber, SkillError> {
        let stdout = self.run_script(SkillScript::CreateIssue, &[title, body])?;
        let issue = parse_issue_number(&stdout)?;
        info!(%issue, "issue created");
        Ok(issue)
    }

    /// Writes `docs/issues/issue_<n>.md` and returns its path.
    pub fn save_issue(&self, issue: IssueNumber) -> Result<PathBuf, SkillError> {
        let number = issue.to_string();
        self.run_script(SkillScript::SaveIssue, &[number.as_str()])?;
        let path = issue_doc_path(&self.repo_root, issue);
        if !path.is_file() {
            return Err(SkillError::UnexpectedOutput {
                script: SkillScript::SaveIssue.name(),
                detail: format!("expected {} to exist", path.display()),
            });
        }

        Ok(path)
    }

    /// Creates the feature branch and returns its name, which the script
    /// prints as the last non-empty line of stdout.
    pub fn create_branch(&self, issue: IssueNumber, suffix: &str) -> Result<String, SkillError> {
        let number = issue.to_string();
        let stdout = self.run_script(SkillScript::CreateBranch, &[number.as_str(), suffix])?;
        let branch = stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .unwrap_or_default();
        if branch.is_empty() || branch.chars().any(char::is_whitespace) {
            return Err(SkillError::UnexpectedOutput {
                script: SkillScript::CreateBranch.name(),
                detail: format!("expected a branch name, got {stdout:?}"),
            });
        }

        info!(branch, "branch created");
        Ok(branch.to_owned())
    }

    pub fn commit_changes(&self, issue: IssueNumber, message: &str) -> Result<(), SkillError> {
        let number = issue.to_string();
        self.run_script(SkillScript::CommitChanges, &[number.as_str(), message])
            .map(|_| ())
    }

    pub fn create_pr(
        &self,
        issue: IssueNumber,
        title: &str,
        body: &str,
        base_branch: &str,
    ) -> Result<PrNumber, SkillError> {
        let number = issue.to_string();
        let stdout = self.run_script(
            SkillScript::CreatePr,
            &[number.as_str(), title, body, base_branch],
        )?;
        let pr = parse_pr_number(&stdout)?;
        info!(%pr, %issue, "pull request created");
        Ok(pr)
    }

    /// Aggregates review comments into `docs/coderabbit/pr_<n>.md`.
    pub fn fetch_reviews(&self, pr: PrNumber) -> Result<PathBuf, SkillError> {
        let number = pr.to_string();
        self.run_script(SkillScript::FetchReviews, &[number.as_str()])?;
        let path = review_doc_path(&self.repo_root, pr);
        if !path.is_file() {
            return Err(SkillError::UnexpectedOutput {
                script: SkillScript::FetchReviews.name(),
                detail: format!("expected {} to exist", path.display()),
            });
        }

        Ok(path)
    }

    pub fn check_approval(&self, pr: PrNumber) -> Result<ApprovalStatus, SkillError> {
        let number = pr.to_string();
        let output = self.run_script_unchecked(SkillScript::CheckApproval, &[number.as_str()])?;
        let status = ApprovalStatus::from_output(&output);
        debug!(%pr, approved = status.approved, status = %status.status, "approval checked");
        Ok(status)
    }
}
