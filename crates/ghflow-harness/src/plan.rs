use std::fmt;
use std::path::{Path, PathBuf};

use ghflow_github::{IssueNumber, PrNumber};
use ghflow_skills::tracked_doc_paths;

use crate::{StagedFile, TrackedArtifacts};

/// One independent step of teardown. Every action is a no-op when its target
/// is already gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReversalAction {
    RestoreBackup { original: PathBuf, backup: PathBuf },
    RestoreContents { path: PathBuf, contents: Vec<u8> },
    RemoveFile(PathBuf),
    RemoveEmptyDir(PathBuf),
    /// Skipped when the branch is already checked out.
    CheckoutBranch(String),
    DeleteLocalBranch(String),
    DeleteRemoteBranch { remote: String, branch: String },
    ClosePr(PrNumber),
    CloseIssue(IssueNumber),
    DeleteRepo(String),
}

impl fmt::Display for ReversalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RestoreBackup { original, .. } => write!(f, "restore {}", original.display()),
            Self::RestoreContents { path, .. } => write!(f, "restore contents of {}", path.display()),
            Self::RemoveFile(path) => write!(f, "remove {}", path.display()),
            Self::RemoveEmptyDir(path) => write!(f, "remove directory {}", path.display()),
            Self::CheckoutBranch(branch) => write!(f, "check out {branch}"),
            Self::DeleteLocalBranch(branch) => write!(f, "delete local branch {branch}"),
            Self::DeleteRemoteBranch { remote, branch } => {
                write!(f, "delete remote branch {remote}/{branch}")
            }
            Self::ClosePr(pr) => write!(f, "close pull request #{pr}"),
            Self::CloseIssue(issue) => write!(f, "close issue #{issue}"),
            Self::DeleteRepo(name) => write!(f, "delete repository {name}"),
        }
    }
}

/// Orders the reversal of `artifacts`: files (newest first) and the
/// directories created for them, generated docs, the original branch,
/// branches, pull requests, issues and finally scratch repositories.
pub(crate) fn reversal_plan(
    artifacts: &TrackedArtifacts,
    repo_root: &Path,
    original_branch: &str,
    remote: &str,
) -> Vec<ReversalAction> {
    let mut plan = Vec::new();

    for file in artifacts.files().iter().rev() {
        plan.push(match file {
            StagedFile::New(path) => ReversalAction::RemoveFile(path.clone()),
            StagedFile::BackedUp { original, backup } => ReversalAction::RestoreBackup {
                original: original.clone(),
                backup: backup.clone(),
            },
            StagedFile::Snapshot { path, contents } => ReversalAction::RestoreContents {
                path: path.clone(),
                contents: contents.clone(),
            },
        });
    }
    plan.extend(
        artifacts
            .created_dirs()
            .iter()
            .rev()
            .cloned()
            .map(ReversalAction::RemoveEmptyDir),
    );

    plan.extend(
        tracked_doc_paths(repo_root, artifacts.issues(), artifacts.prs())
            .into_iter()
            .map(ReversalAction::RemoveFile),
    );

    plan.push(ReversalAction::CheckoutBranch(original_branch.to_owned()));

    for branch in artifacts.branches() {
        plan.push(ReversalAction::DeleteLocalBranch(branch.clone()));
        plan.push(ReversalAction::DeleteRemoteBranch {
            remote: remote.to_owned(),
            branch: branch.clone(),
        });
    }
    plan.extend(artifacts.prs().iter().copied().map(ReversalAction::ClosePr));
    plan.extend(artifacts.issues().iter().copied().map(ReversalAction::CloseIssue));
    plan.extend(
        artifacts
            .scratch_repos()
            .iter()
            .cloned()
            .map(ReversalAction::DeleteRepo),
    );

    plan
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownFailure {
    pub action: ReversalAction,
    pub error: String,
}

/// Outcome of a teardown. Failures are collected, never raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub attempted: usize,
    pub failures: Vec<TeardownFailure>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.attempted.saturating_sub(self.failures.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_reverses_files_before_remote_state() {
        let root = Path::new("/repo");
        let mut artifacts = TrackedArtifacts::new();
        artifacts.add_created_dir(root.join("pkg"));
        artifacts.add_file(StagedFile::BackedUp {
            original: root.join("main.py"),
            backup: root.join("main.py.ghflow-backup"),
        });
        artifacts.add_file(StagedFile::New(root.join("pkg/util.py")));
        artifacts.add_branch("feature/42-e2e-test".to_owned());
        artifacts.add_issue("42".parse().expect("issue"));
        artifacts.add_pr("43".parse().expect("pr"));

        let plan = reversal_plan(&artifacts, root, "main", "origin");
        let rendered: Vec<String> = plan.iter().map(ToString::to_string).collect();

        assert_eq!(
            rendered,
            vec![
                "remove /repo/pkg/util.py",
                "restore /repo/main.py",
                "remove directory /repo/pkg",
                "remove /repo/docs/issues/issue_42.md",
                "remove /repo/docs/tasks/issue-42.md",
                "remove /repo/docs/coderabbit/pr_43.md",
                "check out main",
                "delete local branch feature/42-e2e-test",
                "delete remote branch origin/feature/42-e2e-test",
                "close pull request #43",
                "close issue #42",
            ]
        );
    }

    #[test]
    fn empty_artifacts_only_return_to_the_original_branch() {
        let plan = reversal_plan(&TrackedArtifacts::new(), Path::new("/repo"), "dev", "origin");
        assert_eq!(plan, vec![ReversalAction::CheckoutBranch("dev".to_owned())]);
    }

    #[test]
    fn report_counts_successes() {
        let report = TeardownReport {
            attempted: 3,
            failures: vec![TeardownFailure {
                action: ReversalAction::CloseIssue("5".parse().expect("issue")),
                error: "network down".to_owned(),
            }],
        };
        assert!(!report.is_clean());
        assert_eq!(report.succeeded(), 2);
    }
}
