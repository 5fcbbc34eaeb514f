//! Documentation files the helper scripts generate for issues and pull requests.

use std::path::{Path, PathBuf};

use ghflow_github::{IssueNumber, PrNumber};

pub fn issue_doc_path(repo_root: &Path, issue: IssueNumber) -> PathBuf {
    repo_root
        .join("docs")
        .join("issues")
        .join(format!("issue_{issue}.md"))
}

pub fn task_doc_path(repo_root: &Path, issue: IssueNumber) -> PathBuf {
    repo_root
        .join("docs")
        .join("tasks")
        .join(format!("issue-{issue}.md"))
}

pub fn review_doc_path(repo_root: &Path, pr: PrNumber) -> PathBuf {
    repo_root
        .join("docs")
        .join("coderabbit")
        .join(format!("pr_{pr}.md"))
}

/// Every generated document that may exist for the given issues and PRs.
pub fn tracked_doc_paths(repo_root: &Path, issues: &[IssueNumber], prs: &[PrNumber]) -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(issues.len() * 2 + prs.len());
    for issue in issues {
        paths.push(issue_doc_path(repo_root, *issue));
        paths.push(task_doc_path(repo_root, *issue));
    }
    paths.extend(prs.iter().map(|pr| review_doc_path(repo_root, *pr)));
    paths
}
