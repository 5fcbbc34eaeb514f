use std::ffi::OsString;
use std::path::{Path, PathBuf};

use ghflow_command::{
    execute, render_command, validate_command_binary_path, CommandError, CommandOutput,
    CommandRunner, ProcessCommandRunner,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::identifiers::{parse_issue_number, IssueNumber, OutputContractError, PrNumber};

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Contract(#[from] OutputContractError),
    #[error("failed to decode `{command}` JSON output: {detail}")]
    Decode { command: String, detail: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    Merge,
    Squash,
    Rebase,
}

impl MergeStrategy {
    const fn flag(self) -> &'static str {
        match self {
            Self::Merge => "--merge",
            Self::Squash => "--squash",
            Self::Rebase => "--rebase",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Approve,
    Comment,
    RequestChanges,
}

impl ReviewAction {
    const fn flag(self) -> &'static str {
        match self {
            Self::Approve => "--approve",
            Self::Comment => "--comment",
            Self::RequestChanges => "--request-changes",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssueTitleBody {
    pub title: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Deserialize)]
struct GhLabelsView {
    #[serde(default)]
    labels: Vec<GhLabel>,
}

#[derive(Debug, Deserialize)]
struct GhLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GhBodyView {
    #[serde(default)]
    body: String,
}

#[derive(Debug, Deserialize)]
struct GhStateView {
    state: String,
}

/// Typed access to the `gh` binary. Calls run inside the repository passed in
/// so `gh` resolves the right remote.
pub struct GhCli<R: CommandRunner = ProcessCommandRunner> {
    runner: R,
    binary: PathBuf,
}

impl GhCli<ProcessCommandRunner> {
    pub fn system() -> Self {
        Self::with_binary(ProcessCommandRunner, PathBuf::from("gh"))
    }
}

impl<R: CommandRunner> GhCli<R> {
    pub fn new(
        runner: R,
        binary: PathBuf,
        allow_unsafe_command_paths: bool,
    ) -> Result<Self, GithubError> {
        validate_command_binary_path(&binary, "github.binary", allow_unsafe_command_paths)?;
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

    fn args(parts: &[&str]) -> Vec<OsString> {
        parts.iter().map(OsString::from).collect()
    }

    pub fn health_check_args() -> Vec<OsString> {
        Self::args(&["auth", "status"])
    }

    pub fn create_issue_args(title: &str, body: &str, labels: &[&str]) -> Vec<OsString> {
        let mut args = Self::args(&["issue", "create", "--title", title, "--body", body]);
        for label in labels.iter().map(|label| label.trim()).filter(|label| !label.is_empty()) {
            args.push(OsString::from("--label"));
            args.push(OsString::from(label));
        }
        args
    }

    pub fn issue_view_args(issue: IssueNumber, fields: &str) -> Vec<OsString> {
        let number = issue.to_string();
        Self::args(&["issue", "view", number.as_str(), "--json", fields])
    }

    pub fn edit_label_args(issue: IssueNumber, flag: &str, label: &str) -> Vec<OsString> {
        let number = issue.to_string();
        Self::args(&["issue", "edit", number.as_str(), flag, label])
    }

    pub fn close_issue_args(issue: IssueNumber) -> Vec<OsString> {
        let number = issue.to_string();
        Self::args(&["issue", "close", number.as_str()])
    }

    pub fn pr_view_args(pr: PrNumber, fields: &str) -> Vec<OsString> {
        let number = pr.to_string();
        Self::args(&["pr", "view", number.as_str(), "--json", fields])
    }

    pub fn comment_pr_args(pr: PrNumber, body: &str) -> Vec<OsString> {
        let number = pr.to_string();
        Self::args(&["pr", "comment", number.as_str(), "--body", body])
    }

    pub fn review_pr_args(pr: PrNumber, action: ReviewAction, body: &str) -> Vec<OsString> {
        let number = pr.to_string();
        let mut args = Self::args(&["pr", "review", number.as_str(), action.flag()]);
        if !body.trim().is_empty() {
            args.push(OsString::from("--body"));
            args.push(OsString::from(body));
        }
        args
    }

    pub fn merge_pr_args(pr: PrNumber, strategy: MergeStrategy) -> Vec<OsString> {
        let number = pr.to_string();
        Self::args(&["pr", "merge", number.as_str(), strategy.flag()])
    }

    pub fn close_pr_args(pr: PrNumber) -> Vec<OsString> {
        let number = pr.to_string();
        Self::args(&["pr", "close", number.as_str()])
    }

    pub fn create_repo_args(name: &str, private: bool) -> Vec<OsString> {
        let visibility = if private { "--private" } else { "--public" };
        Self::args(&["repo", "create", name, visibility])
    }

    pub fn clone_repo_args(name: &str, destination: &Path) -> Vec<OsString> {
        let mut args = Self::args(&["repo", "clone", name]);
        args.push(destination.as_os_str().to_owned());
        args
    }

    pub fn delete_repo_args(name: &str) -> Vec<OsString> {
        Self::args(&["repo", "delete", name, "--yes"])
    }

    fn run_gh_raw(&self, args: &[OsString], cwd: Option<&Path>) -> Result<CommandOutput, GithubError> {
        let program = self
            .binary
            .to_str()
            .ok_or_else(|| GithubError::Configuration("Invalid gh binary path".to_owned()))?;
        let rendered = render_command(program, args);
        Ok(execute(&self.runner, program, args, cwd, &rendered)?)
    }

    fn run_gh(&self, args: &[OsString], cwd: Option<&Path>) -> Result<String, GithubError> {
        Ok(self.run_gh_raw(args, cwd)?.into_result()?)
    }

    fn run_gh_json<T: DeserializeOwned>(
        &self,
        args: &[OsString],
        cwd: &Path,
    ) -> Result<T, GithubError> {
        let output = self.run_gh_raw(args, Some(cwd))?.check()?;
        serde_json::from_str(&output.stdout).map_err(|error| GithubError::Decode {
            command: output.command,
            detail: error.to_string(),
        })
    }

    /// Runs a close command, treating "already closed" as success so repeated
    /// cleanup stays quiet.
    fn run_gh_close(&self, args: &[OsString], cwd: &Path) -> Result<(), GithubError> {
        let output = self.run_gh_raw(args, Some(cwd))?;
        if output.success() {
            return Ok(());
        }

        let detail = format!("{} {}", output.stdout, output.stderr).to_ascii_lowercase();
        if Self::is_already_closed_error(&detail) {
            debug!(command = %output.command, "target already closed");
            return Ok(());
        }

        output.check().map(|_| ()).map_err(GithubError::from)
    }

    fn is_already_closed_error(detail: &str) -> bool {
        detail.contains("already closed") || detail.contains("already merged")
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), GithubError> {
        if value.trim().is_empty() {
            return Err(GithubError::Configuration(format!(
                "{field} must be a non-empty string."
            )));
        }

        Ok(())
    }

    pub fn health_check(&self) -> Result<(), GithubError> {
        self.run_gh(&Self::health_check_args(), None).map(|_| ())
    }

    pub fn create_issue(
        &self,
        repo: &Path,
        title: &str,
        body: &str,
        labels: &[&str],
    ) -> Result<IssueNumber, GithubError> {
        Self::ensure_non_empty(title, "Issue title")?;
        let stdout = self.run_gh(&Self::create_issue_args(title, body, labels), Some(repo))?;
        Ok(parse_issue_number(&stdout)?)
    }

    pub fn issue_labels(&self, repo: &Path, issue: IssueNumber) -> Result<Vec<String>, GithubError> {
        let view: GhLabelsView = self.run_gh_json(&Self::issue_view_args(issue, "labels"), repo)?;
        Ok(view.labels.into_iter().map(|label| label.name).collect())
    }

    pub fn issue_title_body(
        &self,
        repo: &Path,
        issue: IssueNumber,
    ) -> Result<IssueTitleBody, GithubError> {
        self.run_gh_json(&Self::issue_view_args(issue, "title,body"), repo)
    }

    pub fn issue_state(&self, repo: &Path, issue: IssueNumber) -> Result<String, GithubError> {
        let view: GhStateView = self.run_gh_json(&Self::issue_view_args(issue, "state"), repo)?;
        Ok(view.state)
    }

    pub fn add_label(&self, repo: &Path, issue: IssueNumber, label: &str) -> Result<(), GithubError> {
        Self::ensure_non_empty(label, "Label")?;
        self.run_gh(&Self::edit_label_args(issue, "--add-label", label), Some(repo))
            .map(|_| ())
    }

    pub fn remove_label(
        &self,
        repo: &Path,
        issue: IssueNumber,
        label: &str,
    ) -> Result<(), GithubError> {
        Self::ensure_non_empty(label, "Label")?;
        self.run_gh(&Self::edit_label_args(issue, "--remove-label", label), Some(repo))
            .map(|_| ())
    }

    pub fn close_issue(&self, repo: &Path, issue: IssueNumber) -> Result<(), GithubError> {
        self.run_gh_close(&Self::close_issue_args(issue), repo)
    }

    pub fn pr_body(&self, repo: &Path, pr: PrNumber) -> Result<String, GithubError> {
        let view: GhBodyView = self.run_gh_json(&Self::pr_view_args(pr, "body"), repo)?;
        Ok(view.body)
    }

    pub fn pr_state(&self, repo: &Path, pr: PrNumber) -> Result<String, GithubError> {
        let view: GhStateView = self.run_gh_json(&Self::pr_view_args(pr, "state"), repo)?;
        Ok(view.state)
    }

    pub fn comment_pr(&self, repo: &Path, pr: PrNumber, body: &str) -> Result<(), GithubError> {
        Self::ensure_non_empty(body, "Comment body")?;
        self.run_gh(&Self::comment_pr_args(pr, body), Some(repo))
            .map(|_| ())
    }

    pub fn review_pr(
        &self,
        repo: &Path,
        pr: PrNumber,
        action: ReviewAction,
        body: &str,
    ) -> Result<(), GithubError> {
        if action != ReviewAction::Approve {
            Self::ensure_non_empty(body, "Review body")?;
        }
        self.run_gh(&Self::review_pr_args(pr, action, body), Some(repo))
            .map(|_| ())
    }

    pub fn merge_pr(
        &self,
        repo: &Path,
        pr: PrNumber,
        strategy: MergeStrategy,
    ) -> Result<(), GithubError> {
        self.run_gh(&Self::merge_pr_args(pr, strategy), Some(repo))
            .map(|_| ())
    }

    pub fn close_pr(&self, repo: &Path, pr: PrNumber) -> Result<(), GithubError> {
        self.run_gh_close(&Self::close_pr_args(pr), repo)
    }

    pub fn create_repo(&self, workdir: &Path, name: &str, private: bool) -> Result<(), GithubError> {
        Self::ensure_non_empty(name, "Repository name")?;
        self.run_gh(&Self::create_repo_args(name, private), Some(workdir))
            .map(|_| ())
    }

    pub fn clone_repo(
        &self,
        workdir: &Path,
        name: &str,
        destination: &Path,
    ) -> Result<(), GithubError> {
        Self::ensure_non_empty(name, "Repository name")?;
        self.run_gh(&Self::clone_repo_args(name, destination), Some(workdir))
            .map(|_| ())
    }

    pub fn delete_repo(&self, workdir: &Path, name: &str) -> Result<(), GithubError> {
        Self::ensure_non_empty(name, "Repository name")?;
        self.run_gh(&Self::delete_repo_args(name), Some(workdir))
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::Mutex;

    struct StubRunner {
        calls: Mutex<Vec<(String, Vec<OsString>, Option<PathBuf>)>>,
        results: Mutex<VecDeque<io::Result<std::process::Output>>>,
    }

    impl StubRunner {
        fn with_results(results: Vec<io::Result<std::process::Output>>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                results: Mutex::new(VecDeque::from(results)),
            }
        }
    }

    impl CommandRunner for StubRunner {
        fn run(
            &self,
            program: &str,
            args: &[OsString],
            cwd: Option<&Path>,
        ) -> io::Result<std::process::Output> {
            self.calls.lock().expect("lock").push((
                program.to_owned(),
                args.to_vec(),
                cwd.map(Path::to_path_buf),
            ));

            self.results
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| {
                    Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "missing stubbed command output",
                    ))
                })
        }
    }

    fn output(status_code: i32, stdout: &str, stderr: &str) -> std::process::Output {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            std::process::Output {
                status: std::process::ExitStatus::from_raw(status_code << 8),
                stdout: stdout.as_bytes().to_vec(),
                stderr: stderr.as_bytes().to_vec(),
            }
        }
        #[cfg(windows)]
        {
            use std::os::windows::process::ExitStatusExt;
            std::process::Output {
                status: std::process::ExitStatus::from_raw(status_code as u32),
                stdout: stdout.as_bytes().to_vec(),
                stderr: stderr.as_bytes().to_vec(),
            }
        }
    }

    fn repo() -> PathBuf {
        PathBuf::from("/tmp/ghflow/repo")
    }

    fn client(results: Vec<io::Result<std::process::Output>>) -> GhCli<StubRunner> {
        GhCli::with_binary(StubRunner::with_results(results), PathBuf::from("gh"))
    }

    fn issue(value: u64) -> IssueNumber {
        IssueNumber::new(value).expect("issue number")
    }

    fn pr(value: u64) -> PrNumber {
        PrNumber::new(value).expect("pr number")
    }

    #[test]
    fn health_check_runs_outside_any_repository() {
        let gh = client(vec![Ok(output(0, "", "Logged in to github.com"))]);
        gh.health_check().expect("health check");

        let calls = gh.runner().calls.lock().expect("lock");
        assert_eq!(calls[0].0, "gh");
        assert_eq!(calls[0].1, GhCli::<ProcessCommandRunner>::health_check_args());
        assert!(calls[0].2.is_none());
    }

    #[test]
    fn missing_gh_binary_is_actionable() {
        let gh = client(vec![Err(io::Error::new(io::ErrorKind::NotFound, "missing"))]);
        let err = gh.health_check().expect_err("expected error");
        assert!(err.to_string().contains("`gh` was not found"));
    }

    #[test]
    fn create_issue_passes_labels_and_parses_url() {
        let gh = client(vec![Ok(output(
            0,
            "https://github.com/octo/ghflow/issues/31\n",
            "",
        ))]);

        let number = gh
            .create_issue(&repo(), "Test E2E Workflow", "# Body", &["HF-required", " "])
            .expect("create issue");

        assert_eq!(number, issue(31));
        let calls = gh.runner().calls.lock().expect("lock");
        assert_eq!(
            calls[0].1,
            vec![
                OsString::from("issue"),
                OsString::from("create"),
                OsString::from("--title"),
                OsString::from("Test E2E Workflow"),
                OsString::from("--body"),
                OsString::from("# Body"),
                OsString::from("--label"),
                OsString::from("HF-required"),
            ]
        );
        assert_eq!(calls[0].2, Some(repo()));
    }

    #[test]
    fn issue_labels_decodes_label_names() {
        let gh = client(vec![Ok(output(
            0,
            r#"{"labels":[{"id":"L1","name":"HF-required","color":"ff0000"},{"name":"enhancement"}]}"#,
            "",
        ))]);

        let labels = gh.issue_labels(&repo(), issue(5)).expect("labels");

        assert_eq!(labels, vec!["HF-required".to_owned(), "enhancement".to_owned()]);
        let calls = gh.runner().calls.lock().expect("lock");
        assert_eq!(
            calls[0].1,
            GhCli::<ProcessCommandRunner>::issue_view_args(issue(5), "labels")
        );
    }

    #[test]
    fn issue_title_body_decodes_both_fields() {
        let gh = client(vec![Ok(output(
            0,
            r###"{"title":"Test E2E Workflow","body":"## Problem"}"###,
            "",
        ))]);

        let view = gh.issue_title_body(&repo(), issue(5)).expect("view");
        assert_eq!(view.title, "Test E2E Workflow");
        assert_eq!(view.body, "## Problem");
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let gh = client(vec![Ok(output(0, "not json", ""))]);

        let err = gh.pr_body(&repo(), pr(8)).expect_err("decode failure");
        assert!(matches!(err, GithubError::Decode { .. }));
        assert!(err.to_string().contains("gh pr view 8 --json body"));
    }

    #[test]
    fn remove_label_uses_issue_edit() {
        let gh = client(vec![Ok(output(0, "", ""))]);

        gh.remove_label(&repo(), issue(12), "HF-required")
            .expect("remove label");

        let calls = gh.runner().calls.lock().expect("lock");
        assert_eq!(
            calls[0].1,
            vec![
                OsString::from("issue"),
                OsString::from("edit"),
                OsString::from("12"),
                OsString::from("--remove-label"),
                OsString::from("HF-required"),
            ]
        );
    }

    #[test]
    fn add_label_uses_issue_edit_and_rejects_blank_labels() {
        let gh = client(vec![Ok(output(0, "", ""))]);

        let err = gh
            .add_label(&repo(), issue(12), "  ")
            .expect_err("blank label");
        assert!(err.to_string().contains("Label"));
        assert!(gh.runner().calls.lock().expect("lock").is_empty());

        gh.add_label(&repo(), issue(12), "HF-required")
            .expect("add label");

        let calls = gh.runner().calls.lock().expect("lock");
        assert_eq!(
            calls[0].1,
            vec![
                OsString::from("issue"),
                OsString::from("edit"),
                OsString::from("12"),
                OsString::from("--add-label"),
                OsString::from("HF-required"),
            ]
        );
        assert_eq!(calls[0].2, Some(repo()));
    }

    #[test]
    fn close_issue_is_idempotent_when_already_closed() {
        let gh = client(vec![Ok(output(
            1,
            "",
            "! Issue octo/ghflow#12 (Test E2E Workflow) is already closed",
        ))]);

        gh.close_issue(&repo(), issue(12)).expect("already closed is fine");
    }

    #[test]
    fn close_pr_surfaces_other_failures() {
        let gh = client(vec![Ok(output(
            1,
            "",
            "GraphQL: Could not resolve to a PullRequest with the number of 99999.",
        ))]);

        let err = gh.close_pr(&repo(), pr(99999)).expect_err("missing pr");
        assert!(err.to_string().contains("gh pr close 99999"));
        assert!(err.to_string().contains("Could not resolve"));
    }

    #[test]
    fn review_pr_requires_body_unless_approving() {
        let gh = client(vec![Ok(output(0, "", ""))]);

        let err = gh
            .review_pr(&repo(), pr(3), ReviewAction::Comment, " ")
            .expect_err("blank comment review");
        assert!(err.to_string().contains("Review body"));

        gh.review_pr(&repo(), pr(3), ReviewAction::Approve, "")
            .expect("approve without body");
        let calls = gh.runner().calls.lock().expect("lock");
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].1,
            vec![
                OsString::from("pr"),
                OsString::from("review"),
                OsString::from("3"),
                OsString::from("--approve"),
            ]
        );
    }

    #[test]
    fn merge_pr_uses_strategy_flag() {
        assert_eq!(
            GhCli::<ProcessCommandRunner>::merge_pr_args(pr(4), MergeStrategy::Squash),
            vec![
                OsString::from("pr"),
                OsString::from("merge"),
                OsString::from("4"),
                OsString::from("--squash"),
            ]
        );
    }

    #[test]
    fn repository_lifecycle_commands_are_confirmed_and_scoped() {
        assert_eq!(
            GhCli::<ProcessCommandRunner>::create_repo_args("octo/ghflow-e2e-1", true),
            vec![
                OsString::from("repo"),
                OsString::from("create"),
                OsString::from("octo/ghflow-e2e-1"),
                OsString::from("--private"),
            ]
        );
        assert_eq!(
            GhCli::<ProcessCommandRunner>::delete_repo_args("octo/ghflow-e2e-1"),
            vec![
                OsString::from("repo"),
                OsString::from("delete"),
                OsString::from("octo/ghflow-e2e-1"),
                OsString::from("--yes"),
            ]
        );
        assert_eq!(
            GhCli::<ProcessCommandRunner>::clone_repo_args(
                "octo/ghflow-e2e-1",
                Path::new("/tmp/clone")
            )
            .last(),
            Some(&OsString::from("/tmp/clone"))
        );
    }
}
