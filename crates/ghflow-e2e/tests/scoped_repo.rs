//! Scoped repository behaviour against a real local git repository with a
//! bare remote. GitHub calls are routed to `true` so nothing leaves the machine.

use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use ghflow_command::{ProcessCommandRunner, Shell};
use ghflow_config::{BinaryConfig, GhflowConfig};
use ghflow_e2e::{binary_available, fixture_dir, HELLO_WORLD_FIXTURE};
use ghflow_git::GitCli;
use ghflow_harness::{init_test_logging_with, ScopeConfig, TestRepo, BACKUP_SUFFIX};
use tempfile::TempDir;

const ORIGINAL_MAIN: &str = "print('original program')\n";

struct LocalRepo {
    _dir: TempDir,
    root: PathBuf,
}

impl LocalRepo {
    fn scope(&self) -> ScopeConfig {
        ScopeConfig::new(&self.root).with_fixture(fixture_dir(HELLO_WORLD_FIXTURE))
    }

    fn git(&self) -> GitCli {
        GitCli::system()
    }
}

fn offline_binaries() -> BinaryConfig {
    let mut binaries = GhflowConfig::default().binaries();
    binaries.gh = PathBuf::from("true");
    binaries
}

fn enter(config: ScopeConfig) -> Result<TestRepo> {
    TestRepo::enter_with_binaries(config, ProcessCommandRunner, &offline_binaries())
        .context("enter scoped repository")
}

/// A work tree on `main` with one commit pushed to a bare `origin`. `None`
/// when git is not installed.
fn local_repo() -> Result<Option<LocalRepo>> {
    init_test_logging_with("debug");
    if !binary_available("git") {
        eprintln!("git is not available; skipping scoped repository test");
        return Ok(None);
    }

    let dir = tempfile::tempdir()?;
    let shell = Shell::system();
    shell.run("git init --quiet --bare remote.git", Some(dir.path()))?;
    shell.run("git init --quiet work", Some(dir.path()))?;

    let root = dir.path().join("work");
    for command in [
        "git checkout --quiet -b main",
        "git config user.email ghflow@example.com",
        "git config user.name ghflow",
        "git config commit.gpgsign false",
        "git remote add origin ../remote.git",
    ] {
        shell.run(command, Some(root.as_path()))?;
    }
    fs::write(root.join("main.py"), ORIGINAL_MAIN)?;
    fs::write(root.join("README.md"), "# scratch\n")?;
    shell.run("git add --all", Some(root.as_path()))?;
    shell.run("git commit --quiet -m initial", Some(root.as_path()))?;
    shell.run("git push --quiet -u origin main", Some(root.as_path()))?;

    Ok(Some(LocalRepo { _dir: dir, root }))
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

#[test]
fn staged_fixture_is_reverted_and_tree_left_clean() -> Result<()> {
    let Some(repo) = local_repo()? else {
        return Ok(());
    };

    let mut scoped = enter(repo.scope())?;
    ensure!(read(&repo.root.join("main.py"))?.contains("Hello, World!"));
    ensure!(repo.root.join("CLAUDE.md").is_file());
    ensure!(repo.root.join(format!("main.py{BACKUP_SUFFIX}")).is_file());

    let report = scoped.teardown();

    ensure!(report.is_clean(), "teardown failures: {:?}", report.failures);
    assert_eq!(read(&repo.root.join("main.py"))?, ORIGINAL_MAIN);
    ensure!(!repo.root.join("CLAUDE.md").exists());
    ensure!(!repo.root.join("test_main.py").exists());
    ensure!(repo.git().is_clean(&repo.root)?, "working tree is dirty");
    Ok(())
}

#[test]
fn tracked_branch_is_deleted_locally_and_remotely() -> Result<()> {
    let Some(repo) = local_repo()? else {
        return Ok(());
    };
    let git = repo.git();
    let branch = "feature/1-e2e-test";

    let mut scoped = enter(ScopeConfig::new(&repo.root))?;
    ensure!(scoped.original_branch() == "main");
    git.create_branch(&repo.root, branch)?;
    ensure!(scoped.track_branch(branch));
    fs::write(repo.root.join("feature.txt"), "change\n")?;
    git.add_all(&repo.root)?;
    git.commit(&repo.root, "test e2e workflow")?;
    git.push_upstream(&repo.root, "origin", branch)?;
    ensure!(git.remote_branch_exists(&repo.root, "origin", branch)?);

    let report = scoped.teardown();

    ensure!(report.is_clean(), "teardown failures: {:?}", report.failures);
    assert_eq!(git.current_branch(&repo.root)?, "main");
    ensure!(!git.local_branch_exists(&repo.root, branch)?);
    ensure!(!git.remote_branch_exists(&repo.root, "origin", branch)?);
    ensure!(!repo.root.join("feature.txt").exists());
    Ok(())
}

#[test]
fn second_teardown_does_nothing() -> Result<()> {
    let Some(repo) = local_repo()? else {
        return Ok(());
    };

    let mut scoped = enter(repo.scope())?;
    scoped.track_branch("feature/2-never-created");
    let first = scoped.teardown();
    let second = scoped.teardown();

    ensure!(first.is_clean(), "teardown failures: {:?}", first.failures);
    assert_eq!(second.attempted, 0);
    assert_eq!(read(&repo.root.join("main.py"))?, ORIGINAL_MAIN);
    Ok(())
}

#[test]
fn panicking_body_still_restores_the_tree() -> Result<()> {
    let Some(repo) = local_repo()? else {
        return Ok(());
    };
    let config = repo.scope();

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let mut scoped = enter(config).expect("enter");
        scoped.track_file("README.md").expect("track README.md");
        fs::write(scoped.repo_root().join("README.md"), "# scratch\n\n<!-- E2E Test -->\n")
            .expect("edit README.md");
        panic!("simulated assertion failure");
    }));

    ensure!(outcome.is_err());
    assert_eq!(read(&repo.root.join("main.py"))?, ORIGINAL_MAIN);
    assert_eq!(read(&repo.root.join("README.md"))?, "# scratch\n");
    ensure!(repo.git().is_clean(&repo.root)?, "working tree is dirty");
    Ok(())
}

#[test]
fn tracked_issue_removes_generated_docs() -> Result<()> {
    let Some(repo) = local_repo()? else {
        return Ok(());
    };
    let issue_doc = repo.root.join("docs/issues/issue_42.md");
    let task_doc = repo.root.join("docs/tasks/issue-42.md");

    let mut scoped = enter(ScopeConfig::new(&repo.root))?;
    for doc in [&issue_doc, &task_doc] {
        fs::create_dir_all(doc.parent().context("doc parent")?)?;
        fs::write(doc, "# Issue 42\n")?;
    }
    ensure!(scoped.track_issue("42".parse()?));

    let report = scoped.teardown();

    ensure!(report.is_clean(), "teardown failures: {:?}", report.failures);
    ensure!(!issue_doc.exists());
    ensure!(!task_doc.exists());
    Ok(())
}
