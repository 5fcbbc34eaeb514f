use std::path::{Path, PathBuf};

use ghflow_github::{IssueNumber, PrNumber};

/// A working-tree file the scope is responsible for putting back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedFile {
    /// Did not exist before the scope; removed at teardown.
    New(PathBuf),
    /// Pre-existing file renamed aside to `backup`; moved back at teardown.
    BackedUp { original: PathBuf, backup: PathBuf },
    /// Pre-existing file modified in place; original bytes written back at teardown.
    Snapshot { path: PathBuf, contents: Vec<u8> },
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        match self {
            Self::New(path) => path,
            Self::BackedUp { original, .. } => original,
            Self::Snapshot { path, .. } => path,
        }
    }
}

/// Everything a scope has created and must reverse. Sets keep insertion
/// order and ignore duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedArtifacts {
    files: Vec<StagedFile>,
    created_dirs: Vec<PathBuf>,
    branches: Vec<String>,
    issues: Vec<IssueNumber>,
    prs: Vec<PrNumber>,
    scratch_repos: Vec<String>,
}

fn insert_unique<T: PartialEq>(items: &mut Vec<T>, item: T) -> bool {
    if items.contains(&item) {
        return false;
    }
    items.push(item);
    true
}

impl TrackedArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &[StagedFile] {
        &self.files
    }

    pub fn created_dirs(&self) -> &[PathBuf] {
        &self.created_dirs
    }

    pub fn branches(&self) -> &[String] {
        &self.branches
    }

    pub fn issues(&self) -> &[IssueNumber] {
        &self.issues
    }

    pub fn prs(&self) -> &[PrNumber] {
        &self.prs
    }

    pub fn scratch_repos(&self) -> &[String] {
        &self.scratch_repos
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
            && self.created_dirs.is_empty()
            && self.branches.is_empty()
            && self.issues.is_empty()
            && self.prs.is_empty()
            && self.scratch_repos.is_empty()
    }

    pub fn is_file_tracked(&self, path: &Path) -> bool {
        self.files.iter().any(|file| file.path() == path)
    }

    /// Returns `false` when a file at the same path is already tracked.
    pub fn add_file(&mut self, file: StagedFile) -> bool {
        if self.is_file_tracked(file.path()) {
            return false;
        }
        self.files.push(file);
        true
    }

    pub fn remove_file(&mut self, path: &Path) -> Option<StagedFile> {
        let index = self.files.iter().position(|file| file.path() == path)?;
        Some(self.files.remove(index))
    }

    pub fn add_created_dir(&mut self, dir: PathBuf) -> bool {
        insert_unique(&mut self.created_dirs, dir)
    }

    pub fn add_branch(&mut self, branch: String) -> bool {
        insert_unique(&mut self.branches, branch)
    }

    pub fn add_issue(&mut self, issue: IssueNumber) -> bool {
        insert_unique(&mut self.issues, issue)
    }

    pub fn add_pr(&mut self, pr: PrNumber) -> bool {
        insert_unique(&mut self.prs, pr)
    }

    pub fn add_scratch_repo(&mut self, name: String) -> bool {
        insert_unique(&mut self.scratch_repos, name)
    }

    /// Empties the set, handing back what it held.
    pub fn drain(&mut self) -> Self {
        std::mem::take(self)
    }
}
