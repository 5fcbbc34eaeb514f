use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{HarnessError, StagedFile, TrackedArtifacts};

/// Appended to a pre-existing file's name while a fixture file stands in for it.
pub const BACKUP_SUFFIX: &str = ".ghflow-backup";

pub(crate) fn backup_path(original: &Path) -> PathBuf {
    let mut name = original.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Copies every file under `fixture_dir` into `repo_root`. Each step is
/// recorded before the next one starts, so a failure part way leaves an
/// artifact set that still reverses what was done.
pub(crate) fn stage_fixture(
    fixture_dir: &Path,
    repo_root: &Path,
    artifacts: &mut TrackedArtifacts,
) -> Result<(), HarnessError> {
    if !fixture_dir.is_dir() {
        return Err(HarnessError::Configuration(format!(
            "fixture directory '{}' does not exist",
            fixture_dir.display()
        )));
    }

    for relative in fixture_files(fixture_dir)? {
        let source = fixture_dir.join(&relative);
        let destination = repo_root.join(&relative);
        create_missing_dirs(&destination, artifacts)?;

        if destination.exists() {
            let backup = backup_path(&destination);
            if backup.exists() {
                return Err(HarnessError::Configuration(format!(
                    "backup '{}' already exists; an earlier run did not restore it",
                    backup.display()
                )));
            }
            fs::rename(&destination, &backup)
                .map_err(|source| HarnessError::io("back up", &destination, source))?;
            artifacts.add_file(StagedFile::BackedUp {
                original: destination.clone(),
                backup,
            });
        } else {
            artifacts.add_file(StagedFile::New(destination.clone()));
        }

        fs::copy(&source, &destination)
            .map_err(|source| HarnessError::io("stage fixture file", &destination, source))?;
        debug!(file = %relative.display(), "staged fixture file");
    }

    Ok(())
}

/// Records the current bytes of `path` so the body may edit it in place, or
/// marks it new when it does not exist yet.
pub(crate) fn snapshot_file(path: &Path) -> Result<StagedFile, HarnessError> {
    match fs::read(path) {
        Ok(contents) => Ok(StagedFile::Snapshot {
            path: path.to_path_buf(),
            contents,
        }),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            Ok(StagedFile::New(path.to_path_buf()))
        }
        Err(error) => Err(HarnessError::io("snapshot", path, error)),
    }
}

/// Parent directories of `path` that do not exist yet, outermost first.
pub(crate) fn missing_parent_dirs(path: &Path) -> Vec<PathBuf> {
    let Some(parent) = path.parent() else {
        return Vec::new();
    };
    let mut missing: Vec<PathBuf> = parent
        .ancestors()
        .take_while(|ancestor| !ancestor.as_os_str().is_empty() && !ancestor.exists())
        .map(Path::to_path_buf)
        .collect();
    missing.reverse();
    missing
}

fn create_missing_dirs(file: &Path, artifacts: &mut TrackedArtifacts) -> Result<(), HarnessError> {
    for created in missing_parent_dirs(file) {
        fs::create_dir(&created)
            .map_err(|source| HarnessError::io("create directory", &created, source))?;
        artifacts.add_created_dir(created);
    }

    Ok(())
}

fn fixture_files(fixture_dir: &Path) -> Result<Vec<PathBuf>, HarnessError> {
    let mut files = Vec::new();
    let mut pending = vec![PathBuf::new()];
    while let Some(relative) = pending.pop() {
        let dir = fixture_dir.join(&relative);
        let entries =
            fs::read_dir(&dir).map_err(|source| HarnessError::io("read fixture directory", &dir, source))?;
        for entry in entries {
            let entry =
                entry.map_err(|source| HarnessError::io("read fixture directory", &dir, source))?;
            let path = relative.join(entry.file_name());
            let file_type = entry
                .file_type()
                .map_err(|source| HarnessError::io("inspect fixture entry", &entry.path(), source))?;
            if file_type.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}
