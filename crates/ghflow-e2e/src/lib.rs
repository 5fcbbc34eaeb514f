//! Fixtures and environment plumbing shared by the ghflow end-to-end suites.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use ghflow_command::{CommandRunner, ProcessCommandRunner};
use ghflow_config::{GhflowConfig, ENV_GHFLOW_CONFIG, ENV_GHFLOW_E2E};
use ghflow_harness::{HarnessError, ScopeConfig};
use ghflow_skills::SkillScripts;
use tracing::info;

pub const HELLO_WORLD_FIXTURE: &str = "hello-world";

pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

pub fn fixture_dir(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

/// Root of the ghflow workspace, two levels above this crate.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .ancestors()
        .nth(2)
        .unwrap_or(manifest_dir)
        .to_path_buf()
}

/// Whether `binary --version` runs and exits zero.
pub fn binary_available(binary: &str) -> bool {
    ProcessCommandRunner
        .run(binary, &[OsString::from("--version")], None)
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Everything the live workflow suite needs: configuration, where to scope
/// the repository, and the helper scripts.
pub struct E2eEnvironment {
    pub config: GhflowConfig,
    pub scope: ScopeConfig,
    pub skills: SkillScripts,
}

impl E2eEnvironment {
    /// Loads configuration and returns `None` unless `GHFLOW_E2E` (or
    /// `e2e.enabled`) turns the live suite on. Without `GHFLOW_CONFIG` the
    /// workflow runs against this workspace.
    pub fn from_env() -> Result<Option<Self>, HarnessError> {
        let mut config = ghflow_config::load_from_env()?;
        if !config.e2e.enabled {
            info!("{ENV_GHFLOW_E2E} is not set; skipping live GitHub workflow");
            return Ok(None);
        }
        if std::env::var_os(ENV_GHFLOW_CONFIG).is_none() {
            config.repo_root = workspace_root().to_string_lossy().to_string();
        }

        let paths = config.paths();
        let binaries = config.binaries();
        let skills = SkillScripts::new(
            ProcessCommandRunner,
            binaries.bash,
            paths.skills_dir,
            paths.repo_root,
            binaries.allow_unsafe_command_paths,
        )?;
        let scope = ScopeConfig::from_config(&config);

        Ok(Some(Self {
            config,
            scope,
            skills,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_world_fixture_ships_program_test_and_guide() {
        let fixture = fixture_dir(HELLO_WORLD_FIXTURE);
        for name in ["main.py", "test_main.py", "CLAUDE.md"] {
            assert!(fixture.join(name).is_file(), "fixture is missing {name}");
        }

        let program = std::fs::read_to_string(fixture.join("main.py")).expect("read main.py");
        assert!(program.contains("print(\"Hello, World!\")"));
    }

    #[test]
    fn workspace_root_holds_the_workspace_manifest() {
        let manifest =
            std::fs::read_to_string(workspace_root().join("Cargo.toml")).expect("read manifest");
        assert!(manifest.contains("[workspace]"));
    }
}
