use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_GHFLOW_CONFIG: &str = "GHFLOW_CONFIG";
pub const ENV_GHFLOW_GIT_BIN: &str = "GHFLOW_GIT_BIN";
pub const ENV_GHFLOW_GH_BIN: &str = "GHFLOW_GH_BIN";
pub const ENV_GHFLOW_E2E: &str = "GHFLOW_E2E";

const DEFAULT_CONFIG_FILE_NAME: &str = "ghflow.toml";
const DEFAULT_SKILLS_DIR: &str = ".claude/skills";
const DEFAULT_BASE_BRANCH: &str = "main";
const DEFAULT_REMOTE: &str = "origin";
const DEFAULT_GIT_BINARY: &str = "git";
const DEFAULT_GH_BINARY: &str = "gh";
const DEFAULT_SHELL_BINARY: &str = "sh";
const DEFAULT_BASH_BINARY: &str = "bash";
const DEFAULT_REQUIRED_LABEL: &str = "HF-required";
const DEFAULT_BRANCH_SUFFIX: &str = "e2e-test";
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Message(String),
}

impl ConfigError {
    fn configuration(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GhflowConfig {
    /// Repository the workflow runs against. Blank means the current directory.
    #[serde(default)]
    pub repo_root: String,
    #[serde(default = "default_skills_dir")]
    pub skills_dir: String,
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
    #[serde(default = "default_remote")]
    pub remote: String,
    #[serde(default)]
    pub allow_unsafe_command_paths: bool,
    #[serde(default)]
    pub git: GitConfigToml,
    #[serde(default)]
    pub github: GithubConfigToml,
    #[serde(default)]
    pub shell: ShellConfigToml,
    #[serde(default)]
    pub e2e: E2eConfigToml,
    #[serde(default)]
    pub logging: LoggingConfigToml,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitConfigToml {
    #[serde(default = "default_git_binary")]
    pub binary: String,
}

impl Default for GitConfigToml {
    fn default() -> Self {
        Self {
            binary: default_git_binary(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GithubConfigToml {
    #[serde(default = "default_gh_binary")]
    pub binary: String,
}

impl Default for GithubConfigToml {
    fn default() -> Self {
        Self {
            binary: default_gh_binary(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShellConfigToml {
    #[serde(default = "default_shell_binary")]
    pub binary: String,
    #[serde(default = "default_bash_binary")]
    pub bash_binary: String,
}

impl Default for ShellConfigToml {
    fn default() -> Self {
        Self {
            binary: default_shell_binary(),
            bash_binary: default_bash_binary(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct E2eConfigToml {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_required_label")]
    pub required_label: String,
    #[serde(default = "default_branch_suffix")]
    pub branch_suffix: String,
}

impl Default for E2eConfigToml {
    fn default() -> Self {
        Self {
            enabled: false,
            required_label: default_required_label(),
            branch_suffix: default_branch_suffix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfigToml {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfigToml {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Default for GhflowConfig {
    fn default() -> Self {
        Self {
            repo_root: String::new(),
            skills_dir: default_skills_dir(),
            base_branch: default_base_branch(),
            remote: default_remote(),
            allow_unsafe_command_paths: false,
            git: GitConfigToml::default(),
            github: GithubConfigToml::default(),
            shell: ShellConfigToml::default(),
            e2e: E2eConfigToml::default(),
            logging: LoggingConfigToml::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoPaths {
    pub repo_root: PathBuf,
    pub skills_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryConfig {
    pub git: PathBuf,
    pub gh: PathBuf,
    pub shell: PathBuf,
    pub bash: PathBuf,
    pub allow_unsafe_command_paths: bool,
}

impl GhflowConfig {
    pub fn paths(&self) -> RepoPaths {
        let repo_root = PathBuf::from(&self.repo_root);
        let skills_dir = PathBuf::from(&self.skills_dir);
        let skills_dir = if skills_dir.is_absolute() {
            skills_dir
        } else {
            repo_root.join(skills_dir)
        };

        RepoPaths {
            repo_root,
            skills_dir,
        }
    }

    pub fn binaries(&self) -> BinaryConfig {
        BinaryConfig {
            git: PathBuf::from(&self.git.binary),
            gh: PathBuf::from(&self.github.binary),
            shell: PathBuf::from(&self.shell.binary),
            bash: PathBuf::from(&self.shell.bash_binary),
            allow_unsafe_command_paths: self.allow_unsafe_command_paths,
        }
    }

    /// Applies `GHFLOW_GIT_BIN`, `GHFLOW_GH_BIN` and `GHFLOW_E2E`.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env(ENV_GHFLOW_GIT_BIN)? {
            self.git.binary = value;
        }
        if let Some(value) = read_env(ENV_GHFLOW_GH_BIN)? {
            self.github.binary = value;
        }
        if let Some(value) = read_env(ENV_GHFLOW_E2E)? {
            self.e2e.enabled = parse_bool_env(ENV_GHFLOW_E2E, &value)?;
        }

        Ok(())
    }
}

pub fn load_from_env() -> Result<GhflowConfig, ConfigError> {
    let path = config_path_from_env()?;
    let mut config = load_from_path(path)?;
    config.apply_env_overrides()?;
    Ok(config)
}

/// Loads `path`, falling back to defaults when the file does not exist. The
/// file is never created: the harness must not leave files behind in the
/// repository it exercises.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<GhflowConfig, ConfigError> {
    let path = path.as_ref();
    let mut config = match std::fs::read_to_string(path) {
        Ok(raw) => toml::from_str::<GhflowConfig>(&raw).map_err(|err| {
            ConfigError::configuration(format!(
                "Failed to parse GHFLOW_CONFIG from {}: {err}",
                path.display()
            ))
        })?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => GhflowConfig::default(),
        Err(err) => {
            return Err(ConfigError::configuration(format!(
                "Failed to read GHFLOW_CONFIG from {}: {err}",
                path.display()
            )));
        }
    };

    let base_dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(current_dir_or_temp);
    normalize_config(&mut config, &base_dir)?;
    Ok(config)
}

pub fn default_config_path() -> PathBuf {
    current_dir_or_temp().join(DEFAULT_CONFIG_FILE_NAME)
}

fn config_path_from_env() -> Result<PathBuf, ConfigError> {
    match std::env::var(ENV_GHFLOW_CONFIG) {
        Ok(raw) => {
            if raw.trim().is_empty() {
                Ok(default_config_path())
            } else {
                Ok(raw.into())
            }
        }
        Err(std::env::VarError::NotPresent) => Ok(default_config_path()),
        Err(_) => Err(ConfigError::configuration(
            "GHFLOW_CONFIG contained invalid UTF-8",
        )),
    }
}

fn read_env(name: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value.trim().to_owned())),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(_) => Err(ConfigError::configuration(format!(
            "{name} contained invalid UTF-8"
        ))),
    }
}

pub fn parse_bool_env(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::configuration(format!(
            "{name} must be a boolean (1/0, true/false, yes/no, on/off); got '{other}'"
        ))),
    }
}

fn current_dir_or_temp() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| std::env::temp_dir())
}

fn absolutize_path(path: PathBuf, base_dir: &Path) -> PathBuf {
    if path.is_absolute() {
        return path;
    }

    base_dir.join(path)
}

fn normalize_config(config: &mut GhflowConfig, base_dir: &Path) -> Result<(), ConfigError> {
    let repo_root = config.repo_root.trim();
    config.repo_root = if repo_root.is_empty() {
        current_dir_or_temp()
    } else {
        absolutize_path(PathBuf::from(repo_root), base_dir)
    }
    .to_string_lossy()
    .to_string();

    normalize_non_empty_string(&mut config.skills_dir, default_skills_dir());
    normalize_non_empty_string(&mut config.base_branch, default_base_branch());
    normalize_non_empty_string(&mut config.remote, default_remote());
    normalize_non_empty_string(&mut config.git.binary, default_git_binary());
    normalize_non_empty_string(&mut config.github.binary, default_gh_binary());
    normalize_non_empty_string(&mut config.shell.binary, default_shell_binary());
    normalize_non_empty_string(&mut config.shell.bash_binary, default_bash_binary());
    normalize_non_empty_string(&mut config.e2e.required_label, default_required_label());
    normalize_non_empty_string(&mut config.e2e.branch_suffix, default_branch_suffix());
    normalize_non_empty_string(&mut config.logging.filter, default_log_filter());

    if config
        .e2e
        .branch_suffix
        .chars()
        .any(|ch| ch.is_whitespace() || ch == '~' || ch == '^' || ch == ':')
    {
        return Err(ConfigError::configuration(format!(
            "e2e.branch_suffix '{}' is not a valid branch name fragment",
            config.e2e.branch_suffix
        )));
    }

    Ok(())
}

fn normalize_non_empty_string(value: &mut String, default: String) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        *value = default;
    } else if trimmed != value {
        *value = trimmed.to_owned();
    }
}

fn default_skills_dir() -> String {
    DEFAULT_SKILLS_DIR.to_owned()
}

fn default_base_branch() -> String {
    DEFAULT_BASE_BRANCH.to_owned()
}

fn default_remote() -> String {
    DEFAULT_REMOTE.to_owned()
}

fn default_git_binary() -> String {
    DEFAULT_GIT_BINARY.to_owned()
}

fn default_gh_binary() -> String {
    DEFAULT_GH_BINARY.to_owned()
}

fn default_shell_binary() -> String {
    DEFAULT_SHELL_BINARY.to_owned()
}

fn default_bash_binary() -> String {
    DEFAULT_BASH_BINARY.to_owned()
}

fn default_required_label() -> String {
    DEFAULT_REQUIRED_LABEL.to_owned()
}

fn default_branch_suffix() -> String {
    DEFAULT_BRANCH_SUFFIX.to_owned()
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}
