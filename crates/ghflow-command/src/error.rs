use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("failed to execute `{command}`: {detail}")]
    Spawn { command: String, detail: String },
    #[error(
        "Command failed: {command}\nexit status: {status}\nSTDOUT: {stdout}\nSTDERR: {stderr}",
        status = render_exit_code(.exit_code)
    )]
    Failed {
        command: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

impl CommandError {
    /// The command line that produced this error, as it was rendered for logs.
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::Configuration(_) => None,
            Self::Spawn { command, .. } | Self::Failed { command, .. } => Some(command),
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Failed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }

    /// Stderr when present, otherwise stdout, otherwise the error itself.
    pub fn detail(&self) -> String {
        match self {
            Self::Failed { stdout, stderr, .. } => {
                if !stderr.trim().is_empty() {
                    stderr.trim().to_owned()
                } else if !stdout.trim().is_empty() {
                    stdout.trim().to_owned()
                } else {
                    self.to_string()
                }
            }
            _ => self.to_string(),
        }
    }
}

fn render_exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "terminated by signal".to_owned(),
    }
}
