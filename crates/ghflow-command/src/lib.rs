mod error;
mod guards;
mod runner;
mod shell;

pub use error::CommandError;
pub use guards::{is_bare_command_name, sanitize_command_output_text, validate_command_binary_path};
pub use runner::{CommandRunner, ProcessCommandRunner};
pub use shell::{execute, render_command, CommandOutput, Shell};
