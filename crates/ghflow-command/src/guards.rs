use std::path::{Component, Path};

use crate::CommandError;

pub fn is_bare_command_name(path: &Path) -> bool {
    let mut components = path.components();
    matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none()
}

/// Binaries resolved from configuration must be looked up on `PATH` unless the
/// caller explicitly opts into absolute or relative paths.
pub fn validate_command_binary_path(
    binary: &Path,
    setting_name: &str,
    allow_unsafe_command_paths: bool,
) -> Result<(), CommandError> {
    if binary.as_os_str().is_empty() {
        return Err(CommandError::Configuration(format!(
            "{setting_name} is set but empty. Provide a valid binary name or unset it."
        )));
    }
    if allow_unsafe_command_paths || is_bare_command_name(binary) {
        return Ok(());
    }

    Err(CommandError::Configuration(format!(
        "{setting_name} resolves to '{}' which is treated as an unsafe command path by default. Use a bare command name or set allow_unsafe_command_paths = true.",
        binary.display()
    )))
}

pub fn sanitize_command_output_text(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\n' | '\t' => output.push(ch),
            '\r' => output.push('\n'),
            _ if ch.is_control() => {}
            _ => output.push(ch),
        }
    }
    output
}
