use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        program: &str,
        args: &[OsString],
        cwd: Option<&Path>,
    ) -> io::Result<std::process::Output>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(
        &self,
        program: &str,
        args: &[OsString],
        cwd: Option<&Path>,
    ) -> io::Result<std::process::Output> {
        let mut command = Command::new(program);
        command.args(args);
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        command.output()
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(
        &self,
        program: &str,
        args: &[OsString],
        cwd: Option<&Path>,
    ) -> io::Result<std::process::Output> {
        (**self).run(program, args, cwd)
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for Arc<R> {
    fn run(
        &self,
        program: &str,
        args: &[OsString],
        cwd: Option<&Path>,
    ) -> io::Result<std::process::Output> {
        (**self).run(program, args, cwd)
    }
}
