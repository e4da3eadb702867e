use crate::command::ExitCode;
use crate::env::Environment;
use anyhow::{Result, anyhow};
use std::env;
use std::io::{self, Write};
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins run in-process, are never interruptible, and always leave the
/// foreground record describing their own result.
pub(crate) trait BuiltinCommand: Sized {
    /// Canonical name of the command, e.g. "status" or "cd".
    fn name() -> &'static str;

    /// Executes the command using the shell's output stream and environment.
    ///
    /// Return value follows shell conventions: 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode>;
}

/// One of the literal lines the read-eval loop handles itself.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Builtin {
    Exit(Exit),
    Status(Status),
    Cd(Cd),
}

impl Builtin {
    /// Matches exactly `exit`, `status`, `cd` and `cd <path>`.
    pub(crate) fn recognize(line: &str) -> Option<Builtin> {
        if line == Exit::name() {
            return Some(Builtin::Exit(Exit));
        }
        if line == Status::name() {
            return Some(Builtin::Status(Status));
        }
        let rest = line.strip_prefix(Cd::name())?;
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let target = rest.trim();
        Some(Builtin::Cd(Cd {
            target: (!target.is_empty()).then(|| target.to_string()),
        }))
    }

    /// Runs the builtin and records its exit code for `status`.
    pub(crate) fn run(self, stdout: &mut dyn Write, env: &mut Environment) -> io::Result<ExitCode> {
        let code = match self {
            Builtin::Exit(cmd) => run_reporting(cmd, stdout, env)?,
            Builtin::Status(cmd) => run_reporting(cmd, stdout, env)?,
            Builtin::Cd(cmd) => run_reporting(cmd, stdout, env)?,
        };
        env.foreground.record_exit(code);
        Ok(code)
    }
}

fn run_reporting<T: BuiltinCommand>(
    cmd: T,
    stdout: &mut dyn Write,
    env: &mut Environment,
) -> io::Result<ExitCode> {
    match cmd.execute(stdout, env) {
        Ok(code) => Ok(code),
        Err(e) => {
            writeln!(stdout, "{}", e)?;
            stdout.flush()?;
            Ok(1)
        }
    }
}

/// Print how the last foreground command ended.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Status;

impl BuiltinCommand for Status {
    fn name() -> &'static str {
        "status"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.foreground.outcome())?;
        stdout.flush()?;
        Ok(0)
    }
}

/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Cd {
    /// everything after `cd `; absolute or relative to the current directory.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let target = match &self.target {
            Some(t) => PathBuf::from(t),
            None => env.home_dir().ok_or_else(|| anyhow!("cd: HOME not set"))?,
        };

        let new_dir = if target.is_absolute() {
            target.clone()
        } else {
            env.current_dir.join(&target)
        };

        env::set_current_dir(&new_dir).map_err(|e| {
            let reason = match e.kind() {
                io::ErrorKind::NotFound => "no such file or directory".to_string(),
                io::ErrorKind::NotADirectory => "not a directory".to_string(),
                io::ErrorKind::PermissionDenied => "permission denied".to_string(),
                _ => e.to_string(),
            };
            anyhow!("cd: {}: {}", target.display(), reason)
        })?;
        env.current_dir = env::current_dir().unwrap_or(new_dir);
        Ok(0)
    }
}

/// Leave the shell. Remaining background jobs are killed by the read-eval loop.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Exit;

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        env.should_exit = true;
        Ok(0)
    }
}
