//! Launching external programs.

use crate::command::{Outcome, ParsedCommand};
use crate::error::{Result, ShellError};
use crate::foreground::{ForegroundState, InterruptBlock, reset_child_interrupt};
use crate::jobs::JobTable;
use crate::redirect;
use nix::errno::Errno;
use nix::unistd::{ForkResult, Pid, execvp, fork};
use std::ffi::CString;
use std::io::{self, Write};
use std::process;
use tracing::debug;

/// What happened to a launched command, from the shell's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launch {
    /// The line had no words; no process was created.
    Skipped,
    /// A background process was started and handed to the job table.
    Started(Pid),
    /// A foreground process ran to completion.
    Completed(Outcome),
}

/// Starts `cmd` in a new process.
///
/// Background commands are registered in `jobs` under `line` and announced on `out`;
/// foreground commands are supervised through `foreground` until they finish.
pub fn launch(
    cmd: &ParsedCommand,
    line: &str,
    jobs: &mut JobTable,
    foreground: &ForegroundState,
    out: &mut dyn Write,
) -> Result<Launch> {
    let Some(program) = cmd.program() else {
        return Ok(Launch::Skipped);
    };
    let argv = to_c_args(&cmd.argv)?;

    // Anything still buffered would otherwise be written twice, once by the child.
    out.flush()?;
    io::stdout().flush()?;

    let block = InterruptBlock::new()?;
    let child = match unsafe { fork() } {
        Ok(ForkResult::Child) => exec_child(cmd, &argv, &block),
        Ok(ForkResult::Parent { child }) => child,
        Err(source) => {
            return Err(ShellError::Spawn {
                command: program.to_string(),
                source,
            });
        }
    };
    debug!(pid = %child, program, background = cmd.background, "started process");

    if cmd.background {
        jobs.add(child, line);
        block.unblock()?;
        writeln!(out, "background pid is {}", child)?;
        out.flush()?;
        return Ok(Launch::Started(child));
    }

    foreground.begin(child);
    block.unblock()?;
    let outcome = foreground.run_foreground(child)?;
    Ok(Launch::Completed(outcome))
}

fn to_c_args(argv: &[String]) -> Result<Vec<CString>> {
    argv.iter()
        .map(|arg| {
            CString::new(arg.as_bytes()).map_err(|_| ShellError::InvalidArgument { arg: arg.clone() })
        })
        .collect()
}

/// Child side of the fork: never returns.
fn exec_child(cmd: &ParsedCommand, argv: &[CString], block: &InterruptBlock) -> ! {
    if reset_child_interrupt(cmd.background)
        .and_then(|()| block.unblock())
        .is_err()
    {
        process::exit(1);
    }
    if let Err(e) = redirect::install(cmd) {
        eprintln!("{}", e);
        process::exit(1);
    }
    let err = match execvp(&argv[0], argv) {
        Ok(never) => match never {},
        Err(err) => err,
    };
    if !cmd.background {
        eprintln!("{}", exec_diagnostic(&cmd.argv[0], err));
    }
    process::exit(1)
}

/// One-line message for a failed `exec` of `program`.
pub(crate) fn exec_diagnostic(program: &str, err: Errno) -> String {
    match err {
        Errno::EACCES => format!("{}: permission denied", program),
        Errno::ENOENT => format!("{}: no such file or directory", program),
        Errno::ENOEXEC => format!("{}: not a valid executable", program),
        other => format!("{}: {}", program, other.desc()),
    }
}
