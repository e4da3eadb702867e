//! Error types for launching and supervising commands.

use nix::errno::Errno;
use nix::unistd::Pid;

/// Result alias used by the process-control modules.
pub type Result<T> = std::result::Result<T, ShellError>;

/// Failures that are contained to a single command; none of them ends the shell.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    /// `fork` refused to create a process for the command.
    #[error("{command}: cannot start process: {source}")]
    Spawn { command: String, source: Errno },

    /// A word could not be passed to `exec` because it contains a NUL byte.
    #[error("{arg:?}: argument contains a NUL byte")]
    InvalidArgument { arg: String },

    /// Waiting for a child failed for a reason other than an interrupted call.
    #[error("waiting for process {pid} failed: {source}")]
    Wait { pid: Pid, source: Errno },

    /// The SIGINT handler or signal mask could not be changed.
    #[error("cannot configure signal handling: {0}")]
    SignalSetup(Errno),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
