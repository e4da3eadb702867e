//! Rebinding of standard input/output inside a freshly forked child.

use crate::command::ParsedCommand;
use crate::config::NULL_DEVICE;
use nix::errno::Errno;
use nix::unistd::dup2;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};

const OUTPUT_MODE: u32 = 0o644;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stream {
    Input,
    Output,
}

impl Stream {
    fn name(self) -> &'static str {
        match self {
            Stream::Input => "input",
            Stream::Output => "output",
        }
    }

    fn fd(self) -> RawFd {
        match self {
            Stream::Input => io::stdin().as_raw_fd(),
            Stream::Output => io::stdout().as_raw_fd(),
        }
    }

    /// Opens `path` read-only for input, or write/create/truncate with mode 0644 for output.
    pub(crate) fn open(self, path: &str) -> io::Result<File> {
        match self {
            Stream::Input => File::open(path),
            Stream::Output => OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(OUTPUT_MODE)
                .open(path),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum RedirectError {
    #[error("cannot open {file} for {}", .stream.name())]
    Open {
        file: String,
        stream: Stream,
        source: io::Error,
    },
    #[error("cannot redirect standard {} to {file}", .stream.name())]
    Dup {
        file: String,
        stream: Stream,
        source: Errno,
    },
}

/// Binds the command's input and output files, falling back to the null device for
/// unredirected streams of background commands.
///
/// Only meant to run in the child between `fork` and `exec`.
pub(crate) fn install(cmd: &ParsedCommand) -> Result<(), RedirectError> {
    bind(Stream::Input, cmd.input_file.as_deref(), cmd.background)?;
    bind(Stream::Output, cmd.output_file.as_deref(), cmd.background)?;
    Ok(())
}

/// File a stream should be bound to, if any.
pub(crate) fn target(file: Option<&str>, background: bool) -> Option<&str> {
    match (file, background) {
        (Some(file), _) => Some(file),
        (None, true) => Some(NULL_DEVICE),
        (None, false) => None,
    }
}

fn bind(stream: Stream, file: Option<&str>, background: bool) -> Result<(), RedirectError> {
    let Some(path) = target(file, background) else {
        return Ok(());
    };
    let handle = stream.open(path).map_err(|source| RedirectError::Open {
        file: path.to_string(),
        stream,
        source,
    })?;
    dup2(handle.as_raw_fd(), stream.fd()).map_err(|source| RedirectError::Dup {
        file: path.to_string(),
        stream,
        source,
    })?;
    Ok(())
}
