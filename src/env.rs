use crate::foreground::ForegroundState;
use std::env as stdenv;
use std::path::PathBuf;

/// Mutable, user-level view of the shell process used by the interpreter.
///
/// The environment contains:
/// - `current_dir`: the working directory children are started in.
/// - `shell_pid`: the value `$$` expands to.
/// - `should_exit`: set by the `exit` built-in; the read-eval loop checks it.
/// - `foreground`: the record `status` reports from.
#[derive(Debug, Clone)]
pub struct Environment {
    pub current_dir: PathBuf,
    pub shell_pid: u32,
    pub should_exit: bool,
    pub foreground: &'static ForegroundState,
}

impl Environment {
    /// Capture the current process state, reporting through the process-wide
    /// [`ForegroundState`] that the SIGINT handler uses.
    pub fn new() -> Self {
        Self::with_foreground(ForegroundState::global())
    }

    /// Like [`Environment::new`] but with a caller-provided foreground record.
    pub fn with_foreground(foreground: &'static ForegroundState) -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            current_dir,
            shell_pid: std::process::id(),
            should_exit: false,
            foreground,
        }
    }

    /// Directory `cd` falls back to, taken from `HOME`.
    pub fn home_dir(&self) -> Option<PathBuf> {
        stdenv::var_os("HOME")
            .filter(|home| !home.is_empty())
            .map(PathBuf::from)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
