use std::fmt;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// A command line after `$$` expansion, background detection and redirection extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Program name followed by its arguments. Empty means there is nothing to run.
    pub argv: Vec<String>,
    /// File named after `<`, bound to standard input.
    pub input_file: Option<String>,
    /// File named after `>`, bound to standard output.
    pub output_file: Option<String>,
    /// True when the line ended with `&`.
    pub background: bool,
}

impl ParsedCommand {
    pub fn is_empty(&self) -> bool {
        self.argv.is_empty()
    }

    /// Name of the program to run, if any.
    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }
}

/// How a command finished, as reported by `status` and the job table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Normal exit with a normalized code (0 or 1).
    Exited(ExitCode),
    /// Termination by the given signal number.
    Signaled(i32),
}

impl Outcome {
    /// Collapses a raw exit code to the shell's success/failure encoding.
    pub fn from_exit_code(code: ExitCode) -> Self {
        Outcome::Exited(normalize(code))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Exited(code) => write!(f, "exit value {}", code),
            Outcome::Signaled(signal) => write!(f, "terminated by signal {}", signal),
        }
    }
}

/// 0 stays 0, anything else becomes 1.
pub fn normalize(code: ExitCode) -> ExitCode {
    if code == 0 { 0 } else { 1 }
}
