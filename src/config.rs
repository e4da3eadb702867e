use argh::FromArgs;

/// Longest command line accepted, in bytes. Longer input is truncated.
pub const MAX_LINE_LENGTH: usize = 2048;

/// Maximum number of words kept from a single command line.
pub const MAX_ARGS: usize = 512;

/// Lines starting with this character are ignored.
pub const COMMENT_CHAR: char = '#';

/// Replaced by the shell's own process id before a line is split into words.
pub const PID_MARKER: &str = "$$";

/// A line ending in this character runs in the background.
pub const BACKGROUND_MARKER: char = '&';

/// Where unredirected streams of background commands are bound.
pub const NULL_DEVICE: &str = "/dev/null";

pub const DEFAULT_PROMPT: &str = ": ";

/// Environment variable consulted for the log filter when `--log` is absent.
pub const LOG_ENV_VAR: &str = "SMALLSH_LOG";

const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(FromArgs, Debug)]
/// A small interactive shell with background jobs and I/O redirection.
pub struct Options {
    #[argh(option, default = "String::from(DEFAULT_PROMPT)")]
    /// text written before every command line
    pub prompt: String,

    #[argh(option)]
    /// tracing filter directive, e.g. "debug" or "smallsh=trace"
    pub log: Option<String>,

    #[argh(switch)]
    /// do not keep an in-memory history of entered lines
    pub no_history: bool,
}

impl Options {
    /// Filter directive for the log subscriber: `--log`, then `SMALLSH_LOG`, then `warn`.
    pub fn log_filter(&self) -> String {
        self.log
            .clone()
            .or_else(|| std::env::var(LOG_ENV_VAR).ok())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            log: None,
            no_history: false,
        }
    }
}
