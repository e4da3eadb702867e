use crate::builtin::Builtin;
use crate::command::Outcome;
use crate::config::{COMMENT_CHAR, MAX_LINE_LENGTH, Options};
use crate::env::Environment;
use crate::external::{self, Launch};
use crate::jobs::JobTable;
use crate::parser;
use anyhow::Context;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, Write};
use tracing::{debug, info, warn};

/// Whether the read-eval loop should keep going after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// The interactive shell: built-ins, the launcher and the background job table
/// behind a rustyline prompt.
///
/// Example
/// ```no_run
/// use smallsh::Shell;
/// use smallsh::config::Options;
/// let mut sh = Shell::new(&Options::default());
/// sh.repl().unwrap();
/// ```
pub struct Shell {
    env: Environment,
    jobs: JobTable,
    prompt: String,
    history: bool,
}

impl Shell {
    /// Create a shell reporting through the process-wide foreground record.
    pub fn new(options: &Options) -> Self {
        Self::with_environment(Environment::new(), options)
    }

    /// Create a shell around an existing environment.
    pub fn with_environment(env: Environment, options: &Options) -> Self {
        Self {
            env,
            jobs: JobTable::new(),
            prompt: options.prompt.clone(),
            history: !options.no_history,
        }
    }

    pub fn jobs(&self) -> &JobTable {
        &self.jobs
    }

    /// How the last foreground command (or built-in) ended.
    pub fn last_outcome(&self) -> Outcome {
        self.env.foreground.outcome()
    }

    /// Evaluate one input line, writing shell output to `out`.
    ///
    /// Per-command failures are reported and recorded as exit status 1; only
    /// a failure to write to `out` is returned as an error.
    pub fn eval(&mut self, line: &str, out: &mut dyn Write) -> anyhow::Result<Flow> {
        let line = parser::truncate_line(line, MAX_LINE_LENGTH).trim_end();
        if line.is_empty() || line.starts_with(COMMENT_CHAR) {
            return Ok(Flow::Continue);
        }

        if let Some(builtin) = Builtin::recognize(line) {
            builtin.run(out, &mut self.env)?;
            return Ok(if self.env.should_exit {
                Flow::Exit
            } else {
                Flow::Continue
            });
        }

        let cmd = parser::transform(line, self.env.shell_pid);
        let foreground = self.env.foreground;
        match external::launch(&cmd, line, &mut self.jobs, foreground, out) {
            Ok(Launch::Completed(outcome @ Outcome::Signaled(_))) => {
                writeln!(out, "{}", outcome)?;
                out.flush()?;
            }
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "command failed");
                eprintln!("{}", e);
                foreground.record_exit(1);
            }
        }
        Ok(Flow::Continue)
    }

    /// Report and forget finished background jobs.
    pub fn poll_jobs(&mut self, out: &mut dyn Write) -> io::Result<()> {
        self.jobs.poll_and_report(out).map(drop)
    }

    /// Kill every background job that is still running.
    pub fn shutdown(&mut self) -> usize {
        let killed = self.jobs.terminate_all();
        debug!(killed, "background jobs terminated");
        killed
    }

    /// Read-Eval-Print Loop: runs until `exit` or end of input, then kills
    /// remaining background jobs.
    pub fn repl(&mut self) -> anyhow::Result<()> {
        let mut rl = DefaultEditor::new().context("cannot open line editor")?;
        let mut stdout = io::stdout();

        let result = loop {
            if let Err(e) = self.poll_jobs(&mut stdout) {
                break Err::<(), _>(e).context("cannot report background jobs");
            }
            match rl.readline(&self.prompt) {
                Ok(line) => {
                    if self.history && !line.trim().is_empty() {
                        if let Err(e) = rl.add_history_entry(line.as_str()) {
                            warn!(error = %e, "cannot record history entry");
                        }
                    }
                    match self.eval(&line, &mut stdout) {
                        Ok(Flow::Continue) => {}
                        Ok(Flow::Exit) => break Ok(()),
                        Err(e) => break Err(e),
                    }
                }
                // Ctrl-C at the prompt only discards the line being edited
                Err(ReadlineError::Interrupted) => {}
                Err(ReadlineError::Eof) => break Ok(()),
                Err(err) => break Err::<(), _>(err).context("cannot read command line"),
            }
        };

        let killed = self.shutdown();
        info!(killed, "shell exiting");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foreground::ForegroundState;
    use std::fs;
    use std::time::{Duration, Instant};

    fn shell() -> Shell {
        let fg: &'static ForegroundState = Box::leak(Box::new(ForegroundState::new()));
        Shell::with_environment(Environment::with_foreground(fg), &Options::default())
    }

    fn eval(sh: &mut Shell, line: &str) -> (Flow, String) {
        let mut out = Vec::new();
        let flow = sh.eval(line, &mut out).unwrap();
        (flow, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_comments_and_blank_lines_are_ignored() {
        let mut sh = shell();
        for line in ["", "   ", "# a comment", "#exit"] {
            assert_eq!(eval(&mut sh, line), (Flow::Continue, String::new()));
        }
    }

    #[test]
    fn test_status_follows_foreground_commands() {
        let mut sh = shell();
        eval(&mut sh, "false");
        assert_eq!(eval(&mut sh, "status").1, "exit value 1\n");

        eval(&mut sh, "true");
        assert_eq!(eval(&mut sh, "status").1, "exit value 0\n");
    }

    #[test]
    fn test_unknown_program_records_failure() {
        let mut sh = shell();
        let (flow, out) = eval(&mut sh, "no-such-program-for-smallsh --flag");
        assert_eq!(flow, Flow::Continue);
        assert!(out.is_empty());
        assert_eq!(sh.last_outcome(), Outcome::Exited(1));
    }

    #[test]
    fn test_unlaunchable_argument_records_failure_and_continues() {
        let mut sh = shell();
        eval(&mut sh, "true");
        let (flow, out) = eval(&mut sh, "echo a\0b");
        assert_eq!(flow, Flow::Continue);
        assert!(out.is_empty());
        assert_eq!(sh.last_outcome(), Outcome::Exited(1));
        assert_eq!(eval(&mut sh, "status").1, "exit value 1\n");
    }

    #[test]
    fn test_exit_stops_loop() {
        let mut sh = shell();
        assert_eq!(eval(&mut sh, "exit").0, Flow::Exit);
    }

    #[test]
    fn test_pid_expansion_reaches_program() {
        let mut sh = shell();
        let path = std::env::temp_dir().join(format!("interp_tests_{}_pid", std::process::id()));
        let _ = fs::remove_file(&path);

        eval(&mut sh, &format!("echo $$ > {}", path.to_string_lossy()));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            format!("{}\n", std::process::id())
        );
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_background_job_lifecycle() {
        let mut sh = shell();
        let (_, out) = eval(&mut sh, "true &");
        assert!(out.starts_with("background pid is "), "{}", out);
        let pid: i32 = out.trim().rsplit(' ').next().unwrap().parse().unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        let mut report = Vec::new();
        while !sh.jobs().is_empty() && Instant::now() < deadline {
            sh.poll_jobs(&mut report).unwrap();
            std::thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(
            String::from_utf8(report).unwrap(),
            format!("background pid {} is done: exit value 0\n", pid)
        );
    }

    #[test]
    fn test_shutdown_kills_running_jobs() {
        let mut sh = shell();
        eval(&mut sh, "sleep 30 &");
        assert_eq!(sh.jobs().len(), 1);
        assert_eq!(sh.shutdown(), 1);
        assert!(sh.jobs().is_empty());
    }

    #[test]
    fn test_background_start_leaves_status_alone() {
        let mut sh = shell();
        eval(&mut sh, "false");
        eval(&mut sh, "sleep 30 &");
        assert_eq!(eval(&mut sh, "status").1, "exit value 1\n");
        sh.shutdown();
    }
}
