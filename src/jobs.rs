//! Bookkeeping for commands started with a trailing `&`.

use crate::command::Outcome;
use crate::foreground::retry_interrupted;
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::io::Write;
use tracing::{debug, warn};

/// A background process the shell is still responsible for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundJob {
    pub pid: Pid,
    /// Line the job was started from, kept for logging.
    pub command: String,
}

/// A background job observed to have finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub pid: Pid,
    pub outcome: Outcome,
}

/// Background jobs keyed by process id. Iteration order carries no meaning.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: HashMap<Pid, BackgroundJob>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, pid: Pid, command: impl Into<String>) {
        let command = command.into();
        debug!(%pid, command = %command, "tracking background job");
        self.jobs.insert(pid, BackgroundJob { pid, command });
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.jobs.contains_key(&pid)
    }

    /// Checks every job once without blocking. Finished jobs are written to `out`
    /// and removed; running jobs stay for the next call.
    pub fn poll_and_report(&mut self, out: &mut dyn Write) -> std::io::Result<Vec<Completion>> {
        let mut done = Vec::new();
        let mut vanished = Vec::new();
        for &pid in self.jobs.keys() {
            match retry_interrupted(|| waitpid(pid, Some(WaitPidFlag::WNOHANG))) {
                Ok(WaitStatus::Exited(_, code)) => done.push(Completion {
                    pid,
                    outcome: Outcome::from_exit_code(code),
                }),
                Ok(WaitStatus::Signaled(_, sig, _)) => done.push(Completion {
                    pid,
                    outcome: Outcome::Signaled(sig as i32),
                }),
                Ok(_) => {}
                Err(Errno::ECHILD) => vanished.push(pid),
                Err(e) => warn!(%pid, error = %e, "cannot poll background job"),
            }
        }

        for pid in vanished {
            warn!(%pid, "background job was reaped elsewhere");
            self.jobs.remove(&pid);
        }
        // reaped jobs leave the table before any line is written
        for completion in &done {
            if let Some(job) = self.jobs.remove(&completion.pid) {
                debug!(pid = %job.pid, command = %job.command, outcome = %completion.outcome, "background job finished");
            }
        }
        for completion in &done {
            writeln!(
                out,
                "background pid {} is done: {}",
                completion.pid, completion.outcome
            )?;
        }
        out.flush()?;
        Ok(done)
    }

    /// Kills every remaining job with SIGKILL, reaps it and empties the table.
    /// Returns how many jobs were terminated.
    pub fn terminate_all(&mut self) -> usize {
        let count = self.jobs.len();
        for (pid, job) in self.jobs.drain() {
            debug!(%pid, command = %job.command, "terminating background job");
            match signal::kill(pid, Signal::SIGKILL) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => warn!(%pid, error = %e, "cannot kill background job"),
            }
            if let Err(e) = retry_interrupted(|| waitpid(pid, None)) {
                if e != Errno::ECHILD {
                    warn!(%pid, error = %e, "cannot reap background job");
                }
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use std::time::{Duration, Instant};

    fn spawn(script: &str) -> Pid {
        let child = Command::new("/bin/sh").arg("-c").arg(script).spawn().unwrap();
        Pid::from_raw(child.id() as i32)
    }

    /// Polls until the table is empty, collecting everything reported.
    fn drain(table: &mut JobTable, out: &mut Vec<u8>) -> Vec<Completion> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut all = Vec::new();
        while !table.is_empty() && Instant::now() < deadline {
            all.extend(table.poll_and_report(out).unwrap());
            std::thread::sleep(Duration::from_millis(20));
        }
        all
    }

    #[test]
    fn test_two_jobs_reported_once_each() {
        let mut table = JobTable::new();
        let first = spawn("exit 0");
        let second = spawn("exit 3");
        table.add(first, "true");
        table.add(second, "false");
        assert_eq!(table.len(), 2);

        let mut out = Vec::new();
        let done = drain(&mut table, &mut out);
        assert_eq!(done.len(), 2);
        assert!(table.is_empty());

        let s = String::from_utf8(out).unwrap();
        assert!(s.contains(&format!("background pid {} is done: exit value 0\n", first)));
        assert!(s.contains(&format!("background pid {} is done: exit value 1\n", second)));
        assert_eq!(s.lines().count(), 2);

        let mut out = Vec::new();
        let done = table.poll_and_report(&mut out).unwrap();
        assert!(done.is_empty());
        assert!(out.is_empty());
    }

    /// Accepts flushes but refuses every write.
    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_failed_report_still_forgets_reaped_jobs() {
        use nix::sys::wait::{Id, waitid};

        let mut table = JobTable::new();
        let pids = [spawn("exit 0"), spawn("exit 1")];
        for pid in pids {
            table.add(pid, "sh");
            // wait for the exit without reaping, so the next poll sees both
            waitid(Id::Pid(pid), WaitPidFlag::WEXITED | WaitPidFlag::WNOWAIT).unwrap();
        }

        let err = table.poll_and_report(&mut BrokenPipe).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
        assert!(table.is_empty());
        for pid in pids {
            assert_eq!(
                waitpid(pid, Some(WaitPidFlag::WNOHANG)),
                Err(Errno::ECHILD)
            );
        }
    }

    #[test]
    fn test_running_job_stays_tracked() {
        let mut table = JobTable::new();
        let pid = spawn("sleep 5");
        table.add(pid, "sleep 5");

        let mut out = Vec::new();
        let done = table.poll_and_report(&mut out).unwrap();
        assert!(done.is_empty());
        assert!(table.contains(pid));

        assert_eq!(table.terminate_all(), 1);
        assert!(table.is_empty());
    }

    #[test]
    fn test_signaled_job_reports_signal() {
        let mut table = JobTable::new();
        let pid = spawn("sleep 5");
        table.add(pid, "sleep 5");
        signal::kill(pid, Signal::SIGTERM).unwrap();

        let mut out = Vec::new();
        let done = drain(&mut table, &mut out);
        assert_eq!(done, vec![Completion {
            pid,
            outcome: Outcome::Signaled(Signal::SIGTERM as i32),
        }]);
        let s = String::from_utf8(out).unwrap();
        assert_eq!(
            s,
            format!("background pid {} is done: terminated by signal 15\n", pid)
        );
    }

    #[test]
    fn test_terminate_all_leaves_no_live_process() {
        let mut table = JobTable::new();
        let pid = spawn("sleep 30");
        table.add(pid, "sleep 30");

        assert_eq!(table.terminate_all(), 1);
        assert!(table.is_empty());
        // reaped: the pid no longer names one of our children
        assert_eq!(
            waitpid(pid, Some(WaitPidFlag::WNOHANG)),
            Err(Errno::ECHILD)
        );
    }
}
