//! Foreground supervision and the SIGINT forwarding path.
//!
//! [`ForegroundState`] is the only data shared between the control thread and the
//! signal handler. Every field is a word-sized atomic, so the handler never
//! allocates, locks or formats anything.

use crate::command::{ExitCode, Outcome, normalize};
use crate::error::{Result, ShellError};
use nix::errno::Errno;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::Pid;
use std::ffi::c_int;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use tracing::debug;

const NO_PID: i32 = 0;

static FOREGROUND: ForegroundState = ForegroundState::new();

/// What the shell knows about the current (or most recent) foreground command.
#[derive(Debug)]
pub struct ForegroundState {
    current_pid: AtomicI32,
    interrupted: AtomicBool,
    interrupt_signal: AtomicI32,
    last_exit_code: AtomicI32,
}

impl ForegroundState {
    pub const fn new() -> Self {
        Self {
            current_pid: AtomicI32::new(NO_PID),
            interrupted: AtomicBool::new(false),
            interrupt_signal: AtomicI32::new(0),
            last_exit_code: AtomicI32::new(0),
        }
    }

    /// The instance reached by the installed SIGINT handler.
    pub fn global() -> &'static ForegroundState {
        &FOREGROUND
    }

    pub fn current_pid(&self) -> Option<Pid> {
        match self.current_pid.load(Ordering::SeqCst) {
            NO_PID => None,
            pid => Some(Pid::from_raw(pid)),
        }
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Outcome `status` reports.
    pub fn outcome(&self) -> Outcome {
        if self.interrupted() {
            Outcome::Signaled(self.interrupt_signal.load(Ordering::SeqCst))
        } else {
            Outcome::Exited(self.last_exit_code.load(Ordering::SeqCst))
        }
    }

    /// Publishes `pid` as the interrupt target.
    ///
    /// Must be called while SIGINT is blocked, before the child can be signaled.
    pub fn begin(&self, pid: Pid) {
        self.interrupted.store(false, Ordering::SeqCst);
        self.current_pid.store(pid.as_raw(), Ordering::SeqCst);
    }

    /// Records the result of something that never became a foreground process:
    /// a built-in, or a command that could not be started.
    pub fn record_exit(&self, code: ExitCode) {
        self.current_pid.store(NO_PID, Ordering::SeqCst);
        self.interrupted.store(false, Ordering::SeqCst);
        self.last_exit_code.store(normalize(code), Ordering::SeqCst);
    }

    /// Signal-handler body: forwards `signal` to the foreground process at most once
    /// per run. Does nothing when no foreground process is published.
    pub fn forward_interrupt(&self, signal: c_int) {
        let pid = self.current_pid.load(Ordering::SeqCst);
        if pid == NO_PID {
            return;
        }
        if self.interrupted.swap(true, Ordering::SeqCst) {
            return;
        }
        self.interrupt_signal.store(signal, Ordering::SeqCst);
        if let Ok(sig) = Signal::try_from(signal) {
            let _ = signal::kill(Pid::from_raw(pid), sig);
        }
    }

    /// Blocks until `pid` terminates and records its normalized outcome.
    ///
    /// The pid is withdrawn from the handler's reach once the child has exited, so a
    /// late interrupt can never hit a recycled process id.
    pub fn run_foreground(&self, pid: Pid) -> Result<Outcome> {
        let status = self.wait_exited(pid);
        let status = status.map_err(|source| ShellError::Wait { pid, source })?;
        let outcome = self.settle(status);
        debug!(%pid, %outcome, "foreground process finished");
        Ok(outcome)
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn wait_exited(&self, pid: Pid) -> nix::Result<WaitStatus> {
        use nix::sys::wait::{Id, WaitPidFlag, waitid};

        // WNOWAIT leaves a zombie behind, which keeps the pid reserved until the reap below.
        let exited = retry_interrupted(|| {
            waitid(Id::Pid(pid), WaitPidFlag::WEXITED | WaitPidFlag::WNOWAIT)
        });
        self.current_pid.store(NO_PID, Ordering::SeqCst);
        exited?;
        retry_interrupted(|| waitpid(pid, None))
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    fn wait_exited(&self, pid: Pid) -> nix::Result<WaitStatus> {
        let status = retry_interrupted(|| waitpid(pid, None));
        self.current_pid.store(NO_PID, Ordering::SeqCst);
        status
    }

    fn settle(&self, status: WaitStatus) -> Outcome {
        let outcome = if self.interrupted() {
            Outcome::Signaled(self.interrupt_signal.load(Ordering::SeqCst))
        } else {
            match status {
                WaitStatus::Exited(_, code) => Outcome::from_exit_code(code),
                WaitStatus::Signaled(_, sig, _) => {
                    self.interrupt_signal.store(sig as i32, Ordering::SeqCst);
                    self.interrupted.store(true, Ordering::SeqCst);
                    Outcome::Signaled(sig as i32)
                }
                _ => Outcome::Exited(1),
            }
        };
        let code = match outcome {
            Outcome::Exited(code) => code,
            Outcome::Signaled(_) => 1,
        };
        self.last_exit_code.store(code, Ordering::SeqCst);
        outcome
    }
}

impl Default for ForegroundState {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn retry_interrupted<T>(mut f: impl FnMut() -> nix::Result<T>) -> nix::Result<T> {
    loop {
        match f() {
            Err(Errno::EINTR) => continue,
            other => return other,
        }
    }
}

extern "C" fn handle_interrupt(signal: c_int) {
    ForegroundState::global().forward_interrupt(signal);
}

/// Routes SIGINT to [`ForegroundState::global`]. The shell itself is never terminated by it.
pub fn install_interrupt_handler() -> Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(handle_interrupt),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    unsafe { signal::sigaction(Signal::SIGINT, &action) }.map_err(ShellError::SignalSetup)?;
    Ok(())
}

/// SIGINT disposition for a child about to `exec`: default in the foreground,
/// ignored in the background so terminal Ctrl-C leaves background jobs alone.
pub(crate) fn reset_child_interrupt(background: bool) -> Result<()> {
    let handler = if background {
        SigHandler::SigIgn
    } else {
        SigHandler::SigDfl
    };
    let action = SigAction::new(handler, SaFlags::empty(), SigSet::empty());
    unsafe { signal::sigaction(Signal::SIGINT, &action) }.map_err(ShellError::SignalSetup)?;
    Ok(())
}

/// Keeps SIGINT blocked on the calling thread until dropped or [`unblock`](Self::unblock)ed.
pub(crate) struct InterruptBlock {
    set: SigSet,
}

impl InterruptBlock {
    pub(crate) fn new() -> Result<Self> {
        let mut set = SigSet::empty();
        set.add(Signal::SIGINT);
        set.thread_block().map_err(ShellError::SignalSetup)?;
        Ok(Self { set })
    }

    pub(crate) fn unblock(&self) -> Result<()> {
        self.set.thread_unblock().map_err(ShellError::SignalSetup)
    }
}

impl Drop for InterruptBlock {
    fn drop(&mut self) {
        let _ = self.set.thread_unblock();
    }
}
