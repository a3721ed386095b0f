//! Signal handling for job control.
//!
//! Four signals are consumed:
//! - SIGCHLD: reap every reportable child and reclassify its job
//! - SIGINT (ctrl-c): forward to the foreground job's process group
//! - SIGTSTP (ctrl-z): stop the foreground job's process group
//! - SIGQUIT: print a notice and exit
//!
//! The handlers run on a dedicated thread fed by `signal-hook`, so they
//! may take the job table lock like any other code. They never print;
//! notifications are queued as [`JobEvent`]s for the main flow.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use nix::errno::Errno;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use signal_hook::consts::signal::{SIGCHLD, SIGINT, SIGQUIT, SIGTSTP};
use signal_hook::iterator::Signals;

use crate::control::JobControl;
use crate::error::{ExitStatus, Result, ShellError};
use crate::event::JobEvent;
use crate::job::JobState;

const JOB_SIGNALS: [Signal; 3] = [Signal::SIGCHLD, Signal::SIGINT, Signal::SIGTSTP];

fn job_sigset() -> SigSet {
    let mut set = SigSet::empty();
    for sig in JOB_SIGNALS {
        set.add(sig);
    }
    set
}

/// Blocks delivery of the job-control signals to the calling thread until
/// dropped, then restores the previous mask.
pub struct SignalMask {
    previous: SigSet,
}

impl SignalMask {
    pub fn block() -> Result<Self> {
        let mut previous = SigSet::empty();
        signal::pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&job_sigset()), Some(&mut previous))
            .map_err(ShellError::Signal)?;
        Ok(Self { previous })
    }
}

impl Drop for SignalMask {
    fn drop(&mut self) {
        if let Err(e) = signal::pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&self.previous), None) {
            tracing::warn!("failed to restore signal mask: {}", e);
        }
    }
}

/// Runs in a freshly forked child before exec: put the shell's handlers
/// back to their defaults, then lift the mask inherited from the launch
/// critical section.
///
/// Only async-signal-safe calls are made here; nothing allocates.
pub fn reset_in_child() {
    let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    for sig in JOB_SIGNALS.iter().chain(&[Signal::SIGQUIT]) {
        // SAFETY: installing SIG_DFL does not run any Rust code in handler context.
        let _ = unsafe { signal::sigaction(*sig, &default) };
    }
    let _ = signal::pthread_sigmask(SigmaskHow::SIG_UNBLOCK, Some(&job_sigset()), None);
}

/// The OS operations the handlers need.
pub trait ProcessControl {
    /// Sends `signal` to every process in the group led by `pid`.
    fn signal_group(&self, pid: Pid, signal: Signal) -> Result<()>;

    /// Returns the next reportable child status change without blocking,
    /// including children that have stopped.
    fn poll_child(&self) -> Option<WaitStatus>;
}

pub struct NixProcessControl;

impl ProcessControl for NixProcessControl {
    fn signal_group(&self, pid: Pid, signal: Signal) -> Result<()> {
        signal::killpg(pid, signal).map_err(ShellError::Signal)
    }

    fn poll_child(&self) -> Option<WaitStatus> {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED)) {
            Ok(WaitStatus::StillAlive) => None,
            Ok(status) => Some(status),
            Err(Errno::ECHILD) => None,
            Err(e) => {
                tracing::warn!("waitpid failed: {}", e);
                None
            }
        }
    }
}

/// SIGCHLD: drain every pending status change.
///
/// Exited or killed children are removed; stopped ones are marked
/// `Stopped`. Nothing here decides user-facing transitions.
pub fn on_child_status<P: ProcessControl>(jc: &JobControl, os: &P) {
    let mut reg = jc.lock();
    while let Some(status) = os.poll_child() {
        match status {
            WaitStatus::Exited(pid, code) => {
                if let Some(job) = reg.table.remove(pid) {
                    tracing::debug!(%pid, jid = job.jid, code, "job exited");
                    reg.push_event(JobEvent::Exited { jid: job.jid, pid, code });
                }
            }
            WaitStatus::Signaled(pid, signal, _) => {
                if let Some(job) = reg.table.remove(pid) {
                    tracing::debug!(%pid, jid = job.jid, ?signal, "job killed");
                    reg.push_event(JobEvent::Signaled { jid: job.jid, pid, signal });
                }
            }
            WaitStatus::Stopped(pid, signal) => {
                // a ctrl-z stop was already announced by `on_stop`
                let previous = reg.table.set_state(pid, JobState::Stopped);
                if previous.is_some_and(|state| state != JobState::Stopped) {
                    if let Some(job) = reg.table.find_by_pid(pid) {
                        tracing::debug!(%pid, jid = job.jid, ?signal, "job stopped");
                        reg.push_event(JobEvent::Stopped { jid: job.jid, pid, signal });
                    }
                }
            }
            other => tracing::trace!(?other, "ignoring child status"),
        }
    }
    drop(reg);
    jc.notify();
}

/// SIGINT: forward to the foreground job's group.
///
/// The job stays in the table until the reaper confirms it terminated, so
/// a job that ignores SIGINT keeps being tracked.
pub fn on_interrupt<P: ProcessControl>(jc: &JobControl, os: &P) {
    let reg = jc.lock();
    if let Some(fg) = reg.table.foreground_pid() {
        tracing::debug!(pid = %fg, "forwarding SIGINT");
        if let Err(e) = os.signal_group(fg, Signal::SIGINT) {
            tracing::warn!(pid = %fg, "failed to forward SIGINT: {}", e);
        }
    }
}

/// SIGTSTP: stop the foreground job's group and mark it `Stopped`.
///
/// The stop notice is queued together with the state change, so it is
/// ready by the time the foreground wait returns.
pub fn on_stop<P: ProcessControl>(jc: &JobControl, os: &P) {
    let mut reg = jc.lock();
    if let Some(fg) = reg.table.foreground_pid() {
        tracing::debug!(pid = %fg, "forwarding SIGTSTP");
        if let Err(e) = os.signal_group(fg, Signal::SIGTSTP) {
            tracing::warn!(pid = %fg, "failed to forward SIGTSTP: {}", e);
            return;
        }
        reg.table.set_state(fg, JobState::Stopped);
        if let Some(job) = reg.table.find_by_pid(fg) {
            reg.push_event(JobEvent::Stopped {
                jid: job.jid,
                pid: fg,
                signal: Signal::SIGTSTP,
            });
        }
    }
    drop(reg);
    jc.notify();
}

fn on_quit() -> ! {
    println!("Terminating after receipt of SIGQUIT signal");
    std::process::exit(ExitStatus::Failure.into());
}

/// Registers the shell's signals and starts the handler thread.
pub fn install(jc: Arc<JobControl>) -> Result<JoinHandle<()>> {
    let mut signals =
        Signals::new([SIGCHLD, SIGINT, SIGTSTP, SIGQUIT]).map_err(ShellError::Install)?;
    thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            let os = NixProcessControl;
            for sig in signals.forever() {
                match sig {
                    SIGCHLD => on_child_status(&jc, &os),
                    SIGINT => on_interrupt(&jc, &os),
                    SIGTSTP => on_stop(&jc, &os),
                    SIGQUIT => on_quit(),
                    _ => unreachable!(),
                }
            }
        })
        .map_err(ShellError::Install)
}
