//! Notifications produced by the signal handlers and printed by the main
//! flow, so nothing is written to the terminal from handler context.

use std::fmt;

use nix::sys::signal::Signal;
use nix::unistd::Pid;

use crate::job::JobState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// Exited normally and was removed from the table.
    Exited { jid: u32, pid: Pid, code: i32 },
    /// Killed by a signal and removed from the table.
    Signaled { jid: u32, pid: Pid, signal: Signal },
    /// Stopped by a signal; still tracked.
    Stopped { jid: u32, pid: Pid, signal: Signal },
    /// Moved to a new state by `bg` or `fg`.
    StateChanged { jid: u32, pid: Pid, state: JobState },
}

impl JobEvent {
    /// Normal exits and explicit state changes are only announced in
    /// verbose mode.
    pub fn is_verbose_only(&self) -> bool {
        matches!(self, JobEvent::Exited { .. } | JobEvent::StateChanged { .. })
    }
}

impl fmt::Display for JobEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobEvent::Exited { jid, pid, code } => {
                write!(f, "Job [{jid}] ({pid}) deleted (exit status {code})")
            }
            JobEvent::Signaled { jid, pid, signal } => {
                write!(f, "Job [{jid}] ({pid}) terminated by signal {}", *signal as i32)
            }
            JobEvent::Stopped { jid, pid, signal } => {
                write!(f, "Job [{jid}] ({pid}) stopped by signal {}", *signal as i32)
            }
            JobEvent::StateChanged { jid, pid, state } => {
                write!(f, "Job [{jid}] ({pid}) {state}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_like_reference_shell() {
        let pid = Pid::from_raw(77);
        let ev = JobEvent::Signaled { jid: 1, pid, signal: Signal::SIGINT };
        assert_eq!(ev.to_string(), "Job [1] (77) terminated by signal 2");
        let ev = JobEvent::Stopped { jid: 2, pid, signal: Signal::SIGTSTP };
        assert_eq!(ev.to_string(), "Job [2] (77) stopped by signal 20");
        assert!(!ev.is_verbose_only());
        let ev = JobEvent::Exited { jid: 2, pid, code: 0 };
        assert!(ev.is_verbose_only());
        assert_eq!(ev.to_string(), "Job [2] (77) deleted (exit status 0)");
    }

    #[test]
    fn state_changes_use_listing_labels() {
        let pid = Pid::from_raw(78);
        let ev = JobEvent::StateChanged { jid: 3, pid, state: JobState::Background };
        assert!(ev.is_verbose_only());
        assert_eq!(ev.to_string(), "Job [3] (78) Running");
        let ev = JobEvent::StateChanged { jid: 3, pid, state: JobState::Foreground };
        assert_eq!(ev.to_string(), "Job [3] (78) Foreground");
    }
}
