//! Shared job-control state.
//!
//! The evaluator and the signal handler thread both mutate the job table.
//! All access goes through [`JobControl::lock`]; the handler thread takes
//! the same lock before reaping, so a child that is being registered can
//! never be reaped before its entry exists.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use nix::unistd::Pid;

use crate::event::JobEvent;
use crate::job::{JobState, JobTable};

pub struct Registry {
    pub table: JobTable,
    events: VecDeque<JobEvent>,
}

impl Registry {
    pub fn push_event(&mut self, event: JobEvent) {
        self.events.push_back(event);
    }
}

pub struct JobControl {
    inner: Mutex<Registry>,
    changed: Condvar,
    poll_interval: Duration,
}

impl JobControl {
    pub fn new(capacity: usize, poll_interval: Duration) -> Self {
        Self {
            inner: Mutex::new(Registry {
                table: JobTable::new(capacity),
                events: VecDeque::new(),
            }),
            changed: Condvar::new(),
            poll_interval,
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wakes anyone blocked in [`wait_foreground`](Self::wait_foreground).
    pub fn notify(&self) {
        self.changed.notify_all();
    }

    /// Blocks until `pid` is no longer the foreground job: it was reaped,
    /// stopped, or is not in the table at all.
    ///
    /// Handlers call [`notify`](Self::notify) after every change; the
    /// timeout bounds the latency should a wakeup be missed.
    pub fn wait_foreground(&self, pid: Pid) {
        let mut guard = self.lock();
        while guard.table.state_of(pid) == Some(JobState::Foreground) {
            guard = match self.changed.wait_timeout(guard, self.poll_interval) {
                Ok((g, _)) => g,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        tracing::trace!(%pid, "foreground wait finished");
    }

    pub fn drain_events(&self) -> Vec<JobEvent> {
        self.lock().events.drain(..).collect()
    }
}
