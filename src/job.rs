//! The job table: a fixed number of slots holding the children the shell
//! tracks.
//!
//! The table itself knows nothing about signals. Callers reach it through
//! [`crate::control::JobControl`], which serializes access between the
//! evaluator and the signal handler thread.

use std::fmt;

use nix::unistd::Pid;

use crate::error::{Result, ShellError};

/// Job states. An unused slot is `None` in the table, so there is no
/// separate "empty" state here.
///
/// State transitions and the actions that cause them:
///
/// - `Foreground -> Stopped`: ctrl-z, or a stop reported by the reaper
/// - `Stopped -> Foreground`: `fg`
/// - `Stopped -> Background`: `bg`
/// - `Background -> Foreground`: `fg`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Foreground,
    Background,
    Stopped,
}

impl JobState {
    pub fn label(self) -> &'static str {
        match self {
            JobState::Foreground => "Foreground",
            JobState::Background => "Running",
            JobState::Stopped => "Stopped",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub pid: Pid,
    pub jid: u32,
    pub state: JobState,
    pub cmdline: String,
}

impl fmt::Display for Job {
    /// `[jid] (pid) State cmdline`, the `jobs` listing format.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ({}) {} {}", self.jid, self.pid, self.state, self.cmdline)
    }
}

pub struct JobTable {
    slots: Vec<Option<Job>>,
    next_jid: u32,
}

impl JobTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            next_jid: 1,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Registers a freshly forked child and returns its job id.
    pub fn insert(&mut self, pid: Pid, state: JobState, cmdline: &str) -> Result<u32> {
        if pid.as_raw() < 1 || self.slot_of(pid).is_some() {
            return Err(ShellError::InvalidPid(pid.as_raw()));
        }
        let capacity = self.capacity();
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.is_none())
            .ok_or(ShellError::TableFull { capacity })?;

        let jid = self.next_jid;
        self.next_jid += 1;
        *slot = Some(Job {
            pid,
            jid,
            state,
            cmdline: cmdline.to_string(),
        });
        Ok(jid)
    }

    /// Clears the slot holding `pid`. Returns the removed job, `None` if
    /// the pid was not tracked.
    pub fn remove(&mut self, pid: Pid) -> Option<Job> {
        let idx = self.slot_of(pid)?;
        let job = self.slots[idx].take();
        self.next_jid = self.max_jid() + 1;
        job
    }

    pub fn find_by_pid(&self, pid: Pid) -> Option<Job> {
        self.slot_of(pid).and_then(|i| self.slots[i].clone())
    }

    pub fn find_by_jid(&self, jid: u32) -> Option<Job> {
        if jid < 1 {
            return None;
        }
        self.jobs().find(|j| j.jid == jid).cloned()
    }

    pub fn foreground_pid(&self) -> Option<Pid> {
        self.jobs()
            .find(|j| j.state == JobState::Foreground)
            .map(|j| j.pid)
    }

    pub fn first_stopped(&self) -> Option<Job> {
        self.jobs().find(|j| j.state == JobState::Stopped).cloned()
    }

    /// Snapshot of every tracked job, in slot order.
    pub fn list(&self) -> Vec<Job> {
        self.jobs().cloned().collect()
    }

    /// Updates the state of `pid`, returning the previous state.
    ///
    /// Promoting a job to `Foreground` demotes any other foreground job to
    /// `Background` so the table never holds two.
    pub fn set_state(&mut self, pid: Pid, state: JobState) -> Option<JobState> {
        let idx = self.slot_of(pid)?;
        if state == JobState::Foreground {
            for job in self.slots.iter_mut().flatten() {
                if job.pid != pid && job.state == JobState::Foreground {
                    job.state = JobState::Background;
                }
            }
        }
        let job = self.slots[idx].as_mut()?;
        Some(std::mem::replace(&mut job.state, state))
    }

    pub fn state_of(&self, pid: Pid) -> Option<JobState> {
        self.slot_of(pid)
            .and_then(|i| self.slots[i].as_ref())
            .map(|j| j.state)
    }

    /// The id the next `insert` will hand out.
    #[cfg(test)]
    pub fn next_jid(&self) -> u32 {
        self.next_jid
    }

    fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.slots.iter().flatten()
    }

    fn slot_of(&self, pid: Pid) -> Option<usize> {
        if pid.as_raw() < 1 {
            return None;
        }
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|j| j.pid == pid))
    }

    fn max_jid(&self) -> u32 {
        self.jobs().map(|j| j.jid).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn pid(raw: i32) -> Pid {
        Pid::from_raw(raw)
    }

    #[test]
    fn insert_assigns_increasing_ids() {
        let mut table = JobTable::new(4);
        assert_eq!(table.insert(pid(100), JobState::Background, "a &").unwrap(), 1);
        assert_eq!(table.insert(pid(101), JobState::Background, "b &").unwrap(), 2);
        assert_eq!(table.len(), 2);
        assert_eq!(table.find_by_jid(2).unwrap().pid, pid(101));
    }

    #[rstest]
    #[case::zero(0)]
    #[case::negative(-7)]
    fn insert_rejects_non_positive_pid(#[case] raw: i32) {
        let mut table = JobTable::new(2);
        assert!(matches!(
            table.insert(pid(raw), JobState::Foreground, "x"),
            Err(ShellError::InvalidPid(_))
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn insert_rejects_duplicate_pid() {
        let mut table = JobTable::new(2);
        table.insert(pid(10), JobState::Background, "x").unwrap();
        assert!(table.insert(pid(10), JobState::Background, "y").is_err());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn full_table_is_reported() {
        let mut table = JobTable::new(2);
        table.insert(pid(1), JobState::Background, "a").unwrap();
        table.insert(pid(2), JobState::Background, "b").unwrap();
        assert!(table.is_full());
        assert!(matches!(
            table.insert(pid(3), JobState::Background, "c"),
            Err(ShellError::TableFull { capacity: 2 })
        ));
    }

    #[test]
    fn remove_is_idempotent() {
        let mut table = JobTable::new(2);
        table.insert(pid(5), JobState::Background, "a").unwrap();
        assert!(table.remove(pid(5)).is_some());
        assert!(table.remove(pid(5)).is_none());
        assert!(table.remove(pid(0)).is_none());
    }

    #[test]
    fn next_jid_tracks_live_maximum() {
        let mut table = JobTable::new(4);
        table.insert(pid(1), JobState::Background, "a").unwrap();
        table.insert(pid(2), JobState::Background, "b").unwrap();
        table.insert(pid(3), JobState::Background, "c").unwrap();

        table.remove(pid(3));
        assert_eq!(table.next_jid(), 3);

        table.remove(pid(1));
        assert_eq!(table.next_jid(), 3);
        assert_eq!(table.insert(pid(4), JobState::Background, "d").unwrap(), 3);

        table.remove(pid(2));
        table.remove(pid(4));
        assert_eq!(table.next_jid(), 1);
    }

    #[test]
    fn ids_stay_unique_and_fresh_under_churn() {
        let mut table = JobTable::new(8);
        let mut live: Vec<Pid> = Vec::new();
        for round in 0..200 {
            let raw = 1000 + round;
            if round % 3 == 2 && !live.is_empty() {
                let victim = live.remove((round as usize * 7) % live.len());
                table.remove(victim);
            } else if !table.is_full() {
                let before = table.list().iter().map(|j| j.jid).max().unwrap_or(0);
                let jid = table.insert(pid(raw), JobState::Background, "x").unwrap();
                assert!(jid > before);
                live.push(pid(raw));
            }
            let jobs = table.list();
            let mut jids: Vec<u32> = jobs.iter().map(|j| j.jid).collect();
            let mut pids: Vec<i32> = jobs.iter().map(|j| j.pid.as_raw()).collect();
            jids.sort_unstable();
            jids.dedup();
            pids.sort_unstable();
            pids.dedup();
            assert_eq!(jids.len(), jobs.len());
            assert_eq!(pids.len(), jobs.len());
            assert!(jids.iter().all(|&j| j >= 1));
        }
    }

    #[test]
    fn promoting_to_foreground_keeps_a_single_foreground_job() {
        let mut table = JobTable::new(4);
        table.insert(pid(1), JobState::Foreground, "a").unwrap();
        table.insert(pid(2), JobState::Stopped, "b").unwrap();

        assert_eq!(table.set_state(pid(2), JobState::Foreground), Some(JobState::Stopped));
        assert_eq!(table.foreground_pid(), Some(pid(2)));
        assert_eq!(table.state_of(pid(1)), Some(JobState::Background));
    }

    #[test]
    fn lookups_return_snapshots() {
        let mut table = JobTable::new(2);
        table.insert(pid(9), JobState::Background, "sleep 1 &").unwrap();
        let snapshot = table.find_by_pid(pid(9)).unwrap();
        table.set_state(pid(9), JobState::Stopped);
        assert_eq!(snapshot.state, JobState::Background);
        assert_eq!(table.find_by_pid(pid(9)).unwrap().state, JobState::Stopped);
    }

    #[test]
    fn listing_format() {
        let mut table = JobTable::new(2);
        table.insert(pid(42), JobState::Background, "/bin/sleep 100 &").unwrap();
        let line = table.list()[0].to_string();
        assert_eq!(line, "[1] (42) Running /bin/sleep 100 &");
    }
}
