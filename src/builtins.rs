//! Built-in job-control commands: `quit`, `jobs`, `bg` and `fg`.

use std::io::Write;
use std::sync::OnceLock;

use nix::sys::signal::Signal;
use nix::unistd::Pid;
use regex::Regex;

use crate::control::{JobControl, Registry};
use crate::error::{Result, ShellError};
use crate::event::JobEvent;
use crate::job::{Job, JobState};
use crate::signals::ProcessControl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinResult {
    NotBuiltin,
    Handled,
    /// `quit` with no stopped jobs.
    Exit,
}

/// A `bg`/`fg` argument: `%N` names a job id, a bare number a process id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRef {
    Jid(u32),
    Pid(Pid),
}

fn job_ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(%?)(\d+)$").expect("valid job reference pattern"))
}

pub fn parse_job_ref(command: &'static str, arg: Option<&str>) -> Result<JobRef> {
    let arg = arg.ok_or(ShellError::MissingArgument { command })?;
    let caps = job_ref_pattern()
        .captures(arg)
        .ok_or(ShellError::BadArgument { command })?;
    let is_jid = !caps[1].is_empty();
    if is_jid {
        let jid = caps[2].parse().map_err(|_| ShellError::BadArgument { command })?;
        Ok(JobRef::Jid(jid))
    } else {
        let pid: i32 = caps[2].parse().map_err(|_| ShellError::BadArgument { command })?;
        Ok(JobRef::Pid(Pid::from_raw(pid)))
    }
}

/// Runs `argv` if it names a builtin. Output goes to `out`; errors are
/// returned for the caller to report.
pub fn try_builtin<P, W>(argv: &[String], jc: &JobControl, os: &P, out: &mut W) -> Result<BuiltinResult>
where
    P: ProcessControl,
    W: Write,
{
    let Some(name) = argv.first() else {
        return Ok(BuiltinResult::NotBuiltin);
    };
    let arg = argv.get(1).map(String::as_str);
    match name.as_str() {
        "quit" => quit(jc, out),
        "jobs" => {
            list_jobs(jc, out)?;
            Ok(BuiltinResult::Handled)
        }
        "bg" => {
            background(parse_job_ref("bg", arg)?, jc, os, out)?;
            Ok(BuiltinResult::Handled)
        }
        "fg" => {
            foreground(parse_job_ref("fg", arg)?, jc, os)?;
            Ok(BuiltinResult::Handled)
        }
        _ => Ok(BuiltinResult::NotBuiltin),
    }
}

fn quit<W: Write>(jc: &JobControl, out: &mut W) -> Result<BuiltinResult> {
    match jc.lock().table.first_stopped() {
        Some(job) => {
            writeln!(out, "There are stopped jobs.")?;
            writeln!(out, "{}", job)?;
            Ok(BuiltinResult::Handled)
        }
        None => Ok(BuiltinResult::Exit),
    }
}

pub fn list_jobs<W: Write>(jc: &JobControl, out: &mut W) -> Result<()> {
    for job in jc.lock().table.list() {
        writeln!(out, "{}", job)?;
    }
    Ok(())
}

fn resolve(jc: &JobControl, job_ref: JobRef) -> Result<Job> {
    let reg = jc.lock();
    match job_ref {
        JobRef::Jid(jid) => reg.table.find_by_jid(jid).ok_or(ShellError::NoSuchJob(jid)),
        JobRef::Pid(pid) => reg
            .table
            .find_by_pid(pid)
            .ok_or(ShellError::NoSuchProcess(pid.as_raw())),
    }
}

/// `bg`: continue a stopped job without waiting for it. A job that is
/// already running in the background is left alone.
fn background<P: ProcessControl, W: Write>(
    job_ref: JobRef,
    jc: &JobControl,
    os: &P,
    out: &mut W,
) -> Result<()> {
    let job = resolve(jc, job_ref)?;
    let mut reg = jc.lock();
    if reg.table.state_of(job.pid) != Some(JobState::Stopped) {
        return Ok(());
    }
    os.signal_group(job.pid, Signal::SIGCONT)?;
    reg.table.set_state(job.pid, JobState::Background);
    reg.push_event(JobEvent::StateChanged {
        jid: job.jid,
        pid: job.pid,
        state: JobState::Background,
    });
    drop(reg);
    tracing::debug!(pid = %job.pid, jid = job.jid, "continued in background");
    writeln!(out, "[{}] ({}) {}", job.jid, job.pid, job.cmdline)?;
    Ok(())
}

/// `fg`: make the job the foreground job, continuing it if stopped, and
/// wait until it is no longer in the foreground.
fn foreground<P: ProcessControl>(job_ref: JobRef, jc: &JobControl, os: &P) -> Result<()> {
    let job = resolve(jc, job_ref)?;
    {
        let mut reg = jc.lock();
        match reg.table.state_of(job.pid) {
            Some(JobState::Stopped) => {
                os.signal_group(job.pid, Signal::SIGCONT)?;
                promote(&mut reg, &job);
            }
            Some(JobState::Background) => promote(&mut reg, &job),
            Some(JobState::Foreground) => {}
            // reaped since it was resolved
            None => return Ok(()),
        }
    }
    tracing::debug!(pid = %job.pid, jid = job.jid, "brought to foreground");
    jc.wait_foreground(job.pid);
    Ok(())
}

fn promote(reg: &mut Registry, job: &Job) {
    reg.table.set_state(job.pid, JobState::Foreground);
    reg.push_event(JobEvent::StateChanged {
        jid: job.jid,
        pid: job.pid,
        state: JobState::Foreground,
    });
}
