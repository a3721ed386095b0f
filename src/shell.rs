use std::io::{self, BufRead, Write};
use std::sync::Arc;

use colored::Colorize;

use crate::builtins::{self, BuiltinResult};
use crate::config::{Config, PROMPT};
use crate::control::JobControl;
use crate::error::{Result, ShellError};
use crate::job::JobState;
use crate::launcher;
use crate::parser::{self, ParsedLine};
use crate::signals::{NixProcessControl, SignalMask};

pub struct Shell {
    config: Config,
    jobs: Arc<JobControl>,
    os: NixProcessControl,
}

impl Shell {
    pub fn new(config: Config) -> Self {
        let jobs = Arc::new(JobControl::new(config.max_jobs, config.poll_interval));
        Self {
            config,
            jobs,
            os: NixProcessControl,
        }
    }

    pub fn job_control(&self) -> Arc<JobControl> {
        Arc::clone(&self.jobs)
    }

    /// The read/eval loop. Returns on end of input or `quit`.
    pub fn exec(&mut self) -> Result<()> {
        let stdin = io::stdin();
        let mut buf = Vec::new();
        loop {
            self.report_events();
            if self.config.emit_prompt {
                print!("{}", PROMPT.green().bold());
                io::stdout().flush()?;
            }

            buf.clear();
            if stdin.lock().read_until(b'\n', &mut buf)? == 0 {
                // ctrl-d
                io::stdout().flush()?;
                return Ok(());
            }
            let line = String::from_utf8_lossy(&buf);

            match self.eval(&line) {
                Ok(BuiltinResult::Exit) => return Ok(()),
                Ok(_) => {}
                Err(ShellError::Io(e)) => return Err(ShellError::Io(e)),
                Err(e) => println!("{}", e),
            }
            self.report_events();
            io::stdout().flush()?;
        }
    }

    /// Evaluates one command line: builtins run in place, anything else is
    /// launched as a job.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn eval(&mut self, cmdline: &str) -> Result<BuiltinResult> {
        let Some(parsed) = parser::parse_line(cmdline) else {
            return Ok(BuiltinResult::Handled);
        };
        let mut out = io::stdout();
        match builtins::try_builtin(&parsed.argv, &self.jobs, &self.os, &mut out)? {
            BuiltinResult::NotBuiltin => {
                self.launch(&parsed, cmdline.trim_end())?;
                Ok(BuiltinResult::Handled)
            }
            handled => Ok(handled),
        }
    }

    fn launch(&self, parsed: &ParsedLine, cmdline: &str) -> Result<()> {
        let state = if parsed.background {
            JobState::Background
        } else {
            JobState::Foreground
        };

        // Job-control signals stay blocked and the table stays locked from
        // before fork until the child is registered, so the reaper cannot
        // see the child before its entry exists.
        let mask = SignalMask::block()?;
        let mut reg = self.jobs.lock();
        if reg.table.is_full() {
            return Err(ShellError::TableFull {
                capacity: reg.table.capacity(),
            });
        }
        let pid = launcher::spawn(&parsed.argv)?;
        let jid = reg.table.insert(pid, state, cmdline)?;
        tracing::debug!(jid, %pid, ?state, tracked = reg.table.len(), "registered job");
        drop(reg);
        drop(mask);

        if self.config.verbose {
            println!("Added job [{}] {} {}", jid, pid, cmdline);
        }
        if parsed.background {
            println!("[{}] ({}) {}", jid, pid, cmdline);
        } else {
            self.jobs.wait_foreground(pid);
        }
        Ok(())
    }

    /// Prints what the signal handlers recorded since the last call.
    fn report_events(&self) {
        for event in self.jobs.drain_events() {
            if event.is_verbose_only() && !self.config.verbose {
                continue;
            }
            println!("{}", event);
        }
    }
}
