use std::env;
use std::time::Duration;

pub const PROMPT: &str = "tsh> ";
pub const DEFAULT_MAX_JOBS: usize = 16;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Print `tsh> ` before reading each line. Off with `-p`.
    pub emit_prompt: bool,
    /// Job-table diagnostics on stdout. On with `-v`.
    pub verbose: bool,
    pub max_jobs: usize,
    /// Upper bound on how long the foreground wait sleeps between checks.
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            emit_prompt: true,
            verbose: false,
            max_jobs: DEFAULT_MAX_JOBS,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// `-h` or an unknown flag was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRequested;

impl Config {
    /// Parses the flags after the program name. Flags may be grouped
    /// (`-vp`); words not starting with `-` are ignored.
    pub fn from_args<I>(args: I) -> Result<Self, UsageRequested>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Config::default();
        for arg in args {
            let Some(flags) = arg.strip_prefix('-') else {
                continue;
            };
            for c in flags.chars() {
                match c {
                    'v' => config.verbose = true,
                    'p' => config.emit_prompt = false,
                    _ => return Err(UsageRequested),
                }
            }
        }
        Ok(config)
    }

    /// Applies `TSH_MAX_JOBS` and `TSH_POLL_MS` when they hold a positive
    /// number.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(n) = positive_env("TSH_MAX_JOBS") {
            self.max_jobs = n as usize;
        }
        if let Some(ms) = positive_env("TSH_POLL_MS") {
            self.poll_interval = Duration::from_millis(ms);
        }
        self
    }
}

fn positive_env(name: &str) -> Option<u64> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            tracing::warn!("ignoring {}={:?}: expected a positive integer", name, raw);
            None
        }
    }
}

pub fn usage() -> &'static str {
    "Usage: shell [-hvp]\n   -h   print this message\n   -v   print additional diagnostic information\n   -p   do not emit a command prompt"
}
