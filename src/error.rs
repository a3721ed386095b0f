use nix::errno::Errno;
use num_enum::IntoPrimitive;
use thiserror::Error;

/// Process exit statuses used by the shell and its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive)]
#[repr(i32)]
pub enum ExitStatus {
    Success = 0,
    /// Usage shown, SIGQUIT received, or a fatal setup error.
    Failure = 1,
    /// Set by a child whose program could not be executed.
    CommandNotFound = 127,
}

/// Errors surfaced by the shell while evaluating a command line.
///
/// Everything except `Install` and `Io` is reported on the offending
/// command and the read/eval loop continues.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("{command} command requires PID or %jobid argument")]
    MissingArgument { command: &'static str },

    #[error("{command}: argument must be a PID or %jobid")]
    BadArgument { command: &'static str },

    #[error("%{0}: No such job")]
    NoSuchJob(u32),

    #[error("({0}): No such process")]
    NoSuchProcess(i32),

    #[error("Tried to create too many jobs (max {capacity})")]
    TableFull { capacity: usize },

    #[error("empty command")]
    EmptyCommand,

    #[error("{0}: argument contains a NUL byte")]
    NulByte(String),

    #[error("invalid process id {0}")]
    InvalidPid(i32),

    #[error("fork error: {0}")]
    Fork(Errno),

    #[error("signal error: {0}")]
    Signal(Errno),

    #[error("signal handler installation failed")]
    Install(#[source] std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ShellError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_statuses() {
        assert_eq!(i32::from(ExitStatus::Success), 0);
        assert_eq!(i32::from(ExitStatus::Failure), 1);
        assert_eq!(i32::from(ExitStatus::CommandNotFound), 127);
    }

    #[test]
    fn messages_match_reference_shell() {
        assert_eq!(
            ShellError::MissingArgument { command: "fg" }.to_string(),
            "fg command requires PID or %jobid argument"
        );
        assert_eq!(
            ShellError::BadArgument { command: "bg" }.to_string(),
            "bg: argument must be a PID or %jobid"
        );
        assert_eq!(ShellError::NoSuchJob(5).to_string(), "%5: No such job");
        assert_eq!(
            ShellError::NoSuchProcess(4242).to_string(),
            "(4242): No such process"
        );
    }

    #[test]
    fn wrapped_io_causes_are_reported_once() {
        let cause = || std::io::Error::new(std::io::ErrorKind::InvalidData, "bad bytes");

        let err = anyhow::Error::from(ShellError::Io(cause()));
        assert_eq!(format!("{:#}", err), "bad bytes");

        let err = anyhow::Error::from(ShellError::Install(cause()));
        let shown = format!("{:#}", err);
        assert_eq!(shown, "signal handler installation failed: bad bytes");
        assert_eq!(shown.matches("bad bytes").count(), 1);
    }
}
