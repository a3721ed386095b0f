//! Starting external programs.
//!
//! Every child gets its own process group so that ctrl-c and ctrl-z,
//! which the terminal sends to the shell's group, never reach it
//! directly; the shell forwards them to the foreground job instead.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use nix::unistd::{self, ForkResult, Pid};

use crate::error::{ExitStatus, Result, ShellError};
use crate::signals;

/// Finds the file to execute for `name`.
///
/// Names containing a slash are used as paths (normalized); bare names are
/// looked up on `PATH`. When nothing is found the name is returned as is
/// and exec reports the failure from the child.
pub fn resolve_program(name: &str) -> PathBuf {
    if name.contains('/') {
        return path_clean::clean(name);
    }
    which::which(name).unwrap_or_else(|_| PathBuf::from(name))
}

/// Everything the child needs, allocated before fork. The child must not
/// allocate: the signal thread may hold the allocator lock at fork time.
struct ExecImage {
    path: CString,
    /// Owns the strings `argv_ptrs` points into.
    argv: Vec<CString>,
    /// NULL-terminated, as `execv(2)` expects.
    argv_ptrs: Vec<*const libc::c_char>,
    not_found: Vec<u8>,
}

impl ExecImage {
    fn new(argv: &[String]) -> Result<Self> {
        let name = argv.first().ok_or(ShellError::EmptyCommand)?;
        let path = resolve_program(name);
        let path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| ShellError::NulByte(name.clone()))?;
        let argv = argv
            .iter()
            .map(|a| CString::new(a.as_bytes()).map_err(|_| ShellError::NulByte(a.clone())))
            .collect::<Result<Vec<_>>>()?;
        let argv_ptrs = argv
            .iter()
            .map(|a| a.as_ptr())
            .chain(std::iter::once(std::ptr::null()))
            .collect();
        Ok(Self {
            path,
            argv,
            argv_ptrs,
            not_found: format!("{}: Command not found\n", name).into_bytes(),
        })
    }
}

/// Forks a child running `argv` in a new process group and returns its pid
/// without waiting for it.
///
/// The caller is expected to hold the job table lock and a
/// [`signals::SignalMask`] so the child can be registered before any
/// status change about it is handled.
pub fn spawn(argv: &[String]) -> Result<Pid> {
    let image = ExecImage::new(argv)?;

    // SAFETY: the child only makes async-signal-safe calls before exec or _exit.
    match unsafe { unistd::fork() } {
        Ok(ForkResult::Child) => exec_child(&image),
        Ok(ForkResult::Parent { child }) => {
            // Also set the group from the parent so that a signal forwarded
            // right after fork already finds it. EACCES once the child has
            // exec'd is expected.
            let _ = unistd::setpgid(child, child);
            tracing::debug!(
                pid = %child,
                program = ?image.path,
                argc = image.argv.len(),
                "launched"
            );
            Ok(child)
        }
        Err(e) => Err(ShellError::Fork(e)),
    }
}

fn exec_child(image: &ExecImage) -> ! {
    let _ = unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0));
    signals::reset_in_child();
    // SAFETY: both pointers come from `image`, which outlives the call, and
    // the argument array is NULL-terminated. execv(2) and the write(2) and
    // _exit(2) below are async-signal-safe and allocate nothing. _exit keeps
    // shell destructors and atexit handlers from running in the child.
    unsafe {
        libc::execv(image.path.as_ptr(), image.argv_ptrs.as_ptr());
        libc::write(
            libc::STDOUT_FILENO,
            image.not_found.as_ptr().cast(),
            image.not_found.len(),
        );
        libc::_exit(ExitStatus::CommandNotFound.into())
    }
}
