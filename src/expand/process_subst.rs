//! Process Substitution
//!
//! <(cmd) and >(cmd): fork a child wired to one end of a pipe and expand
//! to the path /dev/fd/N, where N is the parent's retained end. For <(cmd)
//! the child's stdout feeds the fd; for >(cmd) the fd feeds the child's
//! stdin.
//!
//! The children are detached: their lifetime is bound to the retained fd,
//! and [`Expansion::reap_children`] collects them opportunistically. The
//! caller owns the retained fd and closes it once the consuming command is
//! done with it.
//!
//! Where /dev/fd is unavailable the expression stays literal text.

use crate::errors::ExpansionError;

use super::Expansion;

/// Which way the pipe points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubstDirection {
    /// <(cmd): the caller reads what the child writes.
    Read,
    /// >(cmd): the caller writes what the child reads.
    Write,
}

/// Expand one process substitution, returning the /dev/fd path, or None
/// when the platform cannot support it (caller keeps the literal text).
pub(crate) fn process_substitute(
    exp: &mut Expansion,
    command: &str,
    direction: SubstDirection,
) -> Result<Option<String>, ExpansionError> {
    if !dev_fd_available() || exp.exec.is_none() {
        return Ok(None);
    }
    substitute(exp, command, direction)
}

#[cfg(unix)]
fn dev_fd_available() -> bool {
    std::path::Path::new("/dev/fd").exists()
}

#[cfg(not(unix))]
fn dev_fd_available() -> bool {
    false
}

#[cfg(unix)]
fn substitute(
    exp: &mut Expansion,
    command: &str,
    direction: SubstDirection,
) -> Result<Option<String>, ExpansionError> {
    let mut fds = [0i32; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(ExpansionError::IoFailure(
            std::io::Error::last_os_error().to_string(),
        ));
    }
    let (read_fd, write_fd) = (fds[0], fds[1]);

    let pid = unsafe { libc::fork() };
    if pid < 0 {
        let err = std::io::Error::last_os_error();
        unsafe {
            libc::close(read_fd);
            libc::close(write_fd);
        }
        return Err(ExpansionError::IoFailure(err.to_string()));
    }

    if pid == 0 {
        // Child: wire the pipe to stdout (for <) or stdin (for >), close
        // both raw ends, run the command, and leave without returning.
        unsafe {
            match direction {
                SubstDirection::Read => {
                    libc::close(read_fd);
                    libc::dup2(write_fd, 1);
                    libc::close(write_fd);
                }
                SubstDirection::Write => {
                    libc::close(write_fd);
                    libc::dup2(read_fd, 0);
                    libc::close(read_fd);
                }
            }
        }
        let status = match exp.exec.as_mut() {
            Some(exec) => exec(command),
            None => 127,
        };
        unsafe { libc::_exit(status & 0xff) }
    }

    // Parent: keep the opposite end and hand back its /dev/fd path.
    let retained = match direction {
        SubstDirection::Read => {
            unsafe { libc::close(write_fd) };
            read_fd
        }
        SubstDirection::Write => {
            unsafe { libc::close(read_fd) };
            write_fd
        }
    };
    exp.child_pids.push(pid);
    exp.retained_fds.push(retained);
    Ok(Some(format!("/dev/fd/{}", retained)))
}

#[cfg(not(unix))]
fn substitute(
    _exp: &mut Expansion,
    _command: &str,
    _direction: SubstDirection,
) -> Result<Option<String>, ExpansionError> {
    Ok(None)
}
