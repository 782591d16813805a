//! Command Substitution
//!
//! Runs $(...) and `...` bodies and captures their stdout. On unix the
//! mechanism is pipe + fork: the child redirects its stdout into the pipe,
//! sends stderr to /dev/null, re-enters the shell through the executor's
//! callback (so functions and variables are visible), and exits with the
//! command's status. The parent drains the pipe into a bounded buffer,
//! waits for the child, and propagates the exit status to $?.
//!
//! Results are never cached: the same command can produce different output
//! on every run ($RANDOM, date).
//!
//! IO failures are not fatal: they degrade to an empty expansion with $?
//! set to 127 and a warning recorded.

use crate::errors::ExpansionError;

use super::Expansion;

/// $? sentinel for a substitution that failed at the plumbing level.
pub(crate) const SUBST_FAILURE_STATUS: i32 = 127;

/// Run a command substitution body and return its captured output with
/// trailing newlines stripped.
pub(crate) fn capture_command(
    exp: &mut Expansion,
    command: &str,
) -> Result<String, ExpansionError> {
    if exp.exec.is_none() {
        exp.warnings
            .push(format!("command substitution unavailable: $({})", command));
        exp.vars.set_last_exit_code(SUBST_FAILURE_STATUS);
        return Ok(String::new());
    }

    match capture(exp, command) {
        Ok((output, status)) => {
            exp.vars.set_last_exit_code(status);
            Ok(output.trim_end_matches('\n').to_string())
        }
        Err(err) => {
            exp.warnings.push(format!("command substitution: {}", err));
            exp.vars.set_last_exit_code(SUBST_FAILURE_STATUS);
            Ok(String::new())
        }
    }
}

#[cfg(unix)]
fn capture(exp: &mut Expansion, command: &str) -> std::io::Result<(String, i32)> {
    let max_capture = exp.limits.max_capture_size;
    let mut fds = [0i32; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    let (read_fd, write_fd) = (fds[0], fds[1]);

    let pid = unsafe { libc::fork() };
    if pid < 0 {
        let err = std::io::Error::last_os_error();
        unsafe {
            libc::close(read_fd);
            libc::close(write_fd);
        }
        return Err(err);
    }

    if pid == 0 {
        // Child: stdout into the pipe, stderr to /dev/null, then re-enter
        // the shell with the command. _exit avoids running parent atexit
        // handlers and double-flushing buffered output.
        unsafe {
            libc::close(read_fd);
            libc::dup2(write_fd, 1);
            libc::close(write_fd);
            let devnull =
                libc::open(b"/dev/null\0".as_ptr() as *const libc::c_char, libc::O_WRONLY);
            if devnull >= 0 {
                libc::dup2(devnull, 2);
                libc::close(devnull);
            }
        }
        let status = match exp.exec.as_mut() {
            Some(exec) => exec(command),
            None => SUBST_FAILURE_STATUS,
        };
        unsafe { libc::_exit(status & 0xff) }
    }

    // Parent: drain the pipe, then reap the child.
    unsafe { libc::close(write_fd) };
    let mut output: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = unsafe {
            libc::read(read_fd, chunk.as_mut_ptr() as *mut libc::c_void, chunk.len())
        };
        if n < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            unsafe {
                libc::close(read_fd);
                libc::waitpid(pid, std::ptr::null_mut(), 0);
            }
            return Err(err);
        }
        if n == 0 {
            break;
        }
        // Keep draining past the cap so the child never blocks on a full
        // pipe, but stop storing.
        if output.len() < max_capture {
            let take = (max_capture - output.len()).min(n as usize);
            output.extend_from_slice(&chunk[..take]);
        }
    }
    unsafe { libc::close(read_fd) };

    let mut status: libc::c_int = 0;
    let rc = unsafe { libc::waitpid(pid, &mut status, 0) };
    let code = if rc < 0 {
        SUBST_FAILURE_STATUS
    } else if libc::WIFEXITED(status) {
        libc::WEXITSTATUS(status)
    } else if libc::WIFSIGNALED(status) {
        128 + libc::WTERMSIG(status)
    } else {
        SUBST_FAILURE_STATUS
    };

    Ok((String::from_utf8_lossy(&output).into_owned(), code))
}

/// Platform fallback: spawn a subordinate shell and capture its output.
#[cfg(not(unix))]
fn capture(exp: &mut Expansion, command: &str) -> std::io::Result<(String, i32)> {
    let _ = &exp.exec;
    shell_capture(command, exp.limits.max_capture_size)
}

/// Run a command through a child shell process, capturing stdout.
#[cfg(not(unix))]
fn shell_capture(command: &str, max_capture: usize) -> std::io::Result<(String, i32)> {
    let shell = std::env::var("SHELL").unwrap_or_else(|_| "sh".to_string());
    let output = std::process::Command::new(shell)
        .arg("-c")
        .arg(command)
        .stderr(std::process::Stdio::null())
        .output()?;
    let mut bytes = output.stdout;
    bytes.truncate(max_capture);
    Ok((
        String::from_utf8_lossy(&bytes).into_owned(),
        output.status.code().unwrap_or(SUBST_FAILURE_STATUS),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::ShellVars;

    #[test]
    fn test_no_executor_degrades_to_empty() {
        let mut vars = ShellVars::new();
        let mut exp = Expansion::new(&mut vars);
        let result = capture_command(&mut exp, "echo hi").unwrap();
        assert_eq!(result, "");
        assert_eq!(exp.vars.last_exit_code(), SUBST_FAILURE_STATUS);
        assert_eq!(exp.warnings.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_capture_output_and_status() {
        let mut vars = ShellVars::new();
        let mut exp = Expansion::with_executor(
            &mut vars,
            Box::new(|command: &str| {
                // Child-side: write straight to fd 1, which the parent has
                // connected to the capture pipe.
                let text = format!("ran:{}\n", command);
                unsafe {
                    libc::write(1, text.as_ptr() as *const libc::c_void, text.len());
                }
                0
            }),
        );
        let result = capture_command(&mut exp, "date").unwrap();
        assert_eq!(result, "ran:date");
        assert_eq!(exp.vars.last_exit_code(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_propagates() {
        let mut vars = ShellVars::new();
        let mut exp = Expansion::with_executor(&mut vars, Box::new(|_: &str| 1));
        let result = capture_command(&mut exp, "false").unwrap();
        assert_eq!(result, "");
        assert_eq!(exp.vars.last_exit_code(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_trailing_newlines_stripped() {
        let mut vars = ShellVars::new();
        let mut exp = Expansion::with_executor(
            &mut vars,
            Box::new(|_: &str| {
                let text = "line\n\n\n";
                unsafe {
                    libc::write(1, text.as_ptr() as *const libc::c_void, text.len());
                }
                0
            }),
        );
        let result = capture_command(&mut exp, "cmd").unwrap();
        assert_eq!(result, "line");
    }
}
