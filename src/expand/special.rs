//! Special Parameters
//!
//! Values for the one-character special parameters ($?, $$, $#, $!, $_,
//! $0, $-) plus the named shell globals the expander computes itself
//! (LINENO, SECONDS, RANDOM, UID, EUID, PPID, HOSTNAME). $@ and $* live in
//! the word scanner because their joining depends on quote context.

use crate::shell::{ShellOptions, ShellVars};

/// Named variables that are computed rather than stored.
pub(crate) fn is_named_special(name: &str) -> bool {
    matches!(
        name,
        "LINENO" | "SECONDS" | "RANDOM" | "UID" | "EUID" | "PPID" | "HOSTNAME"
    )
}

/// Look up a special parameter. Returns None for names that are not
/// special (ordinary variables, $@/$*).
pub(crate) fn lookup_special(
    vars: &mut ShellVars,
    options: &ShellOptions,
    name: &str,
) -> Option<String> {
    match name {
        "?" => Some(vars.last_exit_code().to_string()),
        "$" => Some(vars.shell_pid.to_string()),
        "!" => {
            if vars.last_background_pid == 0 {
                Some(String::new())
            } else {
                Some(vars.last_background_pid.to_string())
            }
        }
        "#" => Some(vars.positional_params().len().to_string()),
        "_" => Some(vars.last_arg.clone()),
        "-" => Some(options.flags_string()),
        "0" => Some(vars.shell_name.clone()),
        "LINENO" => Some(vars.line_number.to_string()),
        "SECONDS" => Some(vars.seconds().to_string()),
        "RANDOM" => Some(vars.next_random().to_string()),
        "PPID" => Some(vars.parent_pid.to_string()),
        "UID" => Some(uid().to_string()),
        "EUID" => Some(euid().to_string()),
        "HOSTNAME" => Some(hostname()),
        _ => None,
    }
}

#[cfg(unix)]
fn uid() -> u32 {
    unsafe { libc::getuid() }
}

#[cfg(not(unix))]
fn uid() -> u32 {
    0
}

#[cfg(unix)]
fn euid() -> u32 {
    unsafe { libc::geteuid() }
}

#[cfg(not(unix))]
fn euid() -> u32 {
    0
}

#[cfg(unix)]
fn hostname() -> String {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return String::new();
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..len]).into_owned()
}

#[cfg(not(unix))]
fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_default()
}
