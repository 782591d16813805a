//! Nameref (declare -n) resolution
//!
//! A nameref's scalar value is the name of another variable; reads and
//! writes redirect transparently. Resolution is bounded and breaks cleanly
//! on cycles, invalid targets, and empty namerefs.

use std::collections::HashSet;

use super::vars::ShellVars;

/// Maximum nameref chain length. Chains longer than this (and cycles) stop
/// resolving and keep the last name reached.
pub const MAX_NAMEREF_DEPTH: usize = 10;

/// Check if a string is a valid variable name.
pub fn is_valid_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    match bytes.first() {
        Some(b'a'..=b'z') | Some(b'A'..=b'Z') | Some(b'_') => {}
        _ => return false,
    }
    bytes[1..]
        .iter()
        .all(|&b| matches!(b, b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_'))
}

/// Resolve a nameref chain to its final variable name.
///
/// Returns the input name unchanged when it is not a nameref. Stops (and
/// returns the last name reached) on: a non-nameref target, an empty or
/// invalid target value, a cycle, or a chain longer than
/// [`MAX_NAMEREF_DEPTH`]. This function never loops.
pub fn resolve(vars: &ShellVars, name: &str) -> String {
    if !vars.attributes(name).nameref {
        return name.to_string();
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut current = name.to_string();

    for _ in 0..MAX_NAMEREF_DEPTH {
        if !vars.attributes(&current).nameref {
            return current;
        }
        if !seen.insert(current.clone()) {
            // Cycle: stop at the name where it closed.
            return current;
        }
        let target = match vars.raw_get(&current) {
            Some(t) if !t.is_empty() => t.to_string(),
            // Empty or unset nameref reads/writes itself.
            _ => return current,
        };
        if !is_valid_name(&target) {
            return current;
        }
        current = target;
    }

    current
}
