//! Shell Options and Expansion Limits
//!
//! Option flags that change expansion behavior (set -u, set -e) and the
//! resource limits the expansion core enforces to stay well-behaved on
//! adversarial input.

/// Option flags consulted during expansion.
///
/// Only the options that change expansion semantics live here; everything
/// else (noglob, xtrace, ...) belongs to the executor.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellOptions {
    /// set -u: referencing an unset variable is an error.
    pub nounset: bool,
    /// set -e: the executor aborts on nonzero status; expansion only
    /// reports it through $- and leaves enforcement to the caller.
    pub errexit: bool,
}

impl ShellOptions {
    /// Render the option flags the way $- does.
    pub fn flags_string(&self) -> String {
        let mut flags = String::from("h");
        if self.errexit {
            flags.push('e');
        }
        if self.nounset {
            flags.push('u');
        }
        flags.push('s');
        flags
    }
}

/// Resource limits for a single expansion.
///
/// These exist to bound memory and recursion on adversarial input. They are
/// deliberately generous for normal interactive use.
#[derive(Debug, Clone, Copy)]
pub struct ExpansionLimits {
    /// Maximum size of one expanded word in bytes.
    pub max_word_size: usize,
    /// Maximum bytes captured from one command substitution.
    pub max_capture_size: usize,
    /// Maximum nesting depth of mutually recursive expansions.
    pub max_recursion_depth: usize,
}

impl Default for ExpansionLimits {
    fn default() -> Self {
        Self {
            max_word_size: 16 * 1024,
            max_capture_size: 1024 * 1024,
            max_recursion_depth: 64,
        }
    }
}
