//! den - word expansion and arithmetic for a bash-compatible shell
//!
//! This library is the expansion core of the den shell: it turns a raw
//! shell word into argv-ready fields, running the full pipeline of tilde
//! expansion, parameter expansion (${...} in all its forms), arithmetic
//! expansion, command and process substitution, string interpolation,
//! IFS field splitting, and quote removal.
//!
//! The outer executor provides a [`shell::ShellVars`] store and an
//! execute-command callback; everything else lives here.

pub mod arith;
pub mod errors;
pub mod expand;
pub mod shell;

pub use errors::{ArithError, ExpansionError};
pub use expand::{remove_quotes, split_fields, Expansion, ExecuteCommandFn, Field};
pub use shell::{ExpansionLimits, Scope, ShellOptions, ShellVars};
