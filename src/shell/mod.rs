//! Shell State
//!
//! The variable store and option flags the expansion core operates on.
//! The executor owns these; expansion borrows them per command.

pub mod nameref;
pub mod options;
pub mod vars;

pub use options::{ExpansionLimits, ShellOptions};
pub use vars::{Scope, SetError, ShellVars, VarAttrs, DEFAULT_IFS};
