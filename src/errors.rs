//! Expansion Errors
//!
//! Error taxonomy for word expansion and arithmetic evaluation:
//! - UnboundVariable: set -u and a referenced variable is missing
//! - ParameterNullOrNotSet: ${VAR:?msg} triggered
//! - Arith*: arithmetic failures (surfaced or degraded depending on context)
//! - MalformedExpansion: unbalanced braces/parens/quotes
//! - ExpansionTooLong: per-word buffer limit exceeded
//! - IoFailure: fork/pipe/read failure during substitution
//!
//! Propagation policy: arithmetic failures inside $((...)) degrade to the
//! literal value 0 during word expansion but are surfaced through arith_eval;
//! malformed ${...} / $((...)) / $(...) re-emit their literal text; IO
//! failures degrade to an empty expansion with a nonzero $?.

use thiserror::Error;

/// Errors produced by arithmetic evaluation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArithError {
    #[error("division by 0")]
    DivByZero,

    #[error("exponent less than 0")]
    NegativeExponent,

    #[error("arithmetic overflow")]
    Overflow,

    #[error("syntax error in expression (error token is \"{0}\")")]
    Malformed(String),
}

/// Errors produced by word expansion.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExpansionError {
    /// set -u is active and a referenced variable is unset.
    #[error("{0}: unbound variable")]
    UnboundVariable(String),

    /// ${VAR:?msg}: the caller should print the message and abort the
    /// current (sub)shell with a nonzero status.
    #[error("{name}: {message}")]
    ParameterNullOrNotSet { name: String, message: String },

    #[error(transparent)]
    Arith(#[from] ArithError),

    /// Unbalanced braces, parens, or quotes inside an expansion form.
    #[error("{0}: bad substitution")]
    MalformedExpansion(String),

    /// The expanded word grew past the configured per-word limit.
    #[error("expansion exceeds {0} bytes")]
    ExpansionTooLong(usize),

    /// fork/pipe/read failed while running a substitution child.
    #[error("substitution failed: {0}")]
    IoFailure(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arith_error_display() {
        assert_eq!(ArithError::DivByZero.to_string(), "division by 0");
        assert_eq!(
            ArithError::Malformed("++".to_string()).to_string(),
            "syntax error in expression (error token is \"++\")"
        );
    }

    #[test]
    fn test_expansion_error_display() {
        let err = ExpansionError::UnboundVariable("FOO".to_string());
        assert_eq!(err.to_string(), "FOO: unbound variable");

        let err = ExpansionError::ParameterNullOrNotSet {
            name: "BAR".to_string(),
            message: "parameter null or not set".to_string(),
        };
        assert_eq!(err.to_string(), "BAR: parameter null or not set");
    }

    #[test]
    fn test_arith_error_converts() {
        let err: ExpansionError = ArithError::Overflow.into();
        assert!(matches!(err, ExpansionError::Arith(ArithError::Overflow)));
    }
}
