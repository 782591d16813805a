//! Word Expansion
//!
//! The expansion pipeline: a raw word goes through the scanner (tilde,
//! parameter, arithmetic, command/process substitution, interpolation),
//! the result is field-split against IFS, and each field gets its quotes
//! removed. The output is the argv-ready field list.
//!
//! An [`Expansion`] context is created per executed command, borrows the
//! executor's variable store (it must not outlive it), and is discarded
//! after producing argv. Expansions inside one word run strictly left to
//! right, so side effects ($((x++)), ${v:=d}, substitutions) observe
//! source order.

pub mod command_subst;
pub mod field_split;
pub mod interpolate;
pub mod param_ops;
pub mod parameter;
pub mod pattern;
pub mod process_subst;
pub mod quote;
pub mod special;
pub mod tilde;
pub mod word;

use crate::arith::{eval_str, ArithEnv};
use crate::errors::{ArithError, ExpansionError};
use crate::shell::{ExpansionLimits, ShellOptions, ShellVars};

pub use field_split::split_fields;
pub use quote::remove_quotes;

/// One argv-ready field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub text: String,
    /// True when any part of the field came from an unquoted expansion;
    /// the executor uses this to decide whether to glob the field.
    pub from_unquoted_expansion: bool,
}

/// The executor's command-runner: takes a command string, runs it with the
/// full shell state visible, returns its exit code. Command substitution
/// children call this after redirecting their stdio.
pub type ExecuteCommandFn<'a> = Box<dyn FnMut(&str) -> i32 + 'a>;

/// Per-command expansion context.
pub struct Expansion<'a> {
    pub vars: &'a mut ShellVars,
    pub options: ShellOptions,
    pub limits: ExpansionLimits,
    /// Diagnostics accumulated along the way (sensitive-name writes,
    /// degraded arithmetic, substitution plumbing failures).
    pub warnings: Vec<String>,
    pub(crate) exec: Option<ExecuteCommandFn<'a>>,
    pub(crate) depth: usize,
    /// Set once the recursion cap trips, so the failure surfaces instead
    /// of degrading to literal text somewhere up the stack.
    pub(crate) depth_exceeded: bool,
    /// Detached process-substitution children, reaped opportunistically.
    pub(crate) child_pids: Vec<i32>,
    /// Pipe ends backing /dev/fd paths; the caller closes them when the
    /// consuming command is done.
    pub(crate) retained_fds: Vec<i32>,
}

impl<'a> Expansion<'a> {
    pub fn new(vars: &'a mut ShellVars) -> Self {
        Self {
            vars,
            options: ShellOptions::default(),
            limits: ExpansionLimits::default(),
            warnings: Vec::new(),
            exec: None,
            depth: 0,
            depth_exceeded: false,
            child_pids: Vec::new(),
            retained_fds: Vec::new(),
        }
    }

    /// Context with an execute-command callback for $(...), `...`,
    /// <(...) and >(...).
    pub fn with_executor(vars: &'a mut ShellVars, exec: ExecuteCommandFn<'a>) -> Self {
        let mut expansion = Self::new(vars);
        expansion.exec = Some(exec);
        expansion
    }

    pub fn with_options(mut self, options: ShellOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_limits(mut self, limits: ExpansionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Expand one word into argv fields.
    ///
    /// `skip_tilde` suppresses tilde expansion (quoted arguments).
    pub fn expand_word(
        &mut self,
        word: &str,
        skip_tilde: bool,
    ) -> Result<Vec<Field>, ExpansionError> {
        let scan = word::scan_word(self, word, skip_tilde)?;
        let ifs = self.vars.get_ifs();
        let raw_fields = field_split::split_expanded(&scan.buffer, &ifs);
        Ok(raw_fields
            .into_iter()
            .map(|raw| {
                let from_unquoted_expansion = scan
                    .unquoted_spans
                    .iter()
                    .any(|&(start, end)| start < raw.end && raw.start < end);
                Field {
                    text: remove_quotes(&raw.text),
                    from_unquoted_expansion,
                }
            })
            .collect())
    }

    /// Evaluate an arithmetic expression, as ((...)) and `let` do.
    ///
    /// Unlike $((...)) inside a word, errors surface to the caller here.
    /// Inner ${...} and $(...) substitutions are resolved first.
    pub fn arith_eval(&mut self, expr: &str) -> Result<i64, ArithError> {
        let resolved = match word::pre_resolve(self, expr) {
            Ok(text) => text,
            Err(err) => return Err(ArithError::Malformed(err.to_string())),
        };
        self.eval_arith(&resolved)
    }

    /// Reap any finished process-substitution children without blocking.
    pub fn reap_children(&mut self) {
        #[cfg(unix)]
        self.child_pids.retain(|&pid| {
            let mut status: libc::c_int = 0;
            let rc = unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG) };
            rc == 0
        });
    }

    /// The /dev/fd pipe ends currently held open for process substitution.
    pub fn retained_fds(&self) -> &[i32] {
        &self.retained_fds
    }

    /// Close all retained process-substitution fds (after the consuming
    /// command has finished with them).
    pub fn close_retained_fds(&mut self) {
        #[cfg(unix)]
        for fd in self.retained_fds.drain(..) {
            unsafe { libc::close(fd) };
        }
        #[cfg(not(unix))]
        self.retained_fds.clear();
    }

    /// Arithmetic on an already pre-resolved expression.
    pub(crate) fn eval_arith(&mut self, expr: &str) -> Result<i64, ArithError> {
        let mut env = ArithEnv::new(&mut *self.vars, self.options, &mut self.warnings);
        eval_str(expr, &mut env)
    }

    /// Recursive expansion of an operand word (a ${v:-word} default, a
    /// pattern, a subscript). Quotes survive into the result.
    pub(crate) fn sub_expand(&mut self, text: &str) -> Result<String, ExpansionError> {
        self.enter()?;
        let result = word::scan_word(self, text, true).map(|scan| scan.buffer);
        self.leave();
        result
    }

    /// Recursive expansion followed by quote removal (assignment values,
    /// patterns, error messages).
    pub(crate) fn sub_expand_quoted(&mut self, text: &str) -> Result<String, ExpansionError> {
        Ok(remove_quotes(&self.sub_expand(text)?))
    }

    pub(crate) fn enter(&mut self) -> Result<(), ExpansionError> {
        if self.depth >= self.limits.max_recursion_depth {
            self.depth_exceeded = true;
            return Err(ExpansionError::MalformedExpansion(
                "expansion nesting too deep".to_string(),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth -= 1;
    }
}

impl Drop for Expansion<'_> {
    fn drop(&mut self) {
        self.reap_children();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::Scope;

    fn fields(vars: &mut ShellVars, word: &str) -> Vec<String> {
        let mut exp = Expansion::new(vars);
        exp.expand_word(word, false)
            .unwrap()
            .into_iter()
            .map(|f| f.text)
            .collect()
    }

    fn one_field(vars: &mut ShellVars, word: &str) -> String {
        let all = fields(vars, word);
        assert_eq!(all.len(), 1, "expected one field from {:?}, got {:?}", word, all);
        all.into_iter().next().unwrap()
    }

    #[test]
    fn test_literal_word_passthrough() {
        let mut vars = ShellVars::new();
        assert_eq!(fields(&mut vars, "hello"), vec!["hello"]);
        assert_eq!(fields(&mut vars, "'a b'"), vec!["a b"]);
        assert_eq!(fields(&mut vars, "\"a b\""), vec!["a b"]);
    }

    #[test]
    fn test_simple_variable_expansion() {
        let mut vars = ShellVars::new();
        vars.set("x", "value", Scope::Visible).unwrap();
        assert_eq!(fields(&mut vars, "$x"), vec!["value"]);
        assert_eq!(fields(&mut vars, "${x}"), vec!["value"]);
        assert_eq!(fields(&mut vars, "pre-${x}-post"), vec!["pre-value-post"]);
    }

    #[test]
    fn test_unquoted_expansion_splits() {
        let mut vars = ShellVars::new();
        vars.set("x", "a b  c", Scope::Visible).unwrap();
        assert_eq!(fields(&mut vars, "$x"), vec!["a", "b", "c"]);
        assert_eq!(fields(&mut vars, "\"$x\""), vec!["a b  c"]);
    }

    #[test]
    fn test_split_flag_marks_unquoted_expansions() {
        let mut vars = ShellVars::new();
        vars.set("g", "*.txt", Scope::Visible).unwrap();
        let mut exp = Expansion::new(&mut vars);
        let unquoted = exp.expand_word("$g", false).unwrap();
        assert!(unquoted[0].from_unquoted_expansion);
        let quoted = exp.expand_word("\"$g\"", false).unwrap();
        assert!(!quoted[0].from_unquoted_expansion);
        let literal = exp.expand_word("*.txt", false).unwrap();
        assert!(!literal[0].from_unquoted_expansion);
    }

    #[test]
    fn test_escaped_dollar_is_literal() {
        let mut vars = ShellVars::new();
        vars.set("x", "value", Scope::Visible).unwrap();
        assert_eq!(fields(&mut vars, "\\$x"), vec!["$x"]);
        assert_eq!(fields(&mut vars, "\"\\$x\""), vec!["$x"]);
    }

    #[test]
    fn test_single_quotes_suppress_expansion() {
        let mut vars = ShellVars::new();
        vars.set("x", "value", Scope::Visible).unwrap();
        assert_eq!(fields(&mut vars, "'$x'"), vec!["$x"]);
    }

    #[test]
    fn test_tilde_expansion() {
        let mut vars = ShellVars::new();
        vars.set("HOME", "/home/alex", Scope::Visible).unwrap();
        assert_eq!(fields(&mut vars, "~/src"), vec!["/home/alex/src"]);
        // skip_tilde suppresses it.
        let mut exp = Expansion::new(&mut vars);
        let quoted = exp.expand_word("~/src", true).unwrap();
        assert_eq!(quoted[0].text, "~/src");
    }

    // Scenario: arithmetic expansion with variable assignment.
    #[test]
    fn test_arith_assignment_side_effect() {
        let mut vars = ShellVars::new();
        vars.set("x", "10", Scope::Visible).unwrap();
        assert_eq!(one_field(&mut vars, "result=$((x += 5))"), "result=15");
        assert_eq!(vars.get("x"), Some("15".to_string()));
    }

    // Scenario: parameter strip, shortest and longest.
    #[test]
    fn test_strip_operators() {
        let mut vars = ShellVars::new();
        vars.set("file", "archive.tar.gz", Scope::Visible).unwrap();
        assert_eq!(one_field(&mut vars, "\"${file%.*}\""), "archive.tar");
        assert_eq!(one_field(&mut vars, "\"${file%%.*}\""), "archive");
        assert_eq!(one_field(&mut vars, "\"${file#*.}\""), "tar.gz");
        assert_eq!(one_field(&mut vars, "\"${file##*.}\""), "gz");
    }

    // Scenario: associative keys enumeration, order stable within a call.
    #[test]
    fn test_assoc_key_enumeration() {
        let mut vars = ShellVars::new();
        vars.declare_assoc(
            "m",
            vec![
                ("one".to_string(), "1".to_string()),
                ("two".to_string(), "2".to_string()),
                ("three".to_string(), "3".to_string()),
            ],
        );
        let mut keys = fields(&mut vars, "${!m[@]}");
        let second = fields(&mut vars, "${!m[@]}");
        assert_eq!(keys, second);
        keys.sort();
        assert_eq!(keys, vec!["one", "three", "two"]);
    }

    // Scenario: pattern replacement, first and all occurrences.
    #[test]
    fn test_replace_operators() {
        let mut vars = ShellVars::new();
        vars.set("s", "a.b.c.d", Scope::Visible).unwrap();
        assert_eq!(one_field(&mut vars, "${s//./_}"), "a_b_c_d");
        assert_eq!(one_field(&mut vars, "${s/./_}"), "a_b.c.d");
    }

    #[test]
    fn test_anchored_replace() {
        let mut vars = ShellVars::new();
        vars.set("s", "aba", Scope::Visible).unwrap();
        assert_eq!(one_field(&mut vars, "${s/#a/X}"), "Xba");
        assert_eq!(one_field(&mut vars, "${s/%a/X}"), "abX");
    }

    #[test]
    fn test_default_operators() {
        let mut vars = ShellVars::new();
        assert_eq!(one_field(&mut vars, "${unset:-fallback}"), "fallback");
        vars.set("empty", "", Scope::Visible).unwrap();
        assert_eq!(one_field(&mut vars, "${empty:-fallback}"), "fallback");
        assert_eq!(fields(&mut vars, "${empty-fallback}"), Vec::<String>::new());
        vars.set("v", "set", Scope::Visible).unwrap();
        assert_eq!(one_field(&mut vars, "${v:-fallback}"), "set");
    }

    #[test]
    fn test_assign_default() {
        let mut vars = ShellVars::new();
        assert_eq!(one_field(&mut vars, "${name:=den}"), "den");
        assert_eq!(vars.get("name"), Some("den".to_string()));
        assert_eq!(one_field(&mut vars, "${name:=other}"), "den");
    }

    #[test]
    fn test_alternative_operator() {
        let mut vars = ShellVars::new();
        assert_eq!(fields(&mut vars, "${unset:+alt}"), Vec::<String>::new());
        vars.set("v", "x", Scope::Visible).unwrap();
        assert_eq!(one_field(&mut vars, "${v:+alt}"), "alt");
    }

    #[test]
    fn test_error_operator() {
        let mut vars = ShellVars::new();
        let mut exp = Expansion::new(&mut vars);
        let err = exp.expand_word("${missing:?not set here}", false).unwrap_err();
        assert_eq!(
            err,
            ExpansionError::ParameterNullOrNotSet {
                name: "missing".to_string(),
                message: "not set here".to_string(),
            }
        );
    }

    #[test]
    fn test_default_word_is_recursively_expanded() {
        let mut vars = ShellVars::new();
        vars.set("inner", "deep", Scope::Visible).unwrap();
        assert_eq!(one_field(&mut vars, "${unset:-$inner}"), "deep");
        assert_eq!(one_field(&mut vars, "${unset:-$((2 + 3))}"), "5");
    }

    #[test]
    fn test_substring_forms() {
        let mut vars = ShellVars::new();
        vars.set("s", "hello world", Scope::Visible).unwrap();
        assert_eq!(one_field(&mut vars, "${s:6}"), "world");
        assert_eq!(one_field(&mut vars, "${s:0:5}"), "hello");
        assert_eq!(one_field(&mut vars, "${s: -5}"), "world");
        assert_eq!(one_field(&mut vars, "${s:(-5):3}"), "wor");
        let short = fields(&mut vars, "${s:20}");
        assert_eq!(short, Vec::<String>::new());
    }

    #[test]
    fn test_substring_negative_beyond_start() {
        let mut vars = ShellVars::new();
        vars.set("s", "abc", Scope::Visible).unwrap();
        assert_eq!(fields(&mut vars, "\"${s: -5}\""), vec![""]);
    }

    #[test]
    fn test_case_operators() {
        let mut vars = ShellVars::new();
        vars.set("w", "hello World", Scope::Visible).unwrap();
        assert_eq!(one_field(&mut vars, "\"${w^^}\""), "HELLO WORLD");
        assert_eq!(one_field(&mut vars, "\"${w,,}\""), "hello world");
        assert_eq!(one_field(&mut vars, "\"${w^}\""), "Hello World");
        assert_eq!(one_field(&mut vars, "\"${w~~}\""), "HELLO wORLD");
        assert_eq!(one_field(&mut vars, "\"${w@U}\""), "HELLO WORLD");
        assert_eq!(one_field(&mut vars, "\"${w@Q}\""), "'hello World'");
    }

    #[test]
    fn test_length_forms() {
        let mut vars = ShellVars::new();
        vars.set("s", "hello", Scope::Visible).unwrap();
        vars.declare_array("a", vec!["x".into(), "y".into(), "z".into()]);
        vars.set_positional_params(vec!["p1".into(), "p2".into()]);
        assert_eq!(one_field(&mut vars, "${#s}"), "5");
        assert_eq!(one_field(&mut vars, "${#a[@]}"), "3");
        assert_eq!(one_field(&mut vars, "${#a[1]}"), "1");
        assert_eq!(one_field(&mut vars, "${#@}"), "2");
        assert_eq!(one_field(&mut vars, "${#}"), "2");
    }

    #[test]
    fn test_indirection() {
        let mut vars = ShellVars::new();
        vars.set("target", "payload", Scope::Visible).unwrap();
        vars.set("ref", "target", Scope::Visible).unwrap();
        assert_eq!(one_field(&mut vars, "${!ref}"), "payload");
    }

    #[test]
    fn test_prefix_enumeration() {
        let mut vars = ShellVars::new();
        vars.set("den_a", "1", Scope::Visible).unwrap();
        vars.set("den_b", "2", Scope::Visible).unwrap();
        vars.set("other", "3", Scope::Visible).unwrap();
        assert_eq!(fields(&mut vars, "${!den_@}"), vec!["den_a", "den_b"]);
    }

    #[test]
    fn test_array_element_and_slice() {
        let mut vars = ShellVars::new();
        vars.declare_array(
            "a",
            vec!["one".into(), "two".into(), "three".into(), "four".into()],
        );
        assert_eq!(one_field(&mut vars, "${a[1]}"), "two");
        assert_eq!(one_field(&mut vars, "${a[-1]}"), "four");
        assert_eq!(fields(&mut vars, "${a[@]}"), vec!["one", "two", "three", "four"]);
        assert_eq!(fields(&mut vars, "${a[@]:1:2}"), vec!["two", "three"]);
    }

    #[test]
    fn test_positional_at_and_star() {
        let mut vars = ShellVars::new();
        vars.set_positional_params(vec!["a b".into(), "c".into()]);
        // "$@" keeps parameters as separate fields, content unsplit.
        assert_eq!(fields(&mut vars, "\"$@\""), vec!["a b", "c"]);
        // Unquoted $@ additionally splits the contents.
        assert_eq!(fields(&mut vars, "$@"), vec!["a", "b", "c"]);
        // "$*" joins with the first IFS character.
        assert_eq!(fields(&mut vars, "\"$*\""), vec!["a b c"]);
        vars.set("IFS", ":", Scope::Visible).unwrap();
        assert_eq!(fields(&mut vars, "\"$*\""), vec!["a b:c"]);
    }

    #[test]
    fn test_quoted_at_with_no_params_vanishes() {
        let mut vars = ShellVars::new();
        assert_eq!(fields(&mut vars, "\"$@\""), Vec::<String>::new());
        // But adjacent text keeps its field.
        assert_eq!(fields(&mut vars, "x\"$@\""), vec!["x"]);
    }

    #[test]
    fn test_positional_slicing() {
        let mut vars = ShellVars::new();
        vars.set_positional_params(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(fields(&mut vars, "\"${@:2}\""), vec!["b", "c"]);
        assert_eq!(fields(&mut vars, "\"${@:0:1}\""), vec!["den"]);
    }

    #[test]
    fn test_arithmetic_expansion() {
        let mut vars = ShellVars::new();
        assert_eq!(one_field(&mut vars, "$((1 + 2 * 3))"), "7");
        assert_eq!(one_field(&mut vars, "$(( $((1+1)) + 1 ))"), "3");
    }

    #[test]
    fn test_arith_error_degrades_to_zero_in_words() {
        let mut vars = ShellVars::new();
        let mut exp = Expansion::new(&mut vars);
        let result = exp.expand_word("$((1/0))", false).unwrap();
        assert_eq!(result[0].text, "0");
        assert_eq!(exp.warnings.len(), 1);
    }

    #[test]
    fn test_arith_eval_surfaces_errors() {
        let mut vars = ShellVars::new();
        let mut exp = Expansion::new(&mut vars);
        assert_eq!(exp.arith_eval("1/0"), Err(ArithError::DivByZero));
        assert_eq!(exp.arith_eval("x = 3 * 4"), Ok(12));
        assert_eq!(exp.vars.get("x"), Some("12".to_string()));
    }

    #[test]
    fn test_arith_with_parameter_expansion_inside() {
        let mut vars = ShellVars::new();
        vars.set("n", "6", Scope::Visible).unwrap();
        assert_eq!(one_field(&mut vars, "$(( ${n} * 7 ))"), "42");
    }

    #[test]
    fn test_nounset_plain_read_errors() {
        let mut vars = ShellVars::new();
        let mut exp =
            Expansion::new(&mut vars).with_options(ShellOptions { nounset: true, errexit: false });
        let err = exp.expand_word("$missing", false).unwrap_err();
        assert_eq!(err, ExpansionError::UnboundVariable("missing".to_string()));
        // Default operators suppress the error.
        let ok = exp.expand_word("${missing:-d}", false).unwrap();
        assert_eq!(ok[0].text, "d");
    }

    #[test]
    fn test_malformed_forms_stay_literal() {
        let mut vars = ShellVars::new();
        assert_eq!(one_field(&mut vars, "${bad~op}"), "${bad~op}");
        assert_eq!(one_field(&mut vars, "$"), "$");
        assert_eq!(fields(&mut vars, "${x"), vec!["${x"]);
    }

    #[test]
    fn test_ifs_field_splitting_with_custom_ifs() {
        let mut vars = ShellVars::new();
        vars.set("IFS", ":", Scope::Visible).unwrap();
        vars.set("v", ":a::b:", Scope::Visible).unwrap();
        assert_eq!(fields(&mut vars, "$v"), vec!["", "a", "", "b", ""]);
    }

    #[test]
    fn test_empty_ifs_disables_splitting() {
        let mut vars = ShellVars::new();
        vars.set("IFS", "", Scope::Visible).unwrap();
        vars.set("v", "a b c", Scope::Visible).unwrap();
        assert_eq!(fields(&mut vars, "$v"), vec!["a b c"]);
    }

    #[test]
    fn test_interpolation_in_word() {
        let mut vars = ShellVars::new();
        vars.set("n", "3", Scope::Visible).unwrap();
        assert_eq!(one_field(&mut vars, "$\"count={n + 1} done\""), "count=4 done");
        // The interpolated string never splits.
        assert_eq!(fields(&mut vars, "$\"a b c\""), vec!["a b c"]);
    }

    #[test]
    fn test_left_to_right_side_effects() {
        let mut vars = ShellVars::new();
        vars.set("x", "1", Scope::Visible).unwrap();
        assert_eq!(one_field(&mut vars, "$((x++))-$((x++))"), "1-2");
        assert_eq!(vars.get("x"), Some("3".to_string()));
    }

    #[test]
    fn test_expansion_too_long() {
        let mut vars = ShellVars::new();
        vars.set("big", &"x".repeat(64), Scope::Visible).unwrap();
        let mut exp = Expansion::new(&mut vars).with_limits(ExpansionLimits {
            max_word_size: 128,
            ..ExpansionLimits::default()
        });
        let err = exp.expand_word("$big$big$big", false).unwrap_err();
        assert_eq!(err, ExpansionError::ExpansionTooLong(128));
    }

    #[test]
    fn test_recursion_depth_bounded() {
        let mut vars = ShellVars::new();
        // Adversarial nesting: defaults nested past the depth cap.
        let mut word = String::from("x");
        for _ in 0..80 {
            word = format!("${{u:-{}}}", word);
        }
        let mut exp = Expansion::new(&mut vars);
        let result = exp.expand_word(&word, false);
        assert!(matches!(
            result,
            Err(ExpansionError::MalformedExpansion(_))
        ));
    }

    // Scenario: command substitution propagates the exit code.
    #[cfg(unix)]
    #[test]
    fn test_command_substitution_exit_code() {
        let mut vars = ShellVars::new();
        let mut exp = Expansion::with_executor(&mut vars, Box::new(|_: &str| 1));
        let result = exp.expand_word("x=$(false)", false).unwrap();
        assert_eq!(result[0].text, "x=");
        assert_eq!(exp.vars.last_exit_code(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_substitution_output() {
        let mut vars = ShellVars::new();
        let mut exp = Expansion::with_executor(
            &mut vars,
            Box::new(|command: &str| {
                let text = match command {
                    "echo hi" => "hi\n",
                    _ => "?\n",
                };
                unsafe {
                    libc::write(1, text.as_ptr() as *const libc::c_void, text.len());
                }
                0
            }),
        );
        let result = exp.expand_word("got:$(echo hi)", false).unwrap();
        assert_eq!(result[0].text, "got:hi");
        let backtick = exp.expand_word("`echo hi`", false).unwrap();
        assert_eq!(backtick[0].text, "hi");
    }

    // Scenario: process substitution yields readable /dev/fd paths.
    #[cfg(unix)]
    #[test]
    fn test_process_substitution_fields() {
        use std::io::Read;

        let mut vars = ShellVars::new();
        let mut exp = Expansion::with_executor(
            &mut vars,
            Box::new(|command: &str| {
                let text = if command == "echo a" { "a\n" } else { "b\n" };
                unsafe {
                    libc::write(1, text.as_ptr() as *const libc::c_void, text.len());
                }
                0
            }),
        );
        let a = exp.expand_word("<(echo a)", false).unwrap();
        let b = exp.expand_word("<(echo b)", false).unwrap();
        assert!(a[0].text.starts_with("/dev/fd/"));
        assert!(b[0].text.starts_with("/dev/fd/"));

        let mut buf = String::new();
        std::fs::File::open(&a[0].text)
            .unwrap()
            .read_to_string(&mut buf)
            .unwrap();
        assert_eq!(buf, "a\n");
        buf.clear();
        std::fs::File::open(&b[0].text)
            .unwrap()
            .read_to_string(&mut buf)
            .unwrap();
        assert_eq!(buf, "b\n");

        exp.close_retained_fds();
        exp.reap_children();
    }

    #[test]
    fn test_nameref_chain_in_expansion() {
        let mut vars = ShellVars::new();
        vars.set("real", "deep value", Scope::Visible).unwrap();
        vars.set("r1", "real", Scope::Visible).unwrap();
        vars.set("r2", "r1", Scope::Visible).unwrap();
        vars.mark_nameref("r1");
        vars.mark_nameref("r2");
        assert_eq!(fields(&mut vars, "\"$r2\""), vec!["deep value"]);
    }

    #[test]
    fn test_nameref_cycle_does_not_hang() {
        let mut vars = ShellVars::new();
        vars.set("a", "b", Scope::Visible).unwrap();
        vars.set("b", "a", Scope::Visible).unwrap();
        vars.mark_nameref("a");
        vars.mark_nameref("b");
        // Resolution breaks at the cycle; the read comes back (empty or
        // the stored target name), it must simply terminate.
        let mut exp = Expansion::new(&mut vars);
        let result = exp.expand_word("\"$a\"", false);
        assert!(result.is_ok());
    }
}
