//! String Interpolation
//!
//! $"...{expr}..." strings: literal text with embedded expression blocks.
//! A {expr} block evaluates as an arithmetic expression (after resolving
//! any substitutions inside it); $var, ${...} and $(...) in the literal
//! parts expand inline. Backslash escapes ", {, } and itself.
//!
//! The scanner splices the result back inside double quotes, so an
//! interpolated string is always a single field.

use crate::errors::ExpansionError;

use super::word::{pre_resolve, scan_word};
use super::Expansion;

/// Expand the body of a $"..." form (closing quote already located).
pub(crate) fn expand_interpolation(
    exp: &mut Expansion,
    body: &str,
) -> Result<String, ExpansionError> {
    let bytes = body.as_bytes();
    let mut out = String::new();
    let mut literal: Vec<u8> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() => {
                match bytes[i + 1] {
                    b'"' | b'{' | b'}' | b'\\' => literal.push(bytes[i + 1]),
                    other => {
                        literal.push(b'\\');
                        literal.push(other);
                    }
                }
                i += 2;
            }
            b'{' => {
                flush_literal(exp, &mut literal, &mut out)?;
                let Some(end) = find_closing_block(bytes, i) else {
                    // Unbalanced block: keep the brace literally.
                    literal.push(b'{');
                    i += 1;
                    continue;
                };
                let block = &body[i + 1..end];
                let resolved = pre_resolve(exp, block)?;
                match exp.eval_arith(&resolved) {
                    Ok(value) => out.push_str(&value.to_string()),
                    Err(err) => {
                        exp.warnings.push(format!("interpolation: {}", err));
                        out.push('0');
                    }
                }
                i = end + 1;
            }
            other => {
                literal.push(other);
                i += 1;
            }
        }
    }
    flush_literal(exp, &mut literal, &mut out)?;

    Ok(out)
}

/// Run the pending literal text through the word scanner so $-forms in it
/// expand, then append it.
fn flush_literal(
    exp: &mut Expansion,
    literal: &mut Vec<u8>,
    out: &mut String,
) -> Result<(), ExpansionError> {
    if literal.is_empty() {
        return Ok(());
    }
    let text = String::from_utf8_lossy(literal).into_owned();
    literal.clear();
    let scanned = scan_word(exp, &text, true)?;
    out.push_str(&scanned.buffer);
    Ok(())
}

/// Matching '}' for the '{' at `open`, tracking nesting.
fn find_closing_block(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() => i += 2,
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{Scope, ShellVars};

    fn interpolate(vars: &mut ShellVars, body: &str) -> String {
        let mut exp = Expansion::new(vars);
        expand_interpolation(&mut exp, body).unwrap()
    }

    #[test]
    fn test_plain_text() {
        let mut vars = ShellVars::new();
        assert_eq!(interpolate(&mut vars, "hello world"), "hello world");
    }

    #[test]
    fn test_arithmetic_block() {
        let mut vars = ShellVars::new();
        assert_eq!(interpolate(&mut vars, "sum={1 + 2}"), "sum=3");
    }

    #[test]
    fn test_block_reads_variables() {
        let mut vars = ShellVars::new();
        vars.set("n", "20", Scope::Visible).unwrap();
        assert_eq!(interpolate(&mut vars, "{n * 2} items"), "40 items");
    }

    #[test]
    fn test_dollar_expansion_in_literal() {
        let mut vars = ShellVars::new();
        vars.set("name", "den", Scope::Visible).unwrap();
        assert_eq!(interpolate(&mut vars, "hi $name!"), "hi den!");
    }

    #[test]
    fn test_escaped_braces() {
        let mut vars = ShellVars::new();
        assert_eq!(interpolate(&mut vars, "\\{literal\\}"), "{literal}");
    }

    #[test]
    fn test_bad_block_degrades_to_zero() {
        let mut vars = ShellVars::new();
        let mut exp = Expansion::new(&mut vars);
        let result = expand_interpolation(&mut exp, "x={1 +}").unwrap();
        assert_eq!(result, "x=0");
        assert_eq!(exp.warnings.len(), 1);
    }

    #[test]
    fn test_unbalanced_block_stays_literal() {
        let mut vars = ShellVars::new();
        assert_eq!(interpolate(&mut vars, "a{b"), "a{b");
    }
}
