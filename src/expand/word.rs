//! Word Expansion Scan
//!
//! Single forward pass over a raw word. The tokenizer upstream has already
//! isolated the word and preserved its quote characters; this scan walks
//! it byte by byte, dispatching at the expansion triggers:
//!
//! - ~ at the word start (or after : / =) -> tilde expansion
//! - $"..." -> string interpolation
//! - $((...)) -> arithmetic (inner substitutions pre-resolved first)
//! - $(...) and `...` -> command substitution
//! - ${...} -> parameter expansion
//! - $VAR and the special parameters -> variable lookup
//! - <(...) / >(...) -> process substitution
//!
//! Everything else is copied through, quotes included: field splitting and
//! quote removal run on the buffer afterwards. Malformed forms (unbalanced
//! closers) stay in the output as literal text.

use crate::errors::ExpansionError;

use super::command_subst::capture_command;
use super::field_split::{EMPTY_ELIDE, FIELD_MARK};
use super::interpolate::expand_interpolation;
use super::parameter::expand_parameter;
use super::process_subst::{process_substitute, SubstDirection};
use super::special::{is_named_special, lookup_special};
use super::tilde::expand_tilde;
use super::Expansion;

/// The scanned buffer plus the byte ranges that came from unquoted
/// expansions (the field splitter turns overlap with these into the
/// "came from an unquoted expansion" flag that downstream globbing wants).
pub(crate) struct ScanOutput {
    pub buffer: String,
    pub unquoted_spans: Vec<(usize, usize)>,
}

struct Scan {
    out: Vec<u8>,
    spans: Vec<(usize, usize)>,
    max_size: usize,
}

impl Scan {
    fn push(&mut self, b: u8) {
        self.out.push(b);
    }

    fn push_str(&mut self, text: &str) -> Result<(), ExpansionError> {
        self.out.extend_from_slice(text.as_bytes());
        if self.out.len() > self.max_size {
            return Err(ExpansionError::ExpansionTooLong(self.max_size));
        }
        Ok(())
    }

    /// Splice an expansion result, recording its span when unquoted.
    fn splice(&mut self, text: &str, unquoted: bool) -> Result<(), ExpansionError> {
        let start = self.out.len();
        self.push_str(text)?;
        if unquoted && self.out.len() > start {
            self.spans.push((start, self.out.len()));
        }
        Ok(())
    }
}

/// Expand one word into a buffer ready for field splitting.
pub(crate) fn scan_word(
    exp: &mut Expansion,
    word: &str,
    skip_tilde: bool,
) -> Result<ScanOutput, ExpansionError> {
    let bytes = word.as_bytes();
    let mut scan = Scan {
        out: Vec::with_capacity(word.len()),
        spans: Vec::new(),
        max_size: exp.limits.max_word_size,
    };
    let mut in_single = false;
    let mut in_double = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        if in_single {
            scan.push(b);
            if b == b'\'' {
                in_single = false;
            }
            i += 1;
            continue;
        }

        match b {
            b'\\' => {
                if i + 1 >= bytes.len() {
                    scan.push(b);
                    i += 1;
                } else if !in_double && bytes[i + 1] == b'$' {
                    // Unquoted \$: the backslash is consumed, $ is literal.
                    scan.push(b'$');
                    i += 2;
                } else {
                    // Keep the pair; quote removal decides what survives.
                    scan.push(b);
                    scan.push(bytes[i + 1]);
                    i += 2;
                }
            }

            b'\'' if !in_double => {
                in_single = true;
                scan.push(b);
                i += 1;
            }

            b'"' => {
                in_double = !in_double;
                scan.push(b);
                i += 1;
            }

            b'~' if !skip_tilde && !in_double && tilde_position(bytes, i) => {
                match expand_tilde(exp.vars, &word[i..]) {
                    Some((home, consumed)) => {
                        scan.push_str(&home)?;
                        i += consumed;
                    }
                    None => {
                        scan.push(b);
                        i += 1;
                    }
                }
            }

            b'$' => {
                i = expand_dollar(exp, word, i, in_double, &mut scan)?;
            }

            b'`' => match find_closing_backtick(bytes, i + 1) {
                Some(end) => {
                    let body = unescape_backticks(&word[i + 1..end]);
                    let output = capture_command(exp, &body)?;
                    scan.splice(&output, !in_double)?;
                    i = end + 1;
                }
                None => {
                    scan.push(b);
                    i += 1;
                }
            },

            b'<' | b'>' if !in_double && bytes.get(i + 1) == Some(&b'(') => {
                match find_matching_paren(bytes, i + 1) {
                    Some(end) => {
                        let direction = if b == b'<' {
                            SubstDirection::Read
                        } else {
                            SubstDirection::Write
                        };
                        let body = &word[i + 2..end];
                        match process_substitute(exp, body, direction)? {
                            Some(path) => scan.push_str(&path)?,
                            // Unsupported here: the expression stays literal.
                            None => scan.push_str(&word[i..=end])?,
                        }
                        i = end + 1;
                    }
                    None => {
                        scan.push(b);
                        i += 1;
                    }
                }
            }

            _ => {
                scan.push(b);
                i += 1;
            }
        }
        if scan.out.len() > scan.max_size {
            return Err(ExpansionError::ExpansionTooLong(scan.max_size));
        }
    }

    Ok(ScanOutput {
        buffer: String::from_utf8_lossy(&scan.out).into_owned(),
        unquoted_spans: scan.spans,
    })
}

/// Handle one '$' trigger at `i`; returns the index to continue from.
fn expand_dollar(
    exp: &mut Expansion,
    word: &str,
    i: usize,
    in_double: bool,
    scan: &mut Scan,
) -> Result<usize, ExpansionError> {
    let bytes = word.as_bytes();
    let next = match bytes.get(i + 1) {
        Some(&b) => b,
        None => {
            scan.push(b'$');
            return Ok(i + 1);
        }
    };

    match next {
        // $"...": string interpolation. The result is spliced back inside
        // double quotes so field splitting leaves it alone.
        b'"' if !in_double => match find_closing_dquote(bytes, i + 2) {
            Some(end) => {
                let body = &word[i + 2..end];
                let text = expand_interpolation(exp, body)?;
                scan.push(b'"');
                scan.push_str(&text.replace('\\', "\\\\").replace('"', "\\\""))?;
                scan.push(b'"');
                Ok(end + 1)
            }
            None => {
                scan.push(b'$');
                Ok(i + 1)
            }
        },

        b'(' => {
            let Some(end_outer) = find_matching_paren(bytes, i + 1) else {
                scan.push(b'$');
                return Ok(i + 1);
            };
            // $(( only counts as arithmetic when the inner parens close
            // right before the outer ones; $((echo a) | cat) is a command.
            if bytes.get(i + 2) == Some(&b'(') {
                if let Some(end_inner) = find_matching_paren(bytes, i + 2) {
                    if end_inner + 1 == end_outer {
                        let body = &word[i + 3..end_inner];
                        let resolved = pre_resolve(exp, body)?;
                        match exp.eval_arith(&resolved) {
                            Ok(value) => scan.splice(&value.to_string(), !in_double)?,
                            Err(err) => {
                                // Inside word expansion an arithmetic
                                // failure degrades to 0 with a warning.
                                exp.warnings.push(format!("arithmetic: {}", err));
                                scan.splice("0", !in_double)?;
                            }
                        }
                        return Ok(end_outer + 1);
                    }
                }
            }
            let body = &word[i + 2..end_outer];
            let output = capture_command(exp, body)?;
            scan.splice(&output, !in_double)?;
            Ok(end_outer + 1)
        }

        b'{' => {
            let Some(end) = find_matching_brace(bytes, i + 1) else {
                scan.push(b'$');
                return Ok(i + 1);
            };
            let body = &word[i + 2..end];
            match expand_parameter(exp, body, in_double) {
                Ok(text) => scan.splice(&text, !in_double)?,
                Err(ExpansionError::MalformedExpansion(_)) if !exp.depth_exceeded => {
                    // Shell leniency: malformed forms stay literal.
                    scan.push_str(&word[i..=end])?;
                }
                Err(other) => return Err(other),
            }
            Ok(end + 1)
        }

        b'@' => {
            let params = exp.vars.positional_params().to_vec();
            let mark = (FIELD_MARK as char).to_string();
            if params.is_empty() {
                if in_double {
                    scan.push(EMPTY_ELIDE);
                }
            } else {
                scan.splice(&params.join(&mark), !in_double)?;
            }
            Ok(i + 2)
        }

        b'*' => {
            let params = exp.vars.positional_params().to_vec();
            let sep = exp.vars.ifs_separator();
            scan.splice(&params.join(&sep), !in_double)?;
            Ok(i + 2)
        }

        b'0'..=b'9' => {
            // Without braces only a single digit binds to the $.
            let number = (next - b'0') as usize;
            match exp.vars.positional(number) {
                Some(value) => scan.splice(&value, !in_double)?,
                None => {
                    if exp.options.nounset {
                        return Err(ExpansionError::UnboundVariable(
                            (next as char).to_string(),
                        ));
                    }
                }
            }
            Ok(i + 2)
        }

        b'?' | b'$' | b'!' | b'#' | b'-' => {
            let options = exp.options;
            let name = (next as char).to_string();
            if let Some(value) = lookup_special(exp.vars, &options, &name) {
                scan.splice(&value, !in_double)?;
            }
            Ok(i + 2)
        }

        b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
            let mut end = i + 1;
            while end < bytes.len()
                && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
            {
                end += 1;
            }
            let name = &word[i + 1..end];
            let value = if name == "_" {
                Some(exp.vars.last_arg.clone())
            } else if is_named_special(name) {
                let options = exp.options;
                lookup_special(exp.vars, &options, name)
            } else {
                exp.vars.get(name)
            };
            match value {
                Some(value) => scan.splice(&value, !in_double)?,
                None => {
                    if exp.options.nounset {
                        return Err(ExpansionError::UnboundVariable(name.to_string()));
                    }
                }
            }
            Ok(end)
        }

        _ => {
            scan.push(b'$');
            Ok(i + 1)
        }
    }
}

/// Resolve ${...}, $(...), nested $((...)), and `...` inside a text that
/// the arithmetic evaluator (or an interpolation block) will consume, so
/// the evaluator sees pure expression syntax.
pub(crate) fn pre_resolve(exp: &mut Expansion, text: &str) -> Result<String, ExpansionError> {
    let bytes = text.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(text.len());
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'$' && bytes.get(i + 1) == Some(&b'{') {
            if let Some(end) = find_matching_brace(bytes, i + 1) {
                let body = &text[i + 2..end];
                match expand_parameter(exp, body, false) {
                    Ok(value) => out.extend_from_slice(value.as_bytes()),
                    Err(ExpansionError::MalformedExpansion(_)) if !exp.depth_exceeded => {
                        out.extend_from_slice(text[i..=end].as_bytes());
                    }
                    Err(other) => return Err(other),
                }
                i = end + 1;
                continue;
            }
        }
        if b == b'$' && bytes.get(i + 1) == Some(&b'(') {
            if let Some(end_outer) = find_matching_paren(bytes, i + 1) {
                // Nested arithmetic resolves to its value.
                if bytes.get(i + 2) == Some(&b'(') {
                    if let Some(end_inner) = find_matching_paren(bytes, i + 2) {
                        if end_inner + 1 == end_outer {
                            let body = &text[i + 3..end_inner];
                            let resolved = pre_resolve(exp, body)?;
                            match exp.eval_arith(&resolved) {
                                Ok(value) => {
                                    out.extend_from_slice(value.to_string().as_bytes())
                                }
                                Err(err) => {
                                    exp.warnings.push(format!("arithmetic: {}", err));
                                    out.push(b'0');
                                }
                            }
                            i = end_outer + 1;
                            continue;
                        }
                    }
                }
                let body = &text[i + 2..end_outer];
                let output = capture_command(exp, body)?;
                out.extend_from_slice(output.as_bytes());
                i = end_outer + 1;
                continue;
            }
        }
        if b == b'`' {
            if let Some(end) = find_closing_backtick(bytes, i + 1) {
                let body = unescape_backticks(&text[i + 1..end]);
                let output = capture_command(exp, &body)?;
                out.extend_from_slice(output.as_bytes());
                i = end + 1;
                continue;
            }
        }
        out.push(b);
        i += 1;
    }

    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// A '~' expands only at the word start or right after ':' or '=' (but a
/// word-leading "=~" is the regex operator, not an assignment position).
fn tilde_position(bytes: &[u8], i: usize) -> bool {
    if i == 0 {
        return true;
    }
    match bytes[i - 1] {
        b':' => true,
        b'=' => i != 1,
        _ => false,
    }
}

/// Matching ')' for the '(' at `open`, skipping quoted spans.
fn find_matching_paren(bytes: &[u8], open: usize) -> Option<usize> {
    find_matching(bytes, open, b'(', b')')
}

/// Matching '}' for the '{' at `open`, skipping quoted spans.
fn find_matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    find_matching(bytes, open, b'{', b'}')
}

fn find_matching(bytes: &[u8], open: usize, inc: u8, dec: u8) -> Option<usize> {
    let mut depth = 0;
    let mut in_single = false;
    let mut in_double = false;
    let mut i = open;
    while i < bytes.len() {
        let b = bytes[i];
        if in_single {
            if b == b'\'' {
                in_single = false;
            }
            i += 1;
            continue;
        }
        match b {
            b'\\' if i + 1 < bytes.len() => i += 2,
            b'\'' if !in_double => {
                in_single = true;
                i += 1;
            }
            b'"' => {
                in_double = !in_double;
                i += 1;
            }
            _ => {
                if b == inc {
                    depth += 1;
                } else if b == dec {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                i += 1;
            }
        }
    }
    None
}

/// Closing backtick; \` within the body does not close it.
fn find_closing_backtick(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() => i += 2,
            b'`' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Closing double quote for $"...", honoring backslash escapes.
fn find_closing_dquote(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Inside `...` a backslash escapes backtick, dollar, and backslash.
fn unescape_backticks(body: &str) -> String {
    let bytes = body.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            match bytes[i + 1] {
                b'`' | b'$' | b'\\' => {
                    out.push(bytes[i + 1]);
                    i += 2;
                    continue;
                }
                _ => {}
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_matching_paren() {
        let text = b"$(echo (nested) done) tail";
        assert_eq!(find_matching_paren(text, 1), Some(20));
    }

    #[test]
    fn test_find_matching_paren_skips_quotes() {
        let text = b"$(echo ')' x)";
        assert_eq!(find_matching_paren(text, 1), Some(12));
    }

    #[test]
    fn test_find_matching_brace() {
        let text = b"${x:-${y}}";
        assert_eq!(find_matching_brace(text, 1), Some(9));
    }

    #[test]
    fn test_find_closing_backtick_escape() {
        let text = b"a\\`b` rest";
        assert_eq!(find_closing_backtick(text, 0), Some(4));
    }

    #[test]
    fn test_unescape_backticks() {
        assert_eq!(unescape_backticks("echo \\`x\\`"), "echo `x`");
        assert_eq!(unescape_backticks("a\\$b"), "a$b");
        assert_eq!(unescape_backticks("a\\nb"), "a\\nb");
    }

    #[test]
    fn test_tilde_position() {
        assert!(tilde_position(b"~", 0));
        assert!(tilde_position(b"a:~", 2));
        assert!(tilde_position(b"a=~", 2));
        assert!(!tilde_position(b"=~", 1));
        assert!(!tilde_position(b"a~", 1));
    }
}
