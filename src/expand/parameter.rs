//! Parameter Expansion
//!
//! Dispatch engine for the ${...} family. The body arrives with the braces
//! already consumed; this module decides which of the many overlapping
//! operator forms applies and runs it:
//!
//! - #name / !name@ / !arr[@] / !name (length, enumeration, indirection)
//! - name[subscript] with @/* and slicing
//! - :- - := = :? ? :+ + (defaults, with and without the empty check)
//! - :off / :off:len (substring and list slicing)
//! - ## # %% % (glob strips), / // /# /% (glob replaces)
//! - ^^ ^ ,, , ~~ ~ and @U @L @u @l @Q (case and quoting transforms)
//!
//! Operator characters overlap (# % / : - all pull double duty), so
//! dispatch is a fixed sequence of guarded checks: leading sigils first,
//! then name parse, then the first operator character decides.

use crate::errors::ExpansionError;
use crate::shell::nameref::is_valid_name;
use crate::shell::Scope;

use super::field_split::{EMPTY_ELIDE, FIELD_MARK};
use super::param_ops::{
    case_convert, quote_value, replace, slice_list, strip_prefix, strip_suffix, substring,
    CaseOp, ReplaceMode,
};
use super::special::{is_named_special, lookup_special};
use super::Expansion;

/// Expand the body of a ${...} form.
pub(crate) fn expand_parameter(
    exp: &mut Expansion,
    body: &str,
    in_quotes: bool,
) -> Result<String, ExpansionError> {
    if body.is_empty() {
        return Err(malformed(body));
    }

    // ${#...}: length forms (a lone "#" is the parameter $#).
    if let Some(rest) = body.strip_prefix('#') {
        if !rest.is_empty() {
            return expand_length(exp, rest);
        }
    }

    // ${!...}: indirection, prefix enumeration, array keys.
    if let Some(rest) = body.strip_prefix('!') {
        if !rest.is_empty() {
            return expand_bang(exp, rest, in_quotes);
        }
    }

    let (name, after_name) = parse_name(body).ok_or_else(|| malformed(body))?;
    let name = name.to_string();

    let (selector, after_sel) = if body[after_name..].starts_with('[') {
        let inner_end = find_subscript_end(body.as_bytes(), after_name)
            .ok_or_else(|| malformed(body))?;
        let sub = &body[after_name + 1..inner_end];
        let selector = match sub {
            "@" => Selector::At,
            "*" => Selector::Star,
            _ => Selector::Sub(sub.to_string()),
        };
        (selector, inner_end + 1)
    } else {
        (Selector::None, after_name)
    };

    let rest = &body[after_sel..];

    // Plain value.
    if rest.is_empty() {
        let selected = read_selected(exp, &name, &selector)?;
        return emit_selected(exp, &name, selected, &selector, in_quotes, true);
    }

    // ':' family: default operators with the empty check, or substring.
    if let Some(after) = rest.strip_prefix(':') {
        match after.as_bytes().first() {
            Some(b'-') => return op_default(exp, &name, &selector, &after[1..], true, in_quotes),
            Some(b'=') => return op_assign(exp, &name, &selector, &after[1..], true, in_quotes),
            Some(b'?') => return op_error(exp, &name, &selector, &after[1..], true, in_quotes),
            Some(b'+') => return op_alternative(exp, &name, &selector, &after[1..], true, in_quotes),
            _ => return op_substring(exp, &name, &selector, after, in_quotes),
        }
    }

    // Default operators without the empty check.
    match rest.as_bytes()[0] {
        b'-' => return op_default(exp, &name, &selector, &rest[1..], false, in_quotes),
        b'=' => return op_assign(exp, &name, &selector, &rest[1..], false, in_quotes),
        b'?' => return op_error(exp, &name, &selector, &rest[1..], false, in_quotes),
        b'+' => return op_alternative(exp, &name, &selector, &rest[1..], false, in_quotes),
        _ => {}
    }

    // Glob strips.
    if let Some(pattern) = rest.strip_prefix("##") {
        return op_pattern(exp, &name, &selector, pattern, in_quotes, |v, p| {
            strip_prefix(v, p, true)
        });
    }
    if let Some(pattern) = rest.strip_prefix('#') {
        return op_pattern(exp, &name, &selector, pattern, in_quotes, |v, p| {
            strip_prefix(v, p, false)
        });
    }
    if let Some(pattern) = rest.strip_prefix("%%") {
        return op_pattern(exp, &name, &selector, pattern, in_quotes, |v, p| {
            strip_suffix(v, p, true)
        });
    }
    if let Some(pattern) = rest.strip_prefix('%') {
        return op_pattern(exp, &name, &selector, pattern, in_quotes, |v, p| {
            strip_suffix(v, p, false)
        });
    }

    // Replacements.
    if rest.starts_with('/') {
        return op_replace(exp, &name, &selector, rest, in_quotes);
    }

    // Case conversion operators.
    let case_op = match rest {
        "^^" => Some(CaseOp::UpperAll),
        "^" => Some(CaseOp::UpperFirst),
        ",," => Some(CaseOp::LowerAll),
        "," => Some(CaseOp::LowerFirst),
        "~~" => Some(CaseOp::ToggleAll),
        "~" => Some(CaseOp::ToggleFirst),
        "@U" => Some(CaseOp::UpperAll),
        "@L" => Some(CaseOp::LowerAll),
        "@u" => Some(CaseOp::UpperFirst),
        "@l" => Some(CaseOp::LowerFirst),
        _ => None,
    };
    if let Some(op) = case_op {
        return op_transform(exp, &name, &selector, in_quotes, |v| case_convert(v, op));
    }
    if rest == "@Q" {
        return op_transform(exp, &name, &selector, in_quotes, quote_value);
    }

    Err(malformed(body))
}

fn malformed(body: &str) -> ExpansionError {
    ExpansionError::MalformedExpansion(format!("${{{}}}", body))
}

// ============================================================================
// Name parsing and selection
// ============================================================================

/// The array-subscript part of a parameter reference.
#[derive(Debug, Clone, PartialEq)]
enum Selector {
    None,
    At,
    Star,
    Sub(String),
}

/// What a (name, selector) pair selected from the store.
enum Selected {
    /// Scalar-like: Some(value) or unset.
    Single(Option<String>),
    /// @/* selections: the element list.
    List(Vec<String>),
}

/// Parse the parameter name at the start of the body: identifier,
/// positional digits, or a single special character.
fn parse_name(body: &str) -> Option<(&str, usize)> {
    let bytes = body.as_bytes();
    match bytes[0] {
        b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
            let mut end = 1;
            while end < bytes.len()
                && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
            {
                end += 1;
            }
            Some((&body[..end], end))
        }
        b'0'..=b'9' => {
            let mut end = 1;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            Some((&body[..end], end))
        }
        b'?' | b'$' | b'!' | b'#' | b'-' | b'*' | b'@' => Some((&body[..1], 1)),
        _ => None,
    }
}

/// Find the ']' closing the subscript that starts at `open` (which must be
/// '['), tracking nested brackets.
fn find_subscript_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Is this parameter name the positional list itself?
fn is_positional_list(name: &str) -> bool {
    name == "@" || name == "*"
}

fn read_selected(
    exp: &mut Expansion,
    name: &str,
    selector: &Selector,
) -> Result<Selected, ExpansionError> {
    if is_positional_list(name) {
        return Ok(Selected::List(exp.vars.positional_params().to_vec()));
    }

    match selector {
        Selector::None => Ok(Selected::Single(read_scalar(exp, name))),
        Selector::At | Selector::Star => {
            if exp.vars.is_assoc(name) {
                Ok(Selected::List(exp.vars.assoc_values(name)))
            } else if exp.vars.is_array(name) {
                Ok(Selected::List(exp.vars.array_elements(name)))
            } else if let Some(value) = read_scalar(exp, name) {
                // A scalar behaves as a one-element array.
                Ok(Selected::List(vec![value]))
            } else {
                Ok(Selected::List(Vec::new()))
            }
        }
        Selector::Sub(text) => {
            if exp.vars.is_assoc(name) {
                let key = exp.sub_expand_quoted(text)?;
                Ok(Selected::Single(exp.vars.get_assoc(name, &key)))
            } else {
                let index = exp.arith_eval(text)?;
                if exp.vars.is_array(name) {
                    Ok(Selected::Single(exp.vars.get_array(name, index)))
                } else if index == 0 {
                    // s[0] decays to the scalar value.
                    Ok(Selected::Single(read_scalar(exp, name)))
                } else {
                    Ok(Selected::Single(None))
                }
            }
        }
    }
}

/// Read a scalar or special parameter (no selector).
fn read_scalar(exp: &mut Expansion, name: &str) -> Option<String> {
    if name.as_bytes()[0].is_ascii_digit() {
        let number: usize = name.parse().ok()?;
        return exp.vars.positional(number);
    }
    if name.len() == 1 && !name.as_bytes()[0].is_ascii_alphabetic() && name != "_" {
        let options = exp.options;
        return lookup_special(exp.vars, &options, name);
    }
    if name == "_" {
        return Some(exp.vars.last_arg.clone());
    }
    if is_named_special(name) {
        let options = exp.options;
        return lookup_special(exp.vars, &options, name);
    }
    exp.vars.get(name)
}

/// Join a list the way $@ / $* do: @ keeps elements apart with hard field
/// marks, * joins with the first IFS character.
fn join_list(exp: &Expansion, list: &[String], star: bool, in_quotes: bool) -> String {
    if star {
        list.join(&exp.vars.ifs_separator())
    } else if list.is_empty() {
        if in_quotes {
            (EMPTY_ELIDE as char).to_string()
        } else {
            String::new()
        }
    } else {
        list.join(&(FIELD_MARK as char).to_string())
    }
}

fn selector_is_star(name: &str, selector: &Selector) -> bool {
    name == "*" || matches!(selector, Selector::Star)
}

/// Emit a selection as text, with the unset checks for plain reads.
fn emit_selected(
    exp: &mut Expansion,
    name: &str,
    selected: Selected,
    selector: &Selector,
    in_quotes: bool,
    check_unset: bool,
) -> Result<String, ExpansionError> {
    match selected {
        Selected::Single(Some(value)) => Ok(value),
        Selected::Single(None) => {
            if check_unset && exp.options.nounset {
                return Err(ExpansionError::UnboundVariable(display_name(name, selector)));
            }
            Ok(String::new())
        }
        Selected::List(items) => Ok(join_list(
            exp,
            &items,
            selector_is_star(name, selector),
            in_quotes,
        )),
    }
}

fn display_name(name: &str, selector: &Selector) -> String {
    match selector {
        Selector::None => name.to_string(),
        Selector::At => format!("{}[@]", name),
        Selector::Star => format!("{}[*]", name),
        Selector::Sub(s) => format!("{}[{}]", name, s),
    }
}

/// Unset/empty state used by the default-family operators.
fn selection_state(selected: &Selected) -> (bool, bool) {
    match selected {
        Selected::Single(None) => (false, true),
        Selected::Single(Some(v)) => (true, v.is_empty()),
        Selected::List(items) => (!items.is_empty(), items.iter().all(|i| i.is_empty())),
    }
}

// ============================================================================
// Operators
// ============================================================================

/// ${name:-word} / ${name-word}
fn op_default(
    exp: &mut Expansion,
    name: &str,
    selector: &Selector,
    word: &str,
    check_empty: bool,
    in_quotes: bool,
) -> Result<String, ExpansionError> {
    let selected = read_selected(exp, name, selector)?;
    let (is_set, is_empty) = selection_state(&selected);
    if !is_set || (check_empty && is_empty) {
        exp.sub_expand(word)
    } else {
        emit_selected(exp, name, selected, selector, in_quotes, false)
    }
}

/// ${name:=word} / ${name=word}: assign the default, then return it.
fn op_assign(
    exp: &mut Expansion,
    name: &str,
    selector: &Selector,
    word: &str,
    check_empty: bool,
    in_quotes: bool,
) -> Result<String, ExpansionError> {
    let selected = read_selected(exp, name, selector)?;
    let (is_set, is_empty) = selection_state(&selected);
    if is_set && !(check_empty && is_empty) {
        return emit_selected(exp, name, selected, selector, in_quotes, false);
    }

    let value = exp.sub_expand_quoted(word)?;
    let result = match selector {
        Selector::None if is_valid_name(name) => {
            exp.vars.set(name, &value, Scope::Visible)
        }
        Selector::Sub(text) if is_valid_name(name) => {
            if exp.vars.is_assoc(name) {
                let key = exp.sub_expand_quoted(text)?;
                exp.vars.set_assoc(name, &key, &value)
            } else {
                let index = exp.arith_eval(text)?;
                exp.vars.set_array(name, index, &value)
            }
        }
        // Positionals and specials cannot be assignment targets.
        _ => return Err(malformed(&format!("{}=", display_name(name, selector)))),
    };
    if let Err(err) = result {
        exp.warnings.push(err.to_string());
    }
    Ok(value)
}

/// ${name:?word} / ${name?word}
fn op_error(
    exp: &mut Expansion,
    name: &str,
    selector: &Selector,
    word: &str,
    check_empty: bool,
    in_quotes: bool,
) -> Result<String, ExpansionError> {
    let selected = read_selected(exp, name, selector)?;
    let (is_set, is_empty) = selection_state(&selected);
    if !is_set || (check_empty && is_empty) {
        let message = if word.is_empty() {
            "parameter null or not set".to_string()
        } else {
            exp.sub_expand_quoted(word)?
        };
        return Err(ExpansionError::ParameterNullOrNotSet {
            name: display_name(name, selector),
            message,
        });
    }
    emit_selected(exp, name, selected, selector, in_quotes, false)
}

/// ${name:+word} / ${name+word}
fn op_alternative(
    exp: &mut Expansion,
    name: &str,
    selector: &Selector,
    word: &str,
    check_empty: bool,
    _in_quotes: bool,
) -> Result<String, ExpansionError> {
    let selected = read_selected(exp, name, selector)?;
    let (is_set, is_empty) = selection_state(&selected);
    if is_set && !(check_empty && is_empty) {
        exp.sub_expand(word)
    } else {
        Ok(String::new())
    }
}

/// ${name:off} / ${name:off:len}: substring for scalars, slicing for lists.
fn op_substring(
    exp: &mut Expansion,
    name: &str,
    selector: &Selector,
    spec: &str,
    in_quotes: bool,
) -> Result<String, ExpansionError> {
    let (offset_text, length_text) = split_offset_spec(spec);
    let offset = exp.arith_eval(offset_text)?;
    let length = match length_text {
        Some(text) => Some(exp.arith_eval(text)?),
        None => None,
    };

    match read_selected(exp, name, selector)? {
        Selected::Single(value) => {
            if value.is_none() && exp.options.nounset {
                return Err(ExpansionError::UnboundVariable(display_name(name, selector)));
            }
            Ok(substring(&value.unwrap_or_default(), offset, length))
        }
        Selected::List(items) => {
            // ${@:0:1} reaches $0, so positional slicing counts from it.
            let sliced = if is_positional_list(name) {
                let mut with_zero = vec![exp.vars.shell_name.clone()];
                with_zero.extend(items);
                slice_list(&with_zero, offset, length)
            } else {
                slice_list(&items, offset, length)
            };
            Ok(join_list(
                exp,
                &sliced,
                selector_is_star(name, selector),
                in_quotes,
            ))
        }
    }
}

/// Split "off" / "off:len" at the first top-level ':'.
fn split_offset_spec(spec: &str) -> (&str, Option<&str>) {
    let bytes = spec.as_bytes();
    let mut depth = 0;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => depth -= 1,
            b':' if depth == 0 => return (&spec[..i], Some(&spec[i + 1..])),
            _ => {}
        }
    }
    (spec, None)
}

/// Shared path for the strip operators: expand the pattern word, apply the
/// transform to the value (or to each element of a list selection).
fn op_pattern(
    exp: &mut Expansion,
    name: &str,
    selector: &Selector,
    pattern_word: &str,
    in_quotes: bool,
    apply: impl Fn(&str, &str) -> String,
) -> Result<String, ExpansionError> {
    let pattern = exp.sub_expand_quoted(pattern_word)?;
    op_transform(exp, name, selector, in_quotes, |value| apply(value, &pattern))
}

/// Apply a pure value transform to the selection.
fn op_transform(
    exp: &mut Expansion,
    name: &str,
    selector: &Selector,
    in_quotes: bool,
    apply: impl Fn(&str) -> String,
) -> Result<String, ExpansionError> {
    match read_selected(exp, name, selector)? {
        Selected::Single(value) => {
            if value.is_none() && exp.options.nounset {
                return Err(ExpansionError::UnboundVariable(display_name(name, selector)));
            }
            Ok(apply(&value.unwrap_or_default()))
        }
        Selected::List(items) => {
            let transformed: Vec<String> = items.iter().map(|i| apply(i)).collect();
            Ok(join_list(
                exp,
                &transformed,
                selector_is_star(name, selector),
                in_quotes,
            ))
        }
    }
}

/// ${name/pat/rep} and its //, /#, /% variants.
fn op_replace(
    exp: &mut Expansion,
    name: &str,
    selector: &Selector,
    rest: &str,
    in_quotes: bool,
) -> Result<String, ExpansionError> {
    let after_slash = &rest[1..];
    let (mode, spec) = match after_slash.as_bytes().first() {
        Some(b'/') => (ReplaceMode::All, &after_slash[1..]),
        Some(b'#') => (ReplaceMode::Prefix, &after_slash[1..]),
        Some(b'%') => (ReplaceMode::Suffix, &after_slash[1..]),
        _ => (ReplaceMode::First, after_slash),
    };

    let (pattern_text, replacement_text) = split_replace_spec(spec);
    let pattern = exp.sub_expand_quoted(&pattern_text)?;
    let replacement = exp.sub_expand_quoted(&replacement_text)?;
    op_transform(exp, name, selector, in_quotes, |value| {
        replace(value, &pattern, &replacement, mode)
    })
}

/// Split "pat/rep" at the first unquoted, unescaped '/'. An escaped \/
/// inside the pattern becomes a literal slash.
fn split_replace_spec(spec: &str) -> (String, String) {
    let bytes = spec.as_bytes();
    let mut pattern = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'\\' if !in_single && i + 1 < bytes.len() => {
                if bytes[i + 1] == b'/' {
                    pattern.push('/');
                } else {
                    pattern.push('\\');
                    pattern.push(bytes[i + 1] as char);
                }
                i += 2;
            }
            b'\'' if !in_double => {
                in_single = !in_single;
                pattern.push('\'');
                i += 1;
            }
            b'"' if !in_single => {
                in_double = !in_double;
                pattern.push('"');
                i += 1;
            }
            b'/' if !in_single && !in_double => {
                return (pattern, spec[i + 1..].to_string());
            }
            _ => {
                pattern.push(b as char);
                i += 1;
            }
        }
    }
    (pattern, String::new())
}

// ============================================================================
// ${#...}: length forms
// ============================================================================

fn expand_length(exp: &mut Expansion, rest: &str) -> Result<String, ExpansionError> {
    // ${#@} / ${#*}: positional count.
    if rest == "@" || rest == "*" {
        return Ok(exp.vars.positional_params().len().to_string());
    }

    // ${#arr[@]} / ${#arr[*]}: element count.
    if let Some(base) = rest
        .strip_suffix("[@]")
        .or_else(|| rest.strip_suffix("[*]"))
    {
        if !is_valid_name(base) {
            return Err(malformed(&format!("#{}", rest)));
        }
        let count = if exp.vars.is_assoc(base) {
            exp.vars.enumerate_keys(base).len()
        } else if exp.vars.is_array(base) {
            exp.vars.array_elements(base).len()
        } else if exp.vars.is_set(base) {
            1
        } else {
            0
        };
        return Ok(count.to_string());
    }

    // ${#name} / ${#name[sub]} / ${#1}: value length in bytes.
    let (name, after_name) = parse_name(rest).ok_or_else(|| malformed(&format!("#{}", rest)))?;
    let name = name.to_string();
    let (selector, after_sel) = if rest[after_name..].starts_with('[') {
        let end = find_subscript_end(rest.as_bytes(), after_name)
            .ok_or_else(|| malformed(&format!("#{}", rest)))?;
        (
            Selector::Sub(rest[after_name + 1..end].to_string()),
            end + 1,
        )
    } else {
        (Selector::None, after_name)
    };
    if after_sel != rest.len() {
        return Err(malformed(&format!("#{}", rest)));
    }

    match read_selected(exp, &name, &selector)? {
        Selected::Single(Some(value)) => Ok(value.len().to_string()),
        Selected::Single(None) => {
            if exp.options.nounset {
                Err(ExpansionError::UnboundVariable(display_name(&name, &selector)))
            } else {
                Ok("0".to_string())
            }
        }
        Selected::List(items) => Ok(items.len().to_string()),
    }
}

// ============================================================================
// ${!...}: indirection and enumeration
// ============================================================================

fn expand_bang(
    exp: &mut Expansion,
    rest: &str,
    in_quotes: bool,
) -> Result<String, ExpansionError> {
    // ${!arr[@]} / ${!arr[*]}: array indices or associative keys.
    if let Some(base) = rest
        .strip_suffix("[@]")
        .or_else(|| rest.strip_suffix("[*]"))
    {
        if is_valid_name(base) {
            let star = rest.ends_with("[*]");
            let keys: Vec<String> = if exp.vars.is_assoc(base) {
                exp.vars.enumerate_keys(base)
            } else if exp.vars.is_array(base) {
                exp.vars
                    .enumerate_indices(base)
                    .iter()
                    .map(|i| i.to_string())
                    .collect()
            } else if exp.vars.is_set(base) {
                vec!["0".to_string()]
            } else {
                Vec::new()
            };
            return Ok(join_list(exp, &keys, star, in_quotes));
        }
    }

    // ${!prefix@} / ${!prefix*}: names with this prefix, sorted.
    if let Some(prefix) = rest.strip_suffix('@').or_else(|| rest.strip_suffix('*')) {
        if is_valid_name(prefix) {
            let star = rest.ends_with('*');
            let names = exp.vars.names_with_prefix(prefix);
            return Ok(join_list(exp, &names, star, in_quotes));
        }
    }

    // ${!name}: indirect expansion.
    // A nameref expands to the name it points at, not through it.
    if is_valid_name(rest) && exp.vars.attributes(rest).nameref {
        return Ok(exp.vars.raw_get(rest).unwrap_or_default().to_string());
    }

    let (name, after_name) = parse_name(rest).ok_or_else(|| malformed(&format!("!{}", rest)))?;
    let name = name.to_string();
    let (selector, after_sel) = if rest[after_name..].starts_with('[') {
        let end = find_subscript_end(rest.as_bytes(), after_name)
            .ok_or_else(|| malformed(&format!("!{}", rest)))?;
        (
            Selector::Sub(rest[after_name + 1..end].to_string()),
            end + 1,
        )
    } else {
        (Selector::None, after_name)
    };
    if after_sel != rest.len() {
        return Err(malformed(&format!("!{}", rest)));
    }

    let target = match read_selected(exp, &name, &selector)? {
        Selected::Single(Some(value)) => value,
        Selected::Single(None) => {
            if exp.options.nounset {
                return Err(ExpansionError::UnboundVariable(display_name(&name, &selector)));
            }
            return Ok(String::new());
        }
        Selected::List(_) => return Err(malformed(&format!("!{}", rest))),
    };
    if target.is_empty() {
        return Ok(String::new());
    }

    // The dereferenced value must itself name a parameter.
    let valid_target = parse_name(&target)
        .map(|(_, end)| {
            end == target.len()
                || (target[end..].starts_with('[')
                    && find_subscript_end(target.as_bytes(), end)
                        .is_some_and(|close| close + 1 == target.len()))
        })
        .unwrap_or(false);
    if !valid_target {
        return Err(malformed(&format!("!{}", rest)));
    }
    expand_parameter(exp, &target, in_quotes)
}
