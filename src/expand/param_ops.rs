//! Parameter Transform Operations
//!
//! The value-level transforms behind ${var#pat}, ${var/pat/rep},
//! ${var:off:len}, ${var^^} and friends. All of them are pure string
//! operations; the dispatcher in parameter.rs decides which one runs and
//! feeds it expanded, quote-removed operands.

use super::pattern::{
    find_match_at, longest_prefix_match, longest_suffix_match, matches,
    shortest_prefix_match, shortest_suffix_match,
};

/// Which occurrences ${var/pat/rep} replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReplaceMode {
    /// ${var/pat/rep}: first occurrence.
    First,
    /// ${var//pat/rep}: every occurrence.
    All,
    /// ${var/#pat/rep}: only a match anchored at the start.
    Prefix,
    /// ${var/%pat/rep}: only a match anchored at the end.
    Suffix,
}

/// Case-conversion operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CaseOp {
    /// ${var^^} / ${var@U}
    UpperAll,
    /// ${var,,} / ${var@L}
    LowerAll,
    /// ${var^} / ${var@u}
    UpperFirst,
    /// ${var,} / ${var@l}
    LowerFirst,
    /// ${var~~}
    ToggleAll,
    /// ${var~}
    ToggleFirst,
}

/// ${var#pat} / ${var##pat}: remove the shortest/longest matching prefix.
pub(crate) fn strip_prefix(value: &str, pattern: &str, longest: bool) -> String {
    let text = value.as_bytes();
    let len = if longest {
        longest_prefix_match(pattern.as_bytes(), text)
    } else {
        shortest_prefix_match(pattern.as_bytes(), text)
    };
    String::from_utf8_lossy(&text[len..]).into_owned()
}

/// ${var%pat} / ${var%%pat}: remove the shortest/longest matching suffix.
pub(crate) fn strip_suffix(value: &str, pattern: &str, longest: bool) -> String {
    let text = value.as_bytes();
    let len = if longest {
        longest_suffix_match(pattern.as_bytes(), text)
    } else {
        shortest_suffix_match(pattern.as_bytes(), text)
    };
    String::from_utf8_lossy(&text[..text.len() - len]).into_owned()
}

/// ${var/pat/rep} family.
pub(crate) fn replace(value: &str, pattern: &str, replacement: &str, mode: ReplaceMode) -> String {
    let text = value.as_bytes();
    let pat = pattern.as_bytes();

    match mode {
        ReplaceMode::Prefix => {
            let len = longest_prefix_match(pat, text);
            if len > 0 || matches(pat, b"") {
                let mut out = replacement.to_string();
                out.push_str(&String::from_utf8_lossy(&text[len..]));
                out
            } else {
                value.to_string()
            }
        }
        ReplaceMode::Suffix => {
            let len = longest_suffix_match(pat, text);
            if len > 0 || matches(pat, b"") {
                let mut out =
                    String::from_utf8_lossy(&text[..text.len() - len]).into_owned();
                out.push_str(replacement);
                out
            } else {
                value.to_string()
            }
        }
        ReplaceMode::First | ReplaceMode::All => {
            let all = mode == ReplaceMode::All;
            let mut out: Vec<u8> = Vec::with_capacity(text.len());
            let mut pos = 0;
            let mut replaced = false;
            while pos < text.len() {
                if !replaced || all {
                    if let Some(len) = find_match_at(pat, &text[pos..]) {
                        if len > 0 {
                            out.extend_from_slice(replacement.as_bytes());
                            pos += len;
                            replaced = true;
                            continue;
                        }
                    }
                }
                out.push(text[pos]);
                pos += 1;
            }
            String::from_utf8_lossy(&out).into_owned()
        }
    }
}

/// ${var:off} / ${var:off:len}: byte substring.
///
/// A negative offset counts back from the end; an offset past either end
/// yields "". A negative length is an end position counted back from the
/// end of the value (clamped to the offset).
pub(crate) fn substring(value: &str, offset: i64, length: Option<i64>) -> String {
    let text = value.as_bytes();
    let len = text.len() as i64;

    let start = if offset < 0 { len + offset } else { offset };
    if start < 0 || start > len {
        return String::new();
    }

    let end = match length {
        None => len,
        Some(n) if n < 0 => len + n,
        Some(n) => start.saturating_add(n).min(len),
    };
    if end <= start {
        return String::new();
    }

    String::from_utf8_lossy(&text[start as usize..end as usize]).into_owned()
}

/// Slice a field list the way ${@:off:len} and ${arr[@]:off:len} do.
/// A negative offset counts back from the end of the list.
pub(crate) fn slice_list(items: &[String], offset: i64, length: Option<i64>) -> Vec<String> {
    let len = items.len() as i64;
    let start = if offset < 0 { len + offset } else { offset };
    if start < 0 || start >= len {
        return Vec::new();
    }
    let count = match length {
        None => len - start,
        Some(n) if n < 0 => 0,
        Some(n) => n.min(len - start),
    };
    items[start as usize..(start + count) as usize].to_vec()
}

/// ${var^^} family: ASCII case conversion.
pub(crate) fn case_convert(value: &str, op: CaseOp) -> String {
    let mut bytes = value.as_bytes().to_vec();
    match op {
        CaseOp::UpperAll => bytes.make_ascii_uppercase(),
        CaseOp::LowerAll => bytes.make_ascii_lowercase(),
        CaseOp::UpperFirst => {
            if let Some(b) = bytes.first_mut() {
                b.make_ascii_uppercase();
            }
        }
        CaseOp::LowerFirst => {
            if let Some(b) = bytes.first_mut() {
                b.make_ascii_lowercase();
            }
        }
        CaseOp::ToggleAll => {
            for b in &mut bytes {
                toggle_case(b);
            }
        }
        CaseOp::ToggleFirst => {
            if let Some(b) = bytes.first_mut() {
                toggle_case(b);
            }
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn toggle_case(b: &mut u8) {
    if b.is_ascii_lowercase() {
        b.make_ascii_uppercase();
    } else if b.is_ascii_uppercase() {
        b.make_ascii_lowercase();
    }
}

/// ${var@Q}: wrap in single quotes, escaping embedded single quotes the
/// way a shell user would retype them.
pub(crate) fn quote_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}
