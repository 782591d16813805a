//! Field Splitting
//!
//! IFS-driven word splitting. IFS bytes come in two classes:
//! - whitespace IFS (space, tab, newline that are in IFS): runs collapse,
//!   leading/trailing runs are stripped
//! - non-whitespace IFS (e.g. ':'): every occurrence is a delimiter, so
//!   consecutive ones and a leading or trailing one produce empty fields
//!
//! Two entry points: [`split_fields`] is the plain splitter the `read`
//! builtin uses; [`split_expanded`] is the quote-aware pass over a word
//! expander buffer, which also honors the embedded field marks that keep
//! "$@" parameters apart.

use super::quote::remove_quotes;

/// Unconditional field boundary, used when expanding $@ so parameters stay
/// separate even inside double quotes. Dropped from field text.
pub(crate) const FIELD_MARK: u8 = 0x1f;

/// Marks a quoted expansion that produced no fields at all ("$@" with zero
/// parameters). A field that is empty after quote removal and carries this
/// mark is dropped instead of becoming an empty argument.
pub(crate) const EMPTY_ELIDE: u8 = 0x1d;

/// A field cut from the expansion buffer, before quote removal.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawField {
    /// Field text with marker bytes removed, quotes still present.
    pub text: String,
    /// Byte range in the source buffer this field was cut from.
    pub start: usize,
    pub end: usize,
}

/// Split IFS into its whitespace and non-whitespace classes.
fn classify_ifs(ifs: &str) -> (Vec<u8>, Vec<u8>) {
    let mut whitespace = Vec::new();
    let mut non_whitespace = Vec::new();
    for &b in ifs.as_bytes() {
        if matches!(b, b' ' | b'\t' | b'\n') {
            whitespace.push(b);
        } else {
            non_whitespace.push(b);
        }
    }
    (whitespace, non_whitespace)
}

/// Plain IFS splitting of a byte string (no quote awareness), as used by
/// the `read` builtin.
///
/// A leading or trailing non-whitespace delimiter produces an empty field,
/// so with IFS=":" the input ":a::b:" splits to ["", "a", "", "b", ""].
/// Empty IFS disables splitting entirely.
pub fn split_fields(value: &str, ifs: &str) -> Vec<String> {
    if ifs.is_empty() {
        return if value.is_empty() {
            Vec::new()
        } else {
            vec![value.to_string()]
        };
    }

    let (whitespace, non_whitespace) = classify_ifs(ifs);
    let bytes = value.as_bytes();
    let mut fields: Vec<String> = Vec::new();
    let mut pos = 0;

    // Leading whitespace IFS is stripped.
    while pos < bytes.len() && whitespace.contains(&bytes[pos]) {
        pos += 1;
    }
    if pos >= bytes.len() {
        return fields;
    }

    loop {
        // Collect one field up to the next IFS byte.
        let start = pos;
        while pos < bytes.len()
            && !whitespace.contains(&bytes[pos])
            && !non_whitespace.contains(&bytes[pos])
        {
            pos += 1;
        }
        fields.push(String::from_utf8_lossy(&bytes[start..pos]).into_owned());

        if pos >= bytes.len() {
            break;
        }

        // Delimiter handling: a whitespace run, optionally around one
        // non-whitespace delimiter.
        let was_whitespace = whitespace.contains(&bytes[pos]);
        if was_whitespace {
            while pos < bytes.len() && whitespace.contains(&bytes[pos]) {
                pos += 1;
            }
            if pos >= bytes.len() {
                break;
            }
        }
        if pos < bytes.len() && non_whitespace.contains(&bytes[pos]) {
            pos += 1;
            while pos < bytes.len() && whitespace.contains(&bytes[pos]) {
                pos += 1;
            }
            if pos >= bytes.len() {
                // Trailing non-whitespace delimiter closes an empty field.
                fields.push(String::new());
                break;
            }
        }
    }

    fields
}

/// Quote-aware splitting of a word expander buffer.
///
/// Quote characters toggle protection but stay in the field text (quote
/// removal runs per field afterwards). A backslash outside single quotes
/// protects the following byte. FIELD_MARK always ends the current field;
/// EMPTY_ELIDE tags a field for removal when it quote-removes to nothing.
pub(crate) fn split_expanded(buffer: &str, ifs: &str) -> Vec<RawField> {
    let bytes = buffer.as_bytes();
    if bytes.is_empty() {
        return Vec::new();
    }

    let (whitespace, non_whitespace) = classify_ifs(ifs);
    let is_ws = |b: u8| whitespace.contains(&b);
    let is_nw = |b: u8| non_whitespace.contains(&b);

    let mut fields: Vec<RawField> = Vec::new();
    let mut pos = 0;

    // Leading whitespace IFS (the buffer always starts unquoted).
    while pos < bytes.len() && is_ws(bytes[pos]) {
        pos += 1;
    }
    if pos >= bytes.len() {
        return fields;
    }

    let mut emit = |text: String, start: usize, end: usize, elide: bool| {
        if elide && remove_quotes(&text).is_empty() {
            return;
        }
        fields.push(RawField { text, start, end });
    };

    loop {
        // Collect one field, tracking quote state.
        let start = pos;
        let mut text: Vec<u8> = Vec::new();
        let mut field_start = start;
        let mut elide = false;
        let mut in_single = false;
        let mut in_double = false;

        while pos < bytes.len() {
            let b = bytes[pos];
            if in_single {
                if b == b'\'' {
                    in_single = false;
                }
                text.push(b);
                pos += 1;
                continue;
            }
            match b {
                b'\'' if !in_double => {
                    in_single = true;
                    text.push(b);
                    pos += 1;
                }
                b'"' => {
                    in_double = !in_double;
                    text.push(b);
                    pos += 1;
                }
                b'\\' if pos + 1 < bytes.len() => {
                    text.push(b);
                    text.push(bytes[pos + 1]);
                    pos += 2;
                }
                FIELD_MARK => {
                    // Hard boundary: both sides are fields, even empty ones.
                    emit(
                        String::from_utf8_lossy(&text).into_owned(),
                        field_start,
                        pos,
                        elide,
                    );
                    text = Vec::new();
                    elide = false;
                    pos += 1;
                    field_start = pos;
                }
                EMPTY_ELIDE => {
                    elide = true;
                    pos += 1;
                }
                _ if !in_double && (is_ws(b) || is_nw(b)) => break,
                _ => {
                    text.push(b);
                    pos += 1;
                }
            }
        }

        let after_mark_split = field_start != start;
        let field_text = String::from_utf8_lossy(&text).into_owned();

        if pos >= bytes.len() {
            // Final field. An empty remainder only counts when a field mark
            // just closed (the mark promises a field on each side).
            if !field_text.is_empty() || !after_mark_split || elide {
                emit(field_text, field_start, pos, elide);
            }
            break;
        }

        emit(field_text, field_start, pos, elide);

        // Delimiter handling, as in split_fields.
        let was_whitespace = is_ws(bytes[pos]);
        if was_whitespace {
            while pos < bytes.len() && is_ws(bytes[pos]) {
                pos += 1;
            }
            if pos >= bytes.len() {
                break;
            }
        }
        if pos < bytes.len() && is_nw(bytes[pos]) {
            pos += 1;
            while pos < bytes.len() && is_ws(bytes[pos]) {
                pos += 1;
            }
            if pos >= bytes.len() {
                emit(String::new(), bytes.len(), bytes.len(), false);
                break;
            }
        }
    }

    fields
}
