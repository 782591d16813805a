//! Quote Removal
//!
//! The final per-field pass that strips the syntactic quote characters
//! after all expansions are done. Inside double quotes a backslash escapes
//! $ ` " \ and newline (an escaped newline disappears entirely, which is
//! how line continuations inside quotes vanish); everywhere else bytes pass
//! through unchanged.

/// Strip unquoted quote characters from a field.
pub fn remove_quotes(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut in_single = false;
    let mut in_double = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_single {
            if b == b'\'' {
                in_single = false;
            } else {
                out.push(b);
            }
            i += 1;
        } else if in_double {
            match b {
                b'"' => {
                    in_double = false;
                    i += 1;
                }
                b'\\' if i + 1 < bytes.len() => match bytes[i + 1] {
                    b'$' | b'`' | b'"' | b'\\' => {
                        out.push(bytes[i + 1]);
                        i += 2;
                    }
                    b'\n' => {
                        i += 2;
                    }
                    _ => {
                        out.push(b'\\');
                        i += 1;
                    }
                },
                _ => {
                    out.push(b);
                    i += 1;
                }
            }
        } else {
            match b {
                b'\'' => {
                    in_single = true;
                    i += 1;
                }
                b'"' => {
                    in_double = true;
                    i += 1;
                }
                _ => {
                    out.push(b);
                    i += 1;
                }
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(remove_quotes("hello"), "hello");
        assert_eq!(remove_quotes(""), "");
    }

    #[test]
    fn test_single_quotes_stripped() {
        assert_eq!(remove_quotes("'hello'"), "hello");
        assert_eq!(remove_quotes("a'b c'd"), "ab cd");
    }

    #[test]
    fn test_double_quotes_stripped() {
        assert_eq!(remove_quotes("\"hello world\""), "hello world");
        assert_eq!(remove_quotes("a\"b\"c"), "abc");
    }

    #[test]
    fn test_single_quotes_protect_everything() {
        assert_eq!(remove_quotes("'$HOME \\n \"x\"'"), "$HOME \\n \"x\"");
    }

    #[test]
    fn test_double_quote_escapes() {
        assert_eq!(remove_quotes("\"\\$x\""), "$x");
        assert_eq!(remove_quotes("\"\\`cmd\\`\""), "`cmd`");
        assert_eq!(remove_quotes("\"say \\\"hi\\\"\""), "say \"hi\"");
        assert_eq!(remove_quotes("\"a\\\\b\""), "a\\b");
        // Other escapes keep the backslash.
        assert_eq!(remove_quotes("\"a\\nb\""), "a\\nb");
    }

    #[test]
    fn test_escaped_newline_in_double_quotes_deleted() {
        assert_eq!(remove_quotes("\"a\\\nb\""), "ab");
    }

    #[test]
    fn test_unquoted_backslash_passes_through() {
        assert_eq!(remove_quotes("a\\nb"), "a\\nb");
    }

    #[test]
    fn test_quote_inside_other_quote_kind() {
        assert_eq!(remove_quotes("\"it's\""), "it's");
        assert_eq!(remove_quotes("'say \"hi\"'"), "say \"hi\"");
    }

    #[test]
    fn test_idempotent_on_simple_fields() {
        for s in ["plain", "'a b'", "\"x y\"", "mix'ed'\" parts\""] {
            let once = remove_quotes(s);
            assert_eq!(remove_quotes(&once), once);
        }
    }
}
