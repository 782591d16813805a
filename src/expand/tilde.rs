//! Tilde Expansion
//!
//! Expands ~ prefixes at the start of a word (and after : or = in
//! assignment-like positions, which the word scanner decides). Supported
//! forms: ~ ($HOME), ~+ ($PWD), ~- ($OLDPWD), ~user ($HOME for the current
//! user, /root for root). Anything unresolvable stays literal.

use crate::shell::ShellVars;

/// Try to expand a tilde prefix at the start of `input`.
/// Returns the replacement text and the number of bytes consumed, or None
/// when the prefix should stay literal.
pub(crate) fn expand_tilde(vars: &ShellVars, input: &str) -> Option<(String, usize)> {
    debug_assert!(input.starts_with('~'));
    let bytes = input.as_bytes();

    // The prefix runs to the first '/' or ':' (or end of word).
    let mut end = 1;
    while end < bytes.len() && bytes[end] != b'/' && bytes[end] != b':' {
        end += 1;
    }
    let prefix = &input[1..end];

    let home = match prefix {
        "" => vars.get("HOME")?,
        "+" => vars.get("PWD")?,
        "-" => vars.get("OLDPWD")?,
        user if is_user_name(user) => {
            if vars.get("USER").as_deref() == Some(user) {
                vars.get("HOME")?
            } else if user == "root" {
                "/root".to_string()
            } else {
                return None;
            }
        }
        _ => return None,
    };

    Some((home, end))
}

fn is_user_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::Scope;

    fn store_with(pairs: &[(&str, &str)]) -> ShellVars {
        let mut vars = ShellVars::new();
        for (name, value) in pairs {
            vars.set(name, value, Scope::Visible).unwrap();
        }
        vars
    }

    #[test]
    fn test_bare_tilde() {
        let vars = store_with(&[("HOME", "/home/alex")]);
        assert_eq!(
            expand_tilde(&vars, "~"),
            Some(("/home/alex".to_string(), 1))
        );
        assert_eq!(
            expand_tilde(&vars, "~/src"),
            Some(("/home/alex".to_string(), 1))
        );
    }

    #[test]
    fn test_tilde_before_colon() {
        // PATH-style value: the prefix stops at ':'.
        let vars = store_with(&[("HOME", "/home/alex")]);
        assert_eq!(
            expand_tilde(&vars, "~:/usr/bin"),
            Some(("/home/alex".to_string(), 1))
        );
    }

    #[test]
    fn test_tilde_plus_minus() {
        let vars = store_with(&[("PWD", "/work"), ("OLDPWD", "/prev")]);
        assert_eq!(expand_tilde(&vars, "~+"), Some(("/work".to_string(), 2)));
        assert_eq!(expand_tilde(&vars, "~-/x"), Some(("/prev".to_string(), 2)));
    }

    #[test]
    fn test_tilde_unset_home_stays_literal() {
        let vars = ShellVars::new();
        assert_eq!(expand_tilde(&vars, "~"), None);
        assert_eq!(expand_tilde(&vars, "~+"), None);
    }

    #[test]
    fn test_tilde_current_user() {
        let vars = store_with(&[("HOME", "/home/alex"), ("USER", "alex")]);
        assert_eq!(
            expand_tilde(&vars, "~alex/bin"),
            Some(("/home/alex".to_string(), 5))
        );
    }

    #[test]
    fn test_tilde_root() {
        let vars = ShellVars::new();
        assert_eq!(expand_tilde(&vars, "~root"), Some(("/root".to_string(), 5)));
        assert_eq!(
            expand_tilde(&vars, "~root/bin"),
            Some(("/root".to_string(), 5))
        );
    }

    #[test]
    fn test_unknown_user_stays_literal() {
        let vars = store_with(&[("HOME", "/home/alex"), ("USER", "alex")]);
        assert_eq!(expand_tilde(&vars, "~nobody"), None);
    }
}
