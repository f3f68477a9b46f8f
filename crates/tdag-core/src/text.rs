//! Value-level helpers shared by the scenario and pipeline formats

/// Delimiter between bundled commands in multi-command scenario fields
pub const BUNDLE_DELIMITER: &str = "|||";

/// Strip one layer of matching single or double quotes, leaving the inner text verbatim
#[must_use]
pub fn strip_quotes(raw: &str) -> &str {
    let bytes = raw.as_bytes();
    let quoted = raw.len() >= 2
        && matches!(bytes[0], b'"' | b'\'')
        && bytes[raw.len() - 1] == bytes[0];
    if quoted {
        &raw[1..raw.len() - 1]
    } else {
        raw
    }
}

/// Inverse of [`quote`]
///
/// Double-quoted values have `\"` and `\\` unescaped. Single-quoted values
/// are taken verbatim.
#[must_use]
pub fn unquote(raw: &str) -> String {
    let inner = strip_quotes(raw);
    if inner.len() != raw.len() && raw.starts_with('"') {
        unescape(inner)
    } else {
        inner.to_string()
    }
}

fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('"' | '\\')) => out.push(next),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Render a value as a double-quoted string
#[must_use]
pub fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Split a comma-separated list, trimming and dropping empty items
#[must_use]
pub fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split a `|||`-delimited command bundle, trimming and dropping empty items
#[must_use]
pub fn split_bundle(raw: &str) -> Vec<String> {
    raw.split(BUNDLE_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Recognized no-op placeholders that must not stand in for a real command
#[must_use]
pub fn is_noop_command(cmd: &str) -> bool {
    matches!(cmd.trim(), "true" | ":")
}

/// Identifier charset shared by scenario ids, node ids and pipeline ids
#[must_use]
pub fn is_valid_id(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn unquote_strips_matching_quotes_only() {
        assert_eq!(unquote("\"echo hi\""), "echo hi");
        assert_eq!(unquote("'echo hi'"), "echo hi");
        assert_eq!(unquote("\"echo hi'"), "\"echo hi'");
        assert_eq!(unquote("\""), "\"");
        assert_eq!(unquote("plain"), "plain");
    }

    #[test]
    fn strip_quotes_keeps_escapes() {
        assert_eq!(strip_quotes(r#""grep \"a\" f""#), r#"grep \"a\" f"#);
        assert_eq!(strip_quotes("'x'"), "x");
        assert_eq!(strip_quotes("'x\""), "'x\"");
        assert_eq!(strip_quotes("'"), "'");
    }

    #[test]
    fn unquote_unescapes_double_quoted() {
        assert_eq!(unquote(r#""grep \"a b\" f""#), r#"grep "a b" f"#);
        assert_eq!(unquote(r#""C:\\tmp""#), r"C:\tmp");
        assert_eq!(unquote(r"'keep \n'"), r"keep \n");
    }

    #[test]
    fn csv_and_bundle_splitting() {
        assert_eq!(split_csv(" a, ,b ,"), vec!["a", "b"]);
        assert!(split_csv("").is_empty());
        assert_eq!(
            split_bundle("cargo test a ||| cargo test b|||"),
            vec!["cargo test a", "cargo test b"]
        );
    }

    #[test]
    fn noop_detection() {
        assert!(is_noop_command(" true "));
        assert!(is_noop_command(":"));
        assert!(!is_noop_command("true && false"));
    }

    #[test]
    fn id_charset() {
        assert!(is_valid_id("login-flow_v1.2"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("a/b"));
        assert!(!is_valid_id("a b"));
    }

    proptest! {
        #[test]
        fn quote_then_unquote_is_identity(value in ".*") {
            prop_assert_eq!(unquote(&quote(&value)), value);
        }
    }
}
