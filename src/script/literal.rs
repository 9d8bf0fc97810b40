//! Python literal encoding for untrusted text
//!
//! Every user-supplied value that ends up inside a generated script goes
//! through [`py_str`]. The output is a double-quoted Python `str` literal made
//! only of printable ASCII: quotes and backslashes are escaped, and every
//! other character outside `' '..='~'` becomes a `\x`, `\u` or `\U` escape.
//! A literal produced here can never contain a raw quote or line break, so
//! the value cannot end the literal, start a new statement, or open a comment.

use std::fmt::Write;

/// Encode `value` as an inert Python string literal
pub fn py_str(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ' '..='~' => out.push(c),
            c if (c as u32) < 0x100 => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c if (c as u32) < 0x1_0000 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => {
                let _ = write!(out, "\\U{:08x}", c as u32);
            }
        }
    }
    out.push('"');
    out
}

/// Whether `name` is a dotted Python module path (`pkg.sub_mod`)
pub fn is_module_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
                && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        })
}

/// Whether `spec` looks like a pip requirement (`browser-use`, `patchright>=1.0`)
///
/// Leading dashes are refused so a package can never be read as a pip option.
pub fn is_package_spec(spec: &str) -> bool {
    spec.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
        && spec
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._-=<>!~,[]".contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reads back a literal produced by `py_str` the way the Python tokenizer would
    fn decode(literal: &str) -> String {
        let inner = literal
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .expect("quoted literal");
        let mut out = String::new();
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            assert_ne!(c, '"', "unescaped quote inside literal");
            if c != '\\' {
                out.push(c);
                continue;
            }
            let hex = |chars: &mut std::str::Chars<'_>, n: usize| {
                let digits: String = chars.take(n).collect();
                char::from_u32(u32::from_str_radix(&digits, 16).unwrap()).unwrap()
            };
            match chars.next().unwrap() {
                '"' => out.push('"'),
                '\\' => out.push('\\'),
                'n' => out.push('\n'),
                'r' => out.push('\r'),
                't' => out.push('\t'),
                'x' => out.push(hex(&mut chars, 2)),
                'u' => out.push(hex(&mut chars, 4)),
                'U' => out.push(hex(&mut chars, 8)),
                other => panic!("unexpected escape \\{}", other),
            }
        }
        out
    }

    #[test]
    fn test_plain_text_is_kept() {
        assert_eq!(py_str("open example.com"), "\"open example.com\"");
    }

    #[test]
    fn test_injection_payload_stays_inert() {
        let payload = r#""); import os; os.system("echo pwned")"#;
        let literal = py_str(payload);

        assert_eq!(
            literal,
            r#""\"); import os; os.system(\"echo pwned\")""#
        );
        assert_eq!(decode(&literal), payload);
    }

    #[test]
    fn test_output_is_single_line_ascii() {
        let nasty = "line1\nline2\r\u{2028}\u{0}\u{7f}'''\"\"\"\\# comment ünïcødé 🚀";
        let literal = py_str(nasty);

        assert!(literal.is_ascii());
        assert!(!literal.contains('\n'));
        assert!(!literal.contains('\r'));
        assert_eq!(decode(&literal), nasty);
    }

    #[test]
    fn test_trailing_backslash_cannot_escape_closing_quote() {
        let literal = py_str("C:\\path\\");
        assert!(literal.ends_with("\\\\\""));
        assert_eq!(decode(&literal), "C:\\path\\");
    }

    #[test]
    fn test_module_names() {
        assert!(is_module_name("browser_use"));
        assert!(is_module_name("langchain_openai.chat_models"));
        assert!(!is_module_name(""));
        assert!(!is_module_name("os; import sys"));
        assert!(!is_module_name("1abc"));
        assert!(!is_module_name("a..b"));
    }

    #[test]
    fn test_package_specs() {
        assert!(is_package_spec("browser-use"));
        assert!(is_package_spec("patchright>=1.0,<2"));
        assert!(is_package_spec("langchain[openai]"));
        assert!(!is_package_spec("--index-url=http://evil"));
        assert!(!is_package_spec("pkg other"));
        assert!(!is_package_spec(""));
    }
}
