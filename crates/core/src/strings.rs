//! Immutable string payload helpers.
//!
//! `spec.md` §9 sanctions storing STRING/BIGNUM payloads as
//! side-allocated immutable slices rather than packed into heap
//! follower cells; here that is simply an `Arc<str>`. This module holds
//! the escape handling shared by the reader (`joy-runtime::reader`) and
//! the writer (`joy-runtime::writer`) so the two stay in sync.

use std::sync::Arc;

/// Decode the standard escape sequences the scanner contract (`spec.md`
/// §6) promises: `\n \t \r \\ \" \'` and `\xHH`.
pub fn unescape(source: &str) -> Result<Arc<str>, String> {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('0') => out.push('\0'),
            Some('x') => {
                let hi = chars.next().ok_or("truncated \\x escape")?;
                let lo = chars.next().ok_or("truncated \\x escape")?;
                let byte = u8::from_str_radix(&format!("{hi}{lo}"), 16)
                    .map_err(|_| "invalid \\x escape")?;
                out.push(byte as char);
            }
            Some(other) => return Err(format!("unknown escape '\\{other}'")),
            None => return Err("trailing backslash".to_string()),
        }
    }
    Ok(Arc::from(out))
}

/// Inverse of [`unescape`], used by the writer to produce re-readable
/// string literals.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescape_then_escape_round_trips_ignoring_quoting_choices() {
        let decoded = unescape(r"hello\nworld").unwrap();
        assert_eq!(&*decoded, "hello\nworld");
        assert_eq!(escape(&decoded), "\"hello\\nworld\"");
    }

    #[test]
    fn rejects_unknown_escape() {
        assert!(unescape(r"\q").is_err());
    }
}
