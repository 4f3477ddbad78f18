//! Identifier, literal and bytea escaping.
//!
//! Literals are written so they read back the same whether or not
//! `standard_conforming_strings` is on. Drivers may override these through
//! [`Driver`](crate::Driver) but every codec goes through the connection
//! rather than concatenating text itself.

use crate::error::{Error, Result};

/// Quote an identifier with double quotes.
///
/// Embedded double-quotes are escaped by doubling them (`"` → `""`).
///
/// ```
/// use pgfoundation_core::escape_identifier;
///
/// assert_eq!(escape_identifier("users"), "\"users\"");
/// assert_eq!(escape_identifier("user\"name"), "\"user\"\"name\"");
/// ```
#[inline]
pub fn escape_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal with single quotes.
///
/// Embedded single quotes are doubled. Text containing a backslash is
/// written as an `E'...'` literal with every backslash doubled, which reads
/// back the same whatever `standard_conforming_strings` is set to.
///
/// ```
/// use pgfoundation_core::escape_literal;
///
/// assert_eq!(escape_literal("it's"), "'it''s'");
/// assert_eq!(escape_literal(r"a\b"), r"E'a\\b'");
/// ```
pub fn escape_literal(text: &str) -> String {
    let has_backslash = text.contains('\\');
    let mut out = String::with_capacity(text.len() + 3);
    if has_backslash {
        out.push('E');
    }
    out.push('\'');
    for c in text.chars() {
        match c {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Render bytes in the `\x` hex format accepted by `bytea` input.
pub fn escape_bytea(data: &[u8]) -> String {
    let mut out = String::with_capacity(2 + data.len() * 2);
    out.push_str("\\x");
    for byte in data {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Decode `bytea` output text in either the hex or the legacy escape format.
pub fn unescape_bytea(text: &str) -> Result<Vec<u8>> {
    match text.strip_prefix("\\x") {
        Some(hex) => decode_hex(hex),
        None => decode_bytea_escape(text),
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let s = s.trim();
    if s.len() % 2 != 0 || !s.is_ascii() {
        return Err(Error::unparsable("bytea", s));
    }

    let mut bytes = Vec::with_capacity(s.len() / 2);
    for i in (0..s.len()).step_by(2) {
        let byte =
            u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| Error::unparsable("bytea", s))?;
        bytes.push(byte);
    }
    Ok(bytes)
}

fn decode_bytea_escape(s: &str) -> Result<Vec<u8>> {
    let raw = s.as_bytes();
    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] != b'\\' {
            bytes.push(raw[i]);
            i += 1;
            continue;
        }
        match raw.get(i + 1) {
            Some(b'\\') => {
                bytes.push(b'\\');
                i += 2;
            }
            Some(b'0'..=b'3') => {
                // \NNN octal escape
                let octal = raw
                    .get(i + 1..i + 4)
                    .and_then(|digits| std::str::from_utf8(digits).ok())
                    .ok_or_else(|| Error::unparsable("bytea", s))?;
                let byte = u8::from_str_radix(octal, 8).map_err(|_| Error::unparsable("bytea", s))?;
                bytes.push(byte);
                i += 4;
            }
            _ => return Err(Error::unparsable("bytea", s)),
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_identifier_doubles_quotes() {
        assert_eq!(escape_identifier(""), "\"\"");
        assert_eq!(escape_identifier("a\"b\"c"), "\"a\"\"b\"\"c\"");
        assert_eq!(escape_identifier("first name"), "\"first name\"");
    }

    #[test]
    fn test_escape_identifier_injection_attempt() {
        let quoted = escape_identifier("users\"; DROP TABLE secrets; --");
        assert_eq!(quoted, "\"users\"\"; DROP TABLE secrets; --\"");
    }

    #[test]
    fn test_escape_literal() {
        assert_eq!(escape_literal(""), "''");
        assert_eq!(escape_literal("pika'chu"), "'pika''chu'");
        assert_eq!(escape_literal("back\\slash"), "E'back\\\\slash'");
    }

    #[test]
    fn test_escape_literal_backslash_cannot_close_the_quote() {
        // with standard_conforming_strings off, `\'` would end a plain literal
        let escaped = escape_literal("x\\'; DROP TABLE t; --");
        assert_eq!(escaped, "E'x\\\\''; DROP TABLE t; --'");
        let body = &escaped[2..escaped.len() - 1];
        assert!(!body.replace("\\\\", "").replace("''", "").contains('\''));
    }

    #[test]
    fn test_escape_bytea_hex() {
        assert_eq!(escape_bytea(b""), "\\x");
        assert_eq!(escape_bytea(&[0xde, 0xad, 0x00]), "\\xdead00");
    }

    #[test]
    fn test_unescape_bytea_hex() {
        assert_eq!(unescape_bytea("\\x68656c6c6f").unwrap(), b"hello");
        assert!(unescape_bytea("\\x6").is_err());
        assert!(unescape_bytea("\\xzz").is_err());
    }

    #[test]
    fn test_unescape_bytea_escape_format() {
        assert_eq!(unescape_bytea("ab\\\\c").unwrap(), b"ab\\c");
        assert_eq!(unescape_bytea("\\000\\377").unwrap(), vec![0, 255]);
        assert!(unescape_bytea("\\9").is_err());
    }

    #[test]
    fn test_bytea_round_trip() {
        let data: Vec<u8> = (0..=255).collect();
        assert_eq!(unescape_bytea(&escape_bytea(&data)).unwrap(), data);
    }
}
