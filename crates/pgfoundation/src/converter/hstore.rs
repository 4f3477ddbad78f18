//! `hstore` key/value maps: `"a"=>"1", "b"=>NULL`.

use std::collections::BTreeMap;

use pgfoundation_core::error::{Error, Result};
use pgfoundation_core::Value;

use super::{Codec, mismatch};
use crate::session::Session;

pub struct HstoreCodec;

impl Codec for HstoreCodec {
    fn decode(&self, data: Option<&str>, type_name: &str, _session: &Session) -> Result<Value> {
        let Some(text) = data else {
            return Ok(Value::Null);
        };
        parse_hstore(text)
            .map(Value::Hstore)
            .ok_or_else(|| Error::unparsable(type_name, text))
    }

    fn encode_plain(
        &self,
        value: &Value,
        type_name: &str,
        _session: &Session,
    ) -> Result<Option<String>> {
        let map = match value {
            Value::Null => return Ok(None),
            Value::Hstore(map) => map,
            other => return Err(mismatch(type_name, other)),
        };
        let pairs: Vec<String> = map
            .iter()
            .map(|(key, value)| match value {
                Some(value) => format!("{}=>{}", quote(key), quote(value)),
                None => format!("{}=>NULL", quote(key)),
            })
            .collect();
        Ok(Some(pairs.join(", ")))
    }
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

struct Scanner<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl Scanner<'_> {
    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    fn expect(&mut self, expected: &str) -> Option<()> {
        for e in expected.chars() {
            (self.chars.next()? == e).then_some(())?;
        }
        Some(())
    }

    /// A quoted or bare token; `quoted` tells `NULL` apart from `"NULL"`.
    fn token(&mut self) -> Option<(String, bool)> {
        let mut out = String::new();
        if self.chars.next_if_eq(&'"').is_some() {
            loop {
                match self.chars.next()? {
                    '\\' => out.push(self.chars.next()?),
                    '"' => return Some((out, true)),
                    c => out.push(c),
                }
            }
        }
        while let Some(c) = self
            .chars
            .next_if(|c| !c.is_whitespace() && !matches!(c, ',' | '=' | '>' | '"'))
        {
            if c == '\\' {
                out.push(self.chars.next()?);
            } else {
                out.push(c);
            }
        }
        (!out.is_empty()).then_some((out, false))
    }
}

fn parse_hstore(text: &str) -> Option<BTreeMap<String, Option<String>>> {
    let mut map = BTreeMap::new();
    let mut scanner = Scanner {
        chars: text.chars().peekable(),
    };
    scanner.skip_whitespace();
    if scanner.chars.peek().is_none() {
        return Some(map);
    }
    loop {
        scanner.skip_whitespace();
        let (key, _) = scanner.token()?;
        scanner.skip_whitespace();
        scanner.expect("=>")?;
        scanner.skip_whitespace();
        let (value, quoted) = scanner.token()?;
        let value = (quoted || !value.eq_ignore_ascii_case("NULL")).then_some(value);
        map.insert(key, value);

        scanner.skip_whitespace();
        match scanner.chars.next() {
            None => return Some(map),
            Some(',') => {}
            Some(_) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockConnector, default_session};

    fn map(pairs: &[(&str, Option<&str>)]) -> Value {
        Value::Hstore(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.map(str::to_string)))
                .collect(),
        )
    }

    #[test]
    fn test_decode() {
        let session = default_session(&MockConnector::new());
        let value = HstoreCodec
            .decode(Some(r#""a"=>"1", "b"=>NULL, "c"=>"NULL", "q\"k"=>"x\\y""#), "hstore", &session)
            .unwrap();
        assert_eq!(
            value,
            map(&[("a", Some("1")), ("b", None), ("c", Some("NULL")), ("q\"k", Some("x\\y"))])
        );
        assert_eq!(HstoreCodec.decode(Some(""), "hstore", &session).unwrap(), map(&[]));
        assert_eq!(HstoreCodec.decode(Some("k=>v"), "hstore", &session).unwrap(), map(&[("k", Some("v"))]));
    }

    #[test]
    fn test_encode() {
        let session = default_session(&MockConnector::new());
        let value = map(&[("a", Some("1")), ("b", None), ("it's", Some("x\"y"))]);
        assert_eq!(
            HstoreCodec.encode_plain(&value, "hstore", &session).unwrap().as_deref(),
            Some(r#""a"=>"1", "b"=>NULL, "it's"=>"x\"y""#)
        );
        assert_eq!(
            HstoreCodec.encode(&value, "hstore", &session).unwrap(),
            r#"hstore E'"a"=>"1", "b"=>NULL, "it''s"=>"x\\"y"'"#
        );
    }

    #[test]
    fn test_malformed() {
        let session = default_session(&MockConnector::new());
        for text in [r#""a"="1""#, r#""a"=>"1" "b"=>"2""#, r#""a"=>"#, r#""a=>"1""#] {
            assert!(
                matches!(HstoreCodec.decode(Some(text), "hstore", &session), Err(Error::Converter(_))),
                "{text}"
            );
        }
    }
}
