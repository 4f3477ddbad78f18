//! Range types such as `int4range` and `tstzrange`.
//!
//! Bounds are decoded and encoded through the converter of the range
//! subtype, so a `tstzrange` yields `TimestampTz` bounds.

use pgfoundation_core::error::{Error, Result};
use pgfoundation_core::{Range, Value};

use super::{Codec, mismatch};
use crate::session::Session;

#[derive(Debug, Default)]
pub struct RangeCodec {
    subtype: Option<String>,
}

impl RangeCodec {
    /// Codec deriving the subtype from the built-in range type name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec for a user-defined range over `subtype`.
    pub fn with_subtype(subtype: impl Into<String>) -> Self {
        Self {
            subtype: Some(subtype.into()),
        }
    }

    fn subtype<'a>(&'a self, type_name: &'a str) -> Result<&'a str> {
        if let Some(subtype) = &self.subtype {
            return Ok(subtype);
        }
        let subtype = match type_name {
            "int4range" => "int4",
            "int8range" => "int8",
            "numrange" => "numeric",
            "tsrange" => "timestamp",
            "tstzrange" => "timestamptz",
            "daterange" => "date",
            _ => {
                return Err(Error::converter(
                    type_name,
                    format!("no known subtype for range type '{type_name}'"),
                ));
            }
        };
        Ok(subtype)
    }
}

impl Codec for RangeCodec {
    fn decode(&self, data: Option<&str>, type_name: &str, session: &Session) -> Result<Value> {
        let Some(text) = data.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(Value::Null);
        };
        if text.eq_ignore_ascii_case("empty") {
            return Ok(Value::Range(Box::new(Range::empty())));
        }
        let subtype = self.subtype(type_name)?;
        let (lower_inclusive, upper_inclusive, lower, upper) =
            split_range(text).ok_or_else(|| Error::unparsable(type_name, text))?;

        let decode_bound = |bound: Option<String>| match bound {
            None => Ok(Value::Null),
            Some(bound) => session.decode_value(Some(&bound), subtype),
        };
        let range = Range {
            lower: decode_bound(lower)?,
            upper: decode_bound(upper)?,
            lower_inclusive,
            upper_inclusive,
            empty: false,
        };
        Ok(Value::Range(Box::new(range)))
    }

    fn encode_plain(
        &self,
        value: &Value,
        type_name: &str,
        session: &Session,
    ) -> Result<Option<String>> {
        let range = match value {
            Value::Null => return Ok(None),
            Value::Range(range) => range,
            other => return Err(mismatch(type_name, other)),
        };
        if range.empty {
            return Ok(Some("empty".to_string()));
        }
        let subtype = self.subtype(type_name)?;
        let encode_bound = |bound: &Value| -> Result<String> {
            Ok(match session.encode_plain_value(bound, subtype)? {
                None => String::new(),
                Some(text) => quote_bound(&text),
            })
        };
        Ok(Some(format!(
            "{}{},{}{}",
            if range.lower_inclusive { '[' } else { '(' },
            encode_bound(&range.lower)?,
            encode_bound(&range.upper)?,
            if range.upper_inclusive { ']' } else { ')' },
        )))
    }
}

type RangeParts = (bool, bool, Option<String>, Option<String>);

/// Split `[lower,upper)` into inclusivity flags and raw bounds. An
/// unquoted empty bound is unbounded (`None`).
fn split_range(text: &str) -> Option<RangeParts> {
    let lower_inclusive = match text.chars().next()? {
        '[' => true,
        '(' => false,
        _ => return None,
    };
    let upper_inclusive = match text.chars().last()? {
        ']' => true,
        ')' => false,
        _ => return None,
    };
    let inner = text.get(1..text.len() - 1)?;

    let mut bounds: Vec<Option<String>> = Vec::with_capacity(2);
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => current.push(chars.next()?),
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
            }
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            ',' if !in_quotes => {
                bounds.push(finish_bound(&mut current, &mut quoted));
            }
            _ => current.push(c),
        }
    }
    if in_quotes {
        return None;
    }
    bounds.push(finish_bound(&mut current, &mut quoted));

    let mut bounds = bounds.into_iter();
    match (bounds.next(), bounds.next(), bounds.next()) {
        (Some(lower), Some(upper), None) => Some((lower_inclusive, upper_inclusive, lower, upper)),
        _ => None,
    }
}

fn finish_bound(current: &mut String, quoted: &mut bool) -> Option<String> {
    let bound = std::mem::take(current);
    let was_quoted = std::mem::replace(quoted, false);
    (was_quoted || !bound.is_empty()).then_some(bound)
}

fn quote_bound(text: &str) -> String {
    let needs_quotes = text.is_empty()
        || text
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ',' | '"' | '\\' | '(' | ')' | '[' | ']'));
    if !needs_quotes {
        return text.to_string();
    }
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
