//! Composite (row) types such as `(3,"{pika,chu}")`.
//!
//! A composite codec is built from the ordered field list of its type,
//! typically read with [`Inspector::composite_structure`](crate::Inspector::composite_structure),
//! and registered under the composite type name.

use std::collections::BTreeMap;

use pgfoundation_core::error::{Error, Result};
use pgfoundation_core::Value;

use super::{Codec, mismatch, null_literal};
use crate::session::Session;

#[derive(Debug, Clone)]
pub struct CompositeCodec {
    fields: Vec<(String, String)>,
}

impl CompositeCodec {
    /// `fields` are `(name, wire type)` pairs in column order.
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }
}

impl Codec for CompositeCodec {
    fn decode(&self, data: Option<&str>, type_name: &str, session: &Session) -> Result<Value> {
        let Some(text) = data else {
            return Ok(Value::Null);
        };
        let raw = split_row(text).ok_or_else(|| Error::unparsable(type_name, text))?;
        if raw.len() != self.fields.len() {
            return Err(Error::converter(
                type_name,
                format!(
                    "row has {} fields but type {} declares {}",
                    raw.len(),
                    type_name,
                    self.fields.len()
                ),
            ));
        }
        let mut row = BTreeMap::new();
        for ((name, field_type), field) in self.fields.iter().zip(raw) {
            let value = session.decode_value(field.as_deref(), field_type)?;
            row.insert(name.clone(), value);
        }
        Ok(Value::Composite(row))
    }

    /// `ROW(...)::<type>`
    fn encode(&self, value: &Value, type_name: &str, session: &Session) -> Result<String> {
        let row = match value {
            Value::Null => return Ok(null_literal(type_name)),
            Value::Composite(row) => row,
            other => return Err(mismatch(type_name, other)),
        };
        let fields = self
            .fields
            .iter()
            .map(|(name, field_type)| {
                session.encode_value(row.get(name).unwrap_or(&Value::Null), field_type)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(format!("ROW({})::{}", fields.join(","), type_name))
    }

    fn encode_plain(
        &self,
        value: &Value,
        type_name: &str,
        session: &Session,
    ) -> Result<Option<String>> {
        let row = match value {
            Value::Null => return Ok(None),
            Value::Composite(row) => row,
            other => return Err(mismatch(type_name, other)),
        };
        let mut out = String::from("(");
        for (i, (name, field_type)) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let field = row.get(name).unwrap_or(&Value::Null);
            if let Some(text) = session.encode_plain_value(field, field_type)? {
                push_field(&mut out, &text);
            }
        }
        out.push(')');
        Ok(Some(out))
    }
}

fn push_field(out: &mut String, text: &str) {
    let needs_quotes = text.is_empty()
        || text
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | ',' | '"' | '\\'));
    if !needs_quotes {
        out.push_str(text);
        return;
    }
    out.push('"');
    for c in text.chars() {
        if matches!(c, '"' | '\\') {
            out.push(c);
        }
        out.push(c);
    }
    out.push('"');
}

/// Split `(a,"b c",)` into raw fields; an empty unquoted field is NULL.
fn split_row(text: &str) -> Option<Vec<Option<String>>> {
    let inner = text.trim().strip_prefix('(')?.strip_suffix(')')?;
    let mut fields = Vec::new();
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
                let field = std::mem::take(&mut current);
                fields.push((std::mem::replace(&mut quoted, false) || !field.is_empty()).then_some(field));
            }
            _ => current.push(c),
        }
    }
    if in_quotes {
        return None;
    }
    fields.push((quoted || !current.is_empty()).then_some(current));
    Some(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockConnector, default_session};

    fn codec() -> CompositeCodec {
        CompositeCodec::new(vec![
            ("a".to_string(), "int4".to_string()),
            ("b".to_string(), "varchar[]".to_string()),
        ])
    }

    fn row(a: Value, b: Value) -> Value {
        Value::Composite(BTreeMap::from([("a".to_string(), a), ("b".to_string(), b)]))
    }

    #[test]
    fn test_decode() {
        let session = default_session(&MockConnector::new());
        assert_eq!(
            codec().decode(Some(r#"(3,"{pika,chu}")"#), "pikachu", &session).unwrap(),
            row(
                Value::Int(3),
                Value::Array(vec![Value::Text("pika".into()), Value::Text("chu".into())])
            )
        );
        assert_eq!(
            codec().decode(Some("(,{})"), "pikachu", &session).unwrap(),
            row(Value::Null, Value::Array(vec![]))
        );
    }

    #[test]
    fn test_encode_is_the_inverse() {
        let session = default_session(&MockConnector::new());
        let value = row(
            Value::Int(3),
            Value::Array(vec![Value::Text("pika".into()), Value::Text("chu".into())]),
        );
        assert_eq!(
            codec().encode_plain(&value, "pikachu", &session).unwrap().as_deref(),
            Some(r#"(3,"{pika,chu}")"#)
        );
        assert_eq!(
            codec()
                .encode_plain(&row(Value::Null, Value::Array(vec![])), "pikachu", &session)
                .unwrap()
                .as_deref(),
            Some("(,{})")
        );
        assert_eq!(
            codec().encode(&value, "pikachu", &session).unwrap(),
            "ROW(int4 '3',ARRAY[varchar 'pika',varchar 'chu']::varchar[])::pikachu"
        );
    }

    #[test]
    fn test_quoting_round_trip() {
        let session = default_session(&MockConnector::new());
        let codec = CompositeCodec::new(vec![
            ("name".to_string(), "text".to_string()),
            ("note".to_string(), "text".to_string()),
        ]);
        let value = Value::Composite(BTreeMap::from([
            ("name".to_string(), Value::Text("say \"hi\", (ok)".into())),
            ("note".to_string(), Value::Text(String::new())),
        ]));
        let text = codec.encode_plain(&value, "memo", &session).unwrap().unwrap();
        assert_eq!(text, r#"("say ""hi"", (ok)","")"#);
        assert_eq!(codec.decode(Some(&text), "memo", &session).unwrap(), value);
    }

    #[test]
    fn test_field_count_mismatch() {
        let session = default_session(&MockConnector::new());
        assert!(matches!(
            codec().decode(Some("(1,{},3)"), "pikachu", &session),
            Err(Error::Converter(_))
        ));
        assert!(matches!(
            codec().decode(Some("1,2"), "pikachu", &session),
            Err(Error::Converter(_))
        ));
    }
}
