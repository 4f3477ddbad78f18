//! Text-like types: `text`, `varchar`, `uuid`, `inet`, `timetz` and friends.
//!
//! The only codec that keeps an empty string as an empty `Text`.

use pgfoundation_core::error::Result;
use pgfoundation_core::Value;

use super::{Codec, format_float, mismatch};
use crate::session::Session;

pub struct StringCodec;

impl Codec for StringCodec {
    fn decode(&self, data: Option<&str>, _type_name: &str, _session: &Session) -> Result<Value> {
        Ok(data.map_or(Value::Null, |text| Value::Text(text.to_string())))
    }

    fn encode_plain(
        &self,
        value: &Value,
        type_name: &str,
        _session: &Session,
    ) -> Result<Option<String>> {
        let text = match value {
            Value::Null => return Ok(None),
            Value::Text(s) | Value::Decimal(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::SmallInt(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::BigInt(v) => v.to_string(),
            Value::Float(v) => format_float(f64::from(*v)),
            Value::Double(v) => format_float(*v),
            other => return Err(mismatch(type_name, other)),
        };
        Ok(Some(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockConnector, default_session};

    #[test]
    fn test_empty_string_is_kept() {
        let session = default_session(&MockConnector::new());
        assert_eq!(
            StringCodec.decode(Some(""), "text", &session).unwrap(),
            Value::Text(String::new())
        );
        assert_eq!(StringCodec.decode(None, "text", &session).unwrap(), Value::Null);
    }

    #[test]
    fn test_encode_escapes_quotes() {
        let session = default_session(&MockConnector::new());
        let value = Value::Text("it's".into());
        assert_eq!(
            StringCodec.encode(&value, "varchar", &session).unwrap(),
            "varchar 'it''s'"
        );
        assert_eq!(StringCodec.encode(&Value::Null, "uuid", &session).unwrap(), "NULL::uuid");
        assert_eq!(
            StringCodec.encode_plain(&value, "varchar", &session).unwrap().as_deref(),
            Some("it's")
        );
        assert!(StringCodec.encode_plain(&Value::Array(vec![]), "text", &session).is_err());
    }

    #[test]
    fn test_encode_is_safe_without_standard_conforming_strings() {
        let connector = MockConnector::new();
        let session = crate::SessionBuilder::new(crate::SessionConfig::new("pgsql://tester@localhost/test"))
            .with_connector(connector.rc())
            .with_configuration("standard_conforming_strings", "off")
            .build_session(Some("test"))
            .unwrap();
        session.connection().unwrap().open().unwrap();
        let value = Value::Text("x\\'; DROP TABLE t; --".into());
        let literal = StringCodec.encode(&value, "text", &session).unwrap();
        assert_eq!(literal, "text E'x\\\\''; DROP TABLE t; --'");
        assert!(
            connector
                .log()
                .iter()
                .any(|sql| sql.contains("\"standard_conforming_strings\" = 'off'"))
        );
    }
}
