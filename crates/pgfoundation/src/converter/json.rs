//! `json` and `jsonb`

use pgfoundation_core::error::{ConverterError, Error, Result};
use pgfoundation_core::Value;

use super::{Codec, mismatch};
use crate::session::Session;

pub struct JsonCodec;

impl Codec for JsonCodec {
    fn decode(&self, data: Option<&str>, type_name: &str, _session: &Session) -> Result<Value> {
        let Some(text) = data.filter(|t| !t.is_empty()) else {
            return Ok(Value::Null);
        };
        serde_json::from_str(text).map(Value::Json).map_err(|e| {
            Error::Converter(
                ConverterError::new(type_name, format!("invalid JSON: {e}")).with_value(text),
            )
        })
    }

    /// `Json` values are serialized; `Text` is taken as an already encoded
    /// document and must parse.
    fn encode_plain(
        &self,
        value: &Value,
        type_name: &str,
        _session: &Session,
    ) -> Result<Option<String>> {
        match value {
            Value::Null => Ok(None),
            Value::Json(json) => serde_json::to_string(json)
                .map(Some)
                .map_err(|e| Error::converter(type_name, format!("cannot serialize JSON: {e}"))),
            Value::Text(text) => {
                serde_json::from_str::<serde_json::Value>(text).map_err(|e| {
                    Error::Converter(
                        ConverterError::new(type_name, format!("invalid JSON: {e}"))
                            .with_value(text.as_str()),
                    )
                })?;
                Ok(Some(text.clone()))
            }
            other => Err(mismatch(type_name, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockConnector, default_session};
    use serde_json::json;

    #[test]
    fn test_json_round_trip() {
        let session = default_session(&MockConnector::new());
        let value = Value::Json(json!({"name": "O'Brien", "tags": [1, 2, null]}));
        let plain = JsonCodec.encode_plain(&value, "jsonb", &session).unwrap();
        assert_eq!(JsonCodec.decode(plain.as_deref(), "jsonb", &session).unwrap(), value);

        let literal = JsonCodec.encode(&value, "jsonb", &session).unwrap();
        assert!(literal.starts_with("jsonb '{"));
        assert!(literal.contains("O''Brien"));
    }

    #[test]
    fn test_invalid_json() {
        let session = default_session(&MockConnector::new());
        let err = JsonCodec.decode(Some("{nope"), "json", &session).unwrap_err();
        match err {
            Error::Converter(e) => {
                assert_eq!(e.type_name, "json");
                assert_eq!(e.value.as_deref(), Some("{nope"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(JsonCodec.encode_plain(&Value::Text("{".into()), "json", &session).is_err());
        assert_eq!(JsonCodec.decode(Some(""), "json", &session).unwrap(), Value::Null);
    }
}
