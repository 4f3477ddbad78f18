//! Integer, floating point and `numeric` types.

use std::sync::OnceLock;

use pgfoundation_core::error::{Error, Result};
use pgfoundation_core::Value;
use regex::Regex;

use super::{Codec, cached_regex, format_float, mismatch};
use crate::session::Session;

static NUMERIC: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
const NUMERIC_PATTERN: &str = r"^(?:[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?|NaN|[+-]?Infinity)$";

/// `int2`, `int4`, `int8` and `oid` decode to the matching integer
/// variant, `float4`/`float8` to `Float`/`Double` and `numeric` to
/// `Decimal` so no precision is lost.
pub struct NumberCodec;

impl Codec for NumberCodec {
    fn decode(&self, data: Option<&str>, type_name: &str, _session: &Session) -> Result<Value> {
        let Some(text) = data.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(Value::Null);
        };
        let unparsable = || Error::unparsable(type_name, text);
        match type_name {
            "int2" => text.parse().map(Value::SmallInt).map_err(|_| unparsable()),
            "int4" => text.parse().map(Value::Int).map_err(|_| unparsable()),
            "int8" => text.parse().map(Value::BigInt).map_err(|_| unparsable()),
            "oid" => text
                .parse::<u32>()
                .map(|oid| Value::BigInt(i64::from(oid)))
                .map_err(|_| unparsable()),
            "float4" => text.parse().map(Value::Float).map_err(|_| unparsable()),
            "float8" => text.parse().map(Value::Double).map_err(|_| unparsable()),
            _ => {
                if !cached_regex(&NUMERIC, NUMERIC_PATTERN)?.is_match(text) {
                    return Err(unparsable());
                }
                if type_name != "numeric" {
                    if let Ok(v) = text.parse::<i64>() {
                        return Ok(Value::BigInt(v));
                    }
                }
                Ok(Value::Decimal(text.to_string()))
            }
        }
    }

    fn encode_plain(
        &self,
        value: &Value,
        type_name: &str,
        _session: &Session,
    ) -> Result<Option<String>> {
        let text = match value {
            Value::Null => return Ok(None),
            Value::SmallInt(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::BigInt(v) => v.to_string(),
            Value::Float(v) => format_float32(*v),
            Value::Double(v) => format_float(*v),
            Value::Decimal(s) | Value::Text(s) => {
                let s = s.trim();
                if !cached_regex(&NUMERIC, NUMERIC_PATTERN)?.is_match(s) {
                    return Err(Error::unparsable(type_name, s));
                }
                s.to_string()
            }
            other => return Err(mismatch(type_name, other)),
        };
        Ok(Some(text))
    }
}

fn format_float32(value: f32) -> String {
    if value.is_finite() {
        value.to_string()
    } else {
        format_float(f64::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockConnector, default_session};

    #[test]
    fn test_decode_by_type() {
        let session = default_session(&MockConnector::new());
        let codec = NumberCodec;
        assert_eq!(codec.decode(Some("12"), "int2", &session).unwrap(), Value::SmallInt(12));
        assert_eq!(codec.decode(Some("-7"), "int4", &session).unwrap(), Value::Int(-7));
        assert_eq!(
            codec.decode(Some("9007199254740993"), "int8", &session).unwrap(),
            Value::BigInt(9_007_199_254_740_993)
        );
        assert_eq!(codec.decode(Some("4294967295"), "oid", &session).unwrap(), Value::BigInt(4_294_967_295));
        assert_eq!(codec.decode(Some("1.5"), "float8", &session).unwrap(), Value::Double(1.5));
        assert_eq!(
            codec.decode(Some("-Infinity"), "float8", &session).unwrap(),
            Value::Double(f64::NEG_INFINITY)
        );
        assert_eq!(
            codec.decode(Some("12345678901234567890.000001"), "numeric", &session).unwrap(),
            Value::Decimal("12345678901234567890.000001".into())
        );
        assert_eq!(codec.decode(Some(""), "int4", &session).unwrap(), Value::Null);
        assert_eq!(codec.decode(None, "numeric", &session).unwrap(), Value::Null);
    }

    #[test]
    fn test_unparsable_number() {
        let session = default_session(&MockConnector::new());
        match NumberCodec.decode(Some("12x"), "int4", &session).unwrap_err() {
            Error::Converter(e) => {
                assert_eq!(e.type_name, "int4");
                assert_eq!(e.value.as_deref(), Some("12x"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(NumberCodec.decode(Some("70000"), "int2", &session).is_err());
        assert!(NumberCodec.decode(Some("1.2.3"), "numeric", &session).is_err());
    }

    #[test]
    fn test_round_trip_and_literals() {
        let session = default_session(&MockConnector::new());
        let cases = [
            (Value::SmallInt(-3), "int2"),
            (Value::Int(42), "int4"),
            (Value::BigInt(i64::MIN), "int8"),
            (Value::Float(0.1), "float4"),
            (Value::Double(-2.25), "float8"),
            (Value::Decimal("3.14159".into()), "numeric"),
        ];
        for (value, wire_type) in cases {
            let plain = NumberCodec.encode_plain(&value, wire_type, &session).unwrap();
            assert_eq!(NumberCodec.decode(plain.as_deref(), wire_type, &session).unwrap(), value);
        }
        assert_eq!(NumberCodec.encode(&Value::Int(42), "int4", &session).unwrap(), "int4 '42'");
        assert_eq!(NumberCodec.encode(&Value::Null, "numeric", &session).unwrap(), "NULL::numeric");
        assert!(NumberCodec.encode(&Value::Text("abc".into()), "numeric", &session).is_err());
    }
}
