//! `bool`

use pgfoundation_core::error::{Error, Result};
use pgfoundation_core::Value;

use super::{Codec, mismatch};
use crate::session::Session;

pub struct BooleanCodec;

impl Codec for BooleanCodec {
    fn decode(&self, data: Option<&str>, type_name: &str, _session: &Session) -> Result<Value> {
        let Some(text) = data.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(Value::Null);
        };
        match text.to_ascii_lowercase().as_str() {
            "t" | "true" | "yes" | "on" | "1" => Ok(Value::Bool(true)),
            "f" | "false" | "no" | "off" | "0" => Ok(Value::Bool(false)),
            _ => Err(Error::unparsable(type_name, text)),
        }
    }

    fn encode_plain(
        &self,
        value: &Value,
        type_name: &str,
        _session: &Session,
    ) -> Result<Option<String>> {
        match value {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(if *b { "t" } else { "f" }.to_string())),
            other => Err(mismatch(type_name, other)),
        }
    }
}
