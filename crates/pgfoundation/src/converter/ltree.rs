//! `ltree` labels as an array of text.

use pgfoundation_core::error::Result;
use pgfoundation_core::Value;

use super::{Codec, mismatch};
use crate::session::Session;

pub struct LtreeCodec;

impl Codec for LtreeCodec {
    fn decode(&self, data: Option<&str>, _type_name: &str, _session: &Session) -> Result<Value> {
        let Some(text) = data.filter(|t| !t.is_empty()) else {
            return Ok(Value::Null);
        };
        Ok(Value::Array(
            text.split('.').map(|label| Value::Text(label.to_string())).collect(),
        ))
    }

    fn encode_plain(
        &self,
        value: &Value,
        type_name: &str,
        _session: &Session,
    ) -> Result<Option<String>> {
        match value {
            Value::Null => Ok(None),
            Value::Text(path) => Ok(Some(path.clone())),
            Value::Array(labels) => {
                let labels = labels
                    .iter()
                    .map(|label| match label {
                        Value::Text(s) => Ok(s.as_str()),
                        other => Err(mismatch(type_name, other)),
                    })
                    .collect::<Result<Vec<&str>>>()?;
                Ok(Some(labels.join(".")))
            }
            other => Err(mismatch(type_name, other)),
        }
    }
}
