//! `bytea`, in hex or legacy escape output.

use pgfoundation_core::error::Result;
use pgfoundation_core::Value;

use super::{Codec, mismatch};
use crate::session::Session;

pub struct ByteaCodec;

impl Codec for ByteaCodec {
    fn decode(&self, data: Option<&str>, _type_name: &str, session: &Session) -> Result<Value> {
        match data {
            None | Some("") => Ok(Value::Null),
            Some(text) => Ok(Value::Bytes(session.unescape_bytea(text)?)),
        }
    }

    fn encode_plain(
        &self,
        value: &Value,
        type_name: &str,
        session: &Session,
    ) -> Result<Option<String>> {
        match value {
            Value::Null => Ok(None),
            Value::Bytes(bytes) => Ok(Some(session.escape_bytea(bytes)?)),
            Value::Text(text) => Ok(Some(session.escape_bytea(text.as_bytes())?)),
            other => Err(mismatch(type_name, other)),
        }
    }
}
