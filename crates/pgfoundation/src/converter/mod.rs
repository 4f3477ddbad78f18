//! Converter engine: codecs between wire text and host [`Value`]s.
//!
//! Every codec implements three operations:
//!
//! - `decode`: wire text (or NULL) to a host value
//! - `encode`: host value to a self-contained SQL literal such as
//!   `int4 '42'`, `ARRAY[...]::int4[]` or `NULL::text`
//! - `encode_plain`: host value to the standard text format used inside
//!   other literals and for query parameters; NULL gives `None`
//!
//! Codecs receive the session so container codecs can reach the codecs of
//! their element types through the converter pooler.

mod array;
mod boolean;
mod bytea;
mod composite;
mod geometry;
mod hstore;
mod interval;
mod json;
mod ltree;
mod number;
mod range;
mod registry;
mod string;
mod timestamp;

pub use array::ArrayCodec;
pub use boolean::BooleanCodec;
pub use bytea::ByteaCodec;
pub use composite::CompositeCodec;
pub use geometry::{BoxCodec, CircleCodec, PointCodec, SegmentCodec};
pub use hstore::HstoreCodec;
pub use interval::IntervalCodec;
pub use json::JsonCodec;
pub use ltree::LtreeCodec;
pub use number::NumberCodec;
pub use range::RangeCodec;
pub use registry::ConverterRegistry;
pub use string::StringCodec;
pub use timestamp::TimestampCodec;

use std::rc::Rc;
use std::sync::OnceLock;

use pgfoundation_core::error::{Error, FoundationErrorKind, Result};
use pgfoundation_core::Value;
use regex::Regex;

use crate::client::{Client, ClientContext, client_type};
use crate::session::Session;

/// Wire type key of the shared array codec.
pub const ARRAY_TYPE: &str = "array";

pub trait Codec {
    /// Convert wire text to a host value. `None` is SQL NULL.
    fn decode(&self, data: Option<&str>, type_name: &str, session: &Session) -> Result<Value>;

    /// Standard text format of `value`, `None` for NULL.
    fn encode_plain(&self, value: &Value, type_name: &str, session: &Session)
    -> Result<Option<String>>;

    /// SQL literal for `value`: `NULL::<type>` or `<type> '<text>'`.
    fn encode(&self, value: &Value, type_name: &str, session: &Session) -> Result<String> {
        match self.encode_plain(value, type_name, session)? {
            None => Ok(null_literal(type_name)),
            Some(text) => typed_literal(session, type_name, &text),
        }
    }
}

/// Element type of an array wire type: `_int4` and `int4[]` give `int4`.
pub fn array_element_type(type_name: &str) -> Option<&str> {
    if let Some(element) = type_name.strip_prefix('_') {
        return (!element.is_empty()).then_some(element);
    }
    if type_name.ends_with("[]") {
        let element = type_name.trim_end_matches("[]");
        return (!element.is_empty()).then_some(element);
    }
    None
}

/// Converter client: one codec bound to one wire type key.
pub struct ConverterClient {
    identifier: String,
    codec: Rc<dyn Codec>,
    context: ClientContext,
}

impl ConverterClient {
    pub fn new(identifier: impl Into<String>, codec: Rc<dyn Codec>) -> Self {
        Self {
            identifier: identifier.into(),
            codec,
            context: ClientContext::new(),
        }
    }

    pub fn codec(&self) -> Rc<dyn Codec> {
        Rc::clone(&self.codec)
    }

    pub fn decode(&self, data: Option<&str>, type_name: &str, session: &Session) -> Result<Value> {
        self.codec.decode(data, type_name, session)
    }

    pub fn encode(&self, value: &Value, type_name: &str, session: &Session) -> Result<String> {
        self.codec.encode(value, type_name, session)
    }

    pub fn encode_plain(
        &self,
        value: &Value,
        type_name: &str,
        session: &Session,
    ) -> Result<Option<String>> {
        self.codec.encode_plain(value, type_name, session)
    }
}

impl Client for ConverterClient {
    fn client_type(&self) -> &str {
        client_type::CONVERTER
    }

    fn client_identifier(&self) -> &str {
        &self.identifier
    }

    fn context(&self) -> &ClientContext {
        &self.context
    }
}

pub(crate) fn null_literal(type_name: &str) -> String {
    format!("NULL::{type_name}")
}

/// `<type> '<escaped text>'`
pub(crate) fn typed_literal(session: &Session, type_name: &str, text: &str) -> Result<String> {
    Ok(format!("{} {}", type_name, session.escape_literal(text)?))
}

/// A host value this codec cannot encode.
pub(crate) fn mismatch(type_name: &str, value: &Value) -> Error {
    Error::converter(
        type_name,
        format!("cannot encode a {} value as {}", value.type_name(), type_name),
    )
}

/// Compile `pattern` once per static cell.
pub(crate) fn cached_regex(
    cell: &'static OnceLock<std::result::Result<Regex, regex::Error>>,
    pattern: &str,
) -> Result<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern))
        .as_ref()
        .map_err(|e| {
            Error::foundation(
                FoundationErrorKind::Configuration,
                format!("invalid converter pattern: {e}"),
            )
        })
}

/// Text of an `f64` the server reads back exactly.
pub(crate) fn format_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        value.to_string()
    }
}
