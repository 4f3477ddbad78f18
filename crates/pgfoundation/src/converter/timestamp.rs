//! `timestamp`, `timestamptz`, `date` and `time` in ISO date style.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use pgfoundation_core::error::{ConverterError, Error, Result};
use pgfoundation_core::Value;

use super::{Codec, mismatch};
use crate::session::Session;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const TIMESTAMPTZ_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];
const TIMESTAMPTZ_OUTPUT: &str = "%Y-%m-%d %H:%M:%S%.f%:z";

pub struct TimestampCodec;

impl Codec for TimestampCodec {
    fn decode(&self, data: Option<&str>, type_name: &str, _session: &Session) -> Result<Value> {
        let Some(text) = data.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(Value::Null);
        };
        if text.eq_ignore_ascii_case("infinity") || text.eq_ignore_ascii_case("-infinity") {
            return Err(Error::Converter(
                ConverterError::new(type_name, "infinite dates have no host representation")
                    .with_value(text),
            ));
        }

        let parsed = match type_name {
            "date" => NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .map(Value::Date),
            "time" => NaiveTime::parse_from_str(text, TIME_FORMAT)
                .ok()
                .map(Value::Time),
            "timestamptz" => TIMESTAMPTZ_FORMATS
                .iter()
                .find_map(|format| DateTime::parse_from_str(text, format).ok())
                .map(Value::TimestampTz),
            _ => TIMESTAMP_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                .map(Value::Timestamp),
        };
        parsed.ok_or_else(|| Error::unparsable(type_name, text))
    }

    fn encode_plain(
        &self,
        value: &Value,
        type_name: &str,
        _session: &Session,
    ) -> Result<Option<String>> {
        let text = match value {
            Value::Null => return Ok(None),
            Value::Timestamp(ts) => ts.format(TIMESTAMP_FORMATS[0]).to_string(),
            Value::TimestampTz(ts) => ts.format(TIMESTAMPTZ_OUTPUT).to_string(),
            Value::Date(date) => date.format(DATE_FORMAT).to_string(),
            Value::Time(time) => time.format(TIME_FORMAT).to_string(),
            Value::Text(text) => text.clone(),
            other => return Err(mismatch(type_name, other)),
        };
        Ok(Some(text))
    }
}
