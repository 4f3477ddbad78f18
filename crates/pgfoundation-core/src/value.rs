//! Host-side representation of PostgreSQL values.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A decoded PostgreSQL value.
///
/// Codecs turn wire text into one of these variants and back. The variant
/// chosen for a column depends on the wire type's codec, not on the text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,

    /// Boolean value
    Bool(bool),

    /// 16-bit signed integer (`int2`)
    SmallInt(i16),

    /// 32-bit signed integer (`int4`)
    Int(i32),

    /// 64-bit signed integer (`int8`)
    BigInt(i64),

    /// 32-bit floating point (`float4`)
    Float(f32),

    /// 64-bit floating point (`float8`)
    Double(f64),

    /// Arbitrary precision decimal kept as its canonical text (`numeric`)
    Decimal(String),

    /// Text string
    Text(String),

    /// Binary data (`bytea`)
    Bytes(Vec<u8>),

    /// Calendar date
    Date(NaiveDate),

    /// Time of day without zone
    Time(NaiveTime),

    /// Timestamp without zone
    Timestamp(NaiveDateTime),

    /// Timestamp with zone, kept with the offset the server reported
    TimestampTz(DateTime<FixedOffset>),

    /// Interval split the way the server stores it
    Interval(Interval),

    /// JSON or JSONB document
    Json(serde_json::Value),

    /// Geometric point
    Point(Point),

    /// Geometric circle
    Circle(Circle),

    /// Geometric box
    Box(PgBox),

    /// Geometric line segment
    Segment(Segment),

    /// Range over numbers or timestamps
    Range(Box<Range>),

    /// Composite row keyed by field name
    Composite(BTreeMap<String, Value>),

    /// hstore key/value map, values may be NULL
    Hstore(BTreeMap<String, Option<String>>),

    /// Array of values; nested arrays model multiple dimensions
    Array(Vec<Value>),
}

/// `interval` value: months, days and microseconds are independent fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub months: i32,
    pub days: i32,
    pub microseconds: i64,
}

impl Interval {
    pub const fn new(months: i32, days: i32, microseconds: i64) -> Self {
        Self {
            months,
            days,
            microseconds,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.months == 0 && self.days == 0 && self.microseconds == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Point,
    pub radius: f64,
}

/// `box` value. Named to avoid clashing with `std::boxed::Box`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PgBox {
    pub high: Point,
    pub low: Point,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

/// Range value with per-bound inclusivity.
///
/// A `Null` bound means the range is unbounded on that side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub lower: Value,
    pub upper: Value,
    pub lower_inclusive: bool,
    pub upper_inclusive: bool,
    pub empty: bool,
}

impl Range {
    /// The canonical `[lower,upper)` form.
    pub fn new(lower: impl Into<Value>, upper: impl Into<Value>) -> Self {
        Self {
            lower: lower.into(),
            upper: upper.into(),
            lower_inclusive: true,
            upper_inclusive: false,
            empty: false,
        }
    }

    pub fn with_bounds(mut self, lower_inclusive: bool, upper_inclusive: bool) -> Self {
        self.lower_inclusive = lower_inclusive;
        self.upper_inclusive = upper_inclusive;
        self
    }

    pub fn empty() -> Self {
        Self {
            lower: Value::Null,
            upper: Value::Null,
            lower_inclusive: false,
            upper_inclusive: false,
            empty: true,
        }
    }
}

impl Value {
    /// Check if this value is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the host type name of this value.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::SmallInt(_) => "SMALLINT",
            Value::Int(_) => "INTEGER",
            Value::BigInt(_) => "BIGINT",
            Value::Float(_) => "REAL",
            Value::Double(_) => "DOUBLE",
            Value::Decimal(_) => "DECIMAL",
            Value::Text(_) => "TEXT",
            Value::Bytes(_) => "BYTES",
            Value::Date(_) => "DATE",
            Value::Time(_) => "TIME",
            Value::Timestamp(_) => "TIMESTAMP",
            Value::TimestampTz(_) => "TIMESTAMPTZ",
            Value::Interval(_) => "INTERVAL",
            Value::Json(_) => "JSON",
            Value::Point(_) => "POINT",
            Value::Circle(_) => "CIRCLE",
            Value::Box(_) => "BOX",
            Value::Segment(_) => "SEGMENT",
            Value::Range(_) => "RANGE",
            Value::Composite(_) => "COMPOSITE",
            Value::Hstore(_) => "HSTORE",
            Value::Array(_) => "ARRAY",
        }
    }

    /// Wire type a parameter of this value is sent as when the statement
    /// does not declare one. Structured values without a natural wire type
    /// return `None`.
    pub fn default_wire_type(&self) -> Option<String> {
        let name = match self {
            Value::Null => "unknown",
            Value::Bool(_) => "bool",
            Value::SmallInt(_) => "int2",
            Value::Int(_) => "int4",
            Value::BigInt(_) => "int8",
            Value::Float(_) => "float4",
            Value::Double(_) => "float8",
            Value::Decimal(_) => "numeric",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytea",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Timestamp(_) => "timestamp",
            Value::TimestampTz(_) => "timestamptz",
            Value::Interval(_) => "interval",
            Value::Json(_) => "jsonb",
            Value::Point(_) => "point",
            Value::Circle(_) => "circle",
            Value::Box(_) => "box",
            Value::Segment(_) => "lseg",
            Value::Range(_) | Value::Composite(_) | Value::Hstore(_) => return None,
            Value::Array(items) => {
                let element = items
                    .iter()
                    .find(|item| !item.is_null())
                    .map_or(Some("text".to_string()), Value::default_wire_type)?;
                let element = element.trim_end_matches("[]").to_string();
                return Some(format!("{element}[]"));
            }
        };
        Some(name.to_string())
    }

    /// Try to convert this value to a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to convert this value to an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::SmallInt(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to convert this value to an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            Value::SmallInt(v) => Some(f64::from(*v)),
            Value::Int(v) => Some(f64::from(*v)),
            Value::BigInt(v) => Some(*v as f64),
            Value::Decimal(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Decimal(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a byte slice.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_composite(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Composite(fields) => Some(fields),
            _ => None,
        }
    }

    /// Convert a `u64` to `Value`, clamping to `i64::MAX` if it overflows.
    #[must_use]
    pub fn from_u64_clamped(v: u64) -> Self {
        if let Ok(signed) = i64::try_from(v) {
            Value::BigInt(signed)
        } else {
            tracing::warn!(
                value = v,
                clamped_to = i64::MAX,
                "u64 value exceeds i64::MAX; clamping to i64::MAX"
            );
            Value::BigInt(i64::MAX)
        }
    }
}

fn mismatch(expected: &str, value: &Value) -> Error {
    Error::converter(
        expected,
        format!("expected {}, found {}", expected, value.type_name()),
    )
}

// Conversion implementations
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::SmallInt(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::BigInt(i64::from(v))
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Time(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Value::TimestampTz(v)
    }
}

impl From<Interval> for Value {
    fn from(v: Interval) -> Self {
        Value::Interval(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl From<Point> for Value {
    fn from(v: Point) -> Self {
        Value::Point(v)
    }
}

impl From<Circle> for Value {
    fn from(v: Circle) -> Self {
        Value::Circle(v)
    }
}

impl From<PgBox> for Value {
    fn from(v: PgBox) -> Self {
        Value::Box(v)
    }
}

impl From<Segment> for Value {
    fn from(v: Segment) -> Self {
        Value::Segment(v)
    }
}

impl From<Range> for Value {
    fn from(v: Range) -> Self {
        Value::Range(Box::new(v))
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

/// Convert a `Vec<String>` into a `Value::Array`.
impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::Array(v.into_iter().map(Value::Text).collect())
    }
}

/// Convert a `Vec<i32>` into a `Value::Array`.
impl From<Vec<i32>> for Value {
    fn from(v: Vec<i32>) -> Self {
        Value::Array(v.into_iter().map(Value::Int).collect())
    }
}

/// Convert a `Vec<i64>` into a `Value::Array`.
impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::Array(v.into_iter().map(Value::BigInt).collect())
    }
}

// TryFrom implementations for extracting values

impl TryFrom<Value> for bool {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Bool(v) => Ok(v),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl TryFrom<Value> for i16 {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::SmallInt(v) => Ok(v),
            other => Err(mismatch("i16", &other)),
        }
    }
}

impl TryFrom<Value> for i32 {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::SmallInt(v) => Ok(i32::from(v)),
            Value::Int(v) => Ok(v),
            other => Err(mismatch("i32", &other)),
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::SmallInt(v) => Ok(i64::from(v)),
            Value::Int(v) => Ok(i64::from(v)),
            Value::BigInt(v) => Ok(v),
            other => Err(mismatch("i64", &other)),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(f64::from(v)),
            Value::Double(v) => Ok(v),
            Value::SmallInt(v) => Ok(f64::from(v)),
            Value::Int(v) => Ok(f64::from(v)),
            other => Err(mismatch("f64", &other)),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Text(v) | Value::Decimal(v) => Ok(v),
            other => Err(mismatch("String", &other)),
        }
    }
}

impl TryFrom<Value> for NaiveDate {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Date(v) => Ok(v),
            other => Err(mismatch("NaiveDate", &other)),
        }
    }
}

impl TryFrom<Value> for NaiveDateTime {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Timestamp(v) => Ok(v),
            other => Err(mismatch("NaiveDateTime", &other)),
        }
    }
}

impl TryFrom<Value> for DateTime<FixedOffset> {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::TimestampTz(v) => Ok(v),
            other => Err(mismatch("DateTime<FixedOffset>", &other)),
        }
    }
}

impl TryFrom<Value> for serde_json::Value {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Json(v) => Ok(v),
            other => Err(mismatch("JSON", &other)),
        }
    }
}

impl<T> TryFrom<Value> for Option<T>
where
    T: TryFrom<Value, Error = Error>,
{
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::try_from(other).map(Some),
        }
    }
}

impl<T> TryFrom<Value> for Vec<T>
where
    T: TryFrom<Value, Error = Error>,
{
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => items.into_iter().map(T::try_from).collect(),
            other => Err(mismatch("array", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_primitives() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(7_i16), Value::SmallInt(7));
        assert_eq!(Value::from(7_i32), Value::Int(7));
        assert_eq!(Value::from(7_i64), Value::BigInt(7));
        assert_eq!(Value::from("pika"), Value::Text("pika".to_string()));
        assert_eq!(Value::from(None::<i32>), Value::Null);
    }

    #[test]
    fn test_try_from_option_and_vec() {
        let v: Option<i32> = Value::Null.try_into().unwrap();
        assert_eq!(v, None);

        let items: Vec<Option<i32>> =
            Value::Array(vec![Value::Int(1), Value::Null]).try_into().unwrap();
        assert_eq!(items, vec![Some(1), None]);
    }

    #[test]
    fn test_mismatch_is_converter_error() {
        let err = i32::try_from(Value::Text("x".into())).unwrap_err();
        assert!(matches!(err, Error::Converter(_)));
        assert!(err.to_string().contains("TEXT"));
    }

    #[test]
    fn test_default_wire_type() {
        assert_eq!(Value::Int(1).default_wire_type().as_deref(), Some("int4"));
        assert_eq!(
            Value::Array(vec![Value::Null, Value::BigInt(2)])
                .default_wire_type()
                .as_deref(),
            Some("int8[]")
        );
        assert_eq!(
            Value::Array(vec![Value::Array(vec![Value::Int(1)])])
                .default_wire_type()
                .as_deref(),
            Some("int4[]")
        );
        assert_eq!(Value::Array(vec![]).default_wire_type().as_deref(), Some("text[]"));
        assert!(Value::Composite(BTreeMap::new()).default_wire_type().is_none());
    }

    #[test]
    fn test_range_constructors() {
        let r = Range::new(1, 10);
        assert!(r.lower_inclusive);
        assert!(!r.upper_inclusive);
        assert!(!r.empty);

        let e = Range::empty();
        assert!(e.empty);
        assert!(e.lower.is_null());
    }

    #[test]
    fn test_from_u64_clamped() {
        assert_eq!(Value::from_u64_clamped(42), Value::BigInt(42));
        assert_eq!(Value::from_u64_clamped(u64::MAX), Value::BigInt(i64::MAX));
    }

    #[test]
    fn test_serde_round_trip() {
        let v = Value::Interval(Interval::new(14, 3, 1_500_000));
        let json = serde_json::to_string(&v).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
