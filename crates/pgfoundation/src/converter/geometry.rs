//! Geometric types: `point`, `circle`, `box` and `lseg`.

use std::sync::OnceLock;

use pgfoundation_core::error::{Error, Result};
use pgfoundation_core::{Circle, PgBox, Point, Segment, Value};
use regex::{Captures, Regex};

use super::{Codec, cached_regex, format_float, mismatch};
use crate::session::Session;

macro_rules! num {
    () => {
        r"\s*([+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?|[+-]?Infinity|NaN)\s*"
    };
}

macro_rules! point {
    () => {
        concat!(r"\s*\(", num!(), ",", num!(), r"\)\s*")
    };
}

type Pattern = OnceLock<std::result::Result<Regex, regex::Error>>;

static POINT: Pattern = OnceLock::new();
static CIRCLE: Pattern = OnceLock::new();
static BOX: Pattern = OnceLock::new();
static SEGMENT: Pattern = OnceLock::new();

const POINT_PATTERN: &str = concat!("^", point!(), "$");
const CIRCLE_PATTERN: &str = concat!(r"^\s*<", point!(), ",", num!(), r">\s*$");
const BOX_PATTERN: &str = concat!("^", point!(), ",", point!(), "$");
const SEGMENT_PATTERN: &str = concat!(r"^\s*\[", point!(), ",", point!(), r"\]\s*$");

fn capture_floats(
    cell: &'static Pattern,
    pattern: &str,
    text: &str,
    type_name: &str,
) -> Result<Vec<f64>> {
    let regex = cached_regex(cell, pattern)?;
    let captures: Captures<'_> = regex
        .captures(text)
        .ok_or_else(|| Error::unparsable(type_name, text))?;
    captures
        .iter()
        .skip(1)
        .flatten()
        .map(|m| parse_float(m.as_str()).ok_or_else(|| Error::unparsable(type_name, text)))
        .collect()
}

fn parse_float(text: &str) -> Option<f64> {
    match text {
        "NaN" => Some(f64::NAN),
        "Infinity" | "+Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => text.parse().ok(),
    }
}

fn format_point(point: &Point) -> String {
    format!("({},{})", format_float(point.x), format_float(point.y))
}

fn is_finite(point: &Point) -> bool {
    point.x.is_finite() && point.y.is_finite()
}

fn decode_text<'a>(data: Option<&'a str>) -> Option<&'a str> {
    data.map(str::trim).filter(|t| !t.is_empty())
}

/// `(x,y)`
pub struct PointCodec;

impl Codec for PointCodec {
    fn decode(&self, data: Option<&str>, type_name: &str, _session: &Session) -> Result<Value> {
        let Some(text) = decode_text(data) else {
            return Ok(Value::Null);
        };
        let n = capture_floats(&POINT, POINT_PATTERN, text, type_name)?;
        Ok(Value::Point(Point::new(n[0], n[1])))
    }

    fn encode_plain(
        &self,
        value: &Value,
        type_name: &str,
        _session: &Session,
    ) -> Result<Option<String>> {
        match value {
            Value::Null => Ok(None),
            Value::Point(p) => Ok(Some(format_point(p))),
            other => Err(mismatch(type_name, other)),
        }
    }

    fn encode(&self, value: &Value, type_name: &str, session: &Session) -> Result<String> {
        match value {
            Value::Point(p) if is_finite(p) => Ok(format!("point({},{})", p.x, p.y)),
            _ => default_encode(self, value, type_name, session),
        }
    }
}

/// `<(x,y),r>`
pub struct CircleCodec;

impl Codec for CircleCodec {
    fn decode(&self, data: Option<&str>, type_name: &str, _session: &Session) -> Result<Value> {
        let Some(text) = decode_text(data) else {
            return Ok(Value::Null);
        };
        let n = capture_floats(&CIRCLE, CIRCLE_PATTERN, text, type_name)?;
        Ok(Value::Circle(Circle {
            center: Point::new(n[0], n[1]),
            radius: n[2],
        }))
    }

    fn encode_plain(
        &self,
        value: &Value,
        type_name: &str,
        _session: &Session,
    ) -> Result<Option<String>> {
        match value {
            Value::Null => Ok(None),
            Value::Circle(c) => Ok(Some(format!(
                "<{},{}>",
                format_point(&c.center),
                format_float(c.radius)
            ))),
            other => Err(mismatch(type_name, other)),
        }
    }

    fn encode(&self, value: &Value, type_name: &str, session: &Session) -> Result<String> {
        match value {
            Value::Circle(c) if is_finite(&c.center) && c.radius.is_finite() => Ok(format!(
                "circle(point({},{}),{})",
                c.center.x, c.center.y, c.radius
            )),
            _ => default_encode(self, value, type_name, session),
        }
    }
}

/// `(x1,y1),(x2,y2)`, upper right corner first.
pub struct BoxCodec;

impl Codec for BoxCodec {
    fn decode(&self, data: Option<&str>, type_name: &str, _session: &Session) -> Result<Value> {
        let Some(text) = decode_text(data) else {
            return Ok(Value::Null);
        };
        let n = capture_floats(&BOX, BOX_PATTERN, text, type_name)?;
        Ok(Value::Box(PgBox {
            high: Point::new(n[0], n[1]),
            low: Point::new(n[2], n[3]),
        }))
    }

    fn encode_plain(
        &self,
        value: &Value,
        type_name: &str,
        _session: &Session,
    ) -> Result<Option<String>> {
        match value {
            Value::Null => Ok(None),
            Value::Box(b) => Ok(Some(format!(
                "{},{}",
                format_point(&b.high),
                format_point(&b.low)
            ))),
            other => Err(mismatch(type_name, other)),
        }
    }
}

/// `[(x1,y1),(x2,y2)]`
pub struct SegmentCodec;

impl Codec for SegmentCodec {
    fn decode(&self, data: Option<&str>, type_name: &str, _session: &Session) -> Result<Value> {
        let Some(text) = decode_text(data) else {
            return Ok(Value::Null);
        };
        let n = capture_floats(&SEGMENT, SEGMENT_PATTERN, text, type_name)?;
        Ok(Value::Segment(Segment {
            start: Point::new(n[0], n[1]),
            end: Point::new(n[2], n[3]),
        }))
    }

    fn encode_plain(
        &self,
        value: &Value,
        type_name: &str,
        _session: &Session,
    ) -> Result<Option<String>> {
        match value {
            Value::Null => Ok(None),
            Value::Segment(s) => Ok(Some(format!(
                "[{},{}]",
                format_point(&s.start),
                format_point(&s.end)
            ))),
            other => Err(mismatch(type_name, other)),
        }
    }
}

fn default_encode(
    codec: &dyn Codec,
    value: &Value,
    type_name: &str,
    session: &Session,
) -> Result<String> {
    match codec.encode_plain(value, type_name, session)? {
        None => Ok(super::null_literal(type_name)),
        Some(text) => super::typed_literal(session, type_name, &text),
    }
}
