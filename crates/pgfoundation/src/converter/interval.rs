//! `interval` in ISO 8601 (`P1Y2M3DT4H5M6S`) and postgres
//! (`1 year 2 mons 3 days 04:05:06`) output styles.
//!
//! Months, days and microseconds stay separate the way the server stores
//! them; `1 mon` and `30 days` are different values.

use pgfoundation_core::error::{Error, Result};
use pgfoundation_core::{Interval, Value};

use super::{Codec, mismatch};
use crate::session::Session;

const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_MINUTE: i64 = 60 * MICROS_PER_SECOND;
const MICROS_PER_HOUR: i64 = 60 * MICROS_PER_MINUTE;

pub struct IntervalCodec;

impl Codec for IntervalCodec {
    fn decode(&self, data: Option<&str>, type_name: &str, _session: &Session) -> Result<Value> {
        let Some(text) = data.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(Value::Null);
        };
        let parsed = if text.starts_with('P') {
            parse_iso(text)
        } else {
            parse_postgres(text)
        };
        parsed
            .map(Value::Interval)
            .ok_or_else(|| Error::unparsable(type_name, text))
    }

    /// Always ISO 8601, which the server accepts whatever its output style.
    fn encode_plain(
        &self,
        value: &Value,
        type_name: &str,
        _session: &Session,
    ) -> Result<Option<String>> {
        match value {
            Value::Null => Ok(None),
            Value::Interval(interval) => Ok(Some(format_iso(interval))),
            other => Err(mismatch(type_name, other)),
        }
    }
}

fn format_iso(interval: &Interval) -> String {
    if interval.is_zero() {
        return "PT0S".to_string();
    }
    let mut out = String::from("P");
    let years = interval.months / 12;
    let months = interval.months % 12;
    if years != 0 {
        out.push_str(&format!("{years}Y"));
    }
    if months != 0 {
        out.push_str(&format!("{months}M"));
    }
    if interval.days != 0 {
        out.push_str(&format!("{}D", interval.days));
    }

    let micros = interval.microseconds;
    if micros != 0 {
        out.push('T');
        let hours = micros / MICROS_PER_HOUR;
        let minutes = (micros % MICROS_PER_HOUR) / MICROS_PER_MINUTE;
        let seconds = micros % MICROS_PER_MINUTE;
        if hours != 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes != 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if seconds != 0 {
            out.push_str(&format_seconds(seconds));
            out.push('S');
        }
    }
    out
}

/// `-1500000` → `-1.5`
fn format_seconds(micros: i64) -> String {
    let sign = if micros < 0 { "-" } else { "" };
    let abs = micros.unsigned_abs();
    let whole = abs / MICROS_PER_SECOND.unsigned_abs();
    let fraction = abs % MICROS_PER_SECOND.unsigned_abs();
    if fraction == 0 {
        format!("{sign}{whole}")
    } else {
        let digits = format!("{fraction:06}");
        format!("{sign}{whole}.{}", digits.trim_end_matches('0'))
    }
}

/// Decimal text scaled to millionths: `"-6.5"` → `-6_500_000`.
fn parse_scaled(text: &str) -> Option<i64> {
    let (negative, unsigned) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut digits: String = fraction.chars().take(6).collect();
    while digits.len() < 6 {
        digits.push('0');
    }
    let fraction: i64 = digits.parse().ok()?;
    let value = whole.checked_mul(MICROS_PER_SECOND)?.checked_add(fraction)?;
    Some(if negative { -value } else { value })
}

fn whole_units(scaled: i64) -> Option<i64> {
    (scaled % MICROS_PER_SECOND == 0).then_some(scaled / MICROS_PER_SECOND)
}

#[derive(Default)]
struct Accumulator {
    months: i64,
    days: i64,
    micros: i64,
}

impl Accumulator {
    fn finish(self) -> Option<Interval> {
        Some(Interval::new(
            i32::try_from(self.months).ok()?,
            i32::try_from(self.days).ok()?,
            self.micros,
        ))
    }
}

fn parse_iso(text: &str) -> Option<Interval> {
    let body = text.strip_prefix('P')?;
    if body.is_empty() {
        return None;
    }
    let (date_part, time_part) = match body.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (body, None),
    };

    let mut acc = Accumulator::default();
    for (number, designator) in iso_components(date_part)? {
        let n = whole_units(parse_scaled(number)?)?;
        match designator {
            'Y' => acc.months += n.checked_mul(12)?,
            'M' => acc.months += n,
            'W' => acc.days += n.checked_mul(7)?,
            'D' => acc.days += n,
            _ => return None,
        }
    }
    if let Some(time_part) = time_part {
        let components = iso_components(time_part)?;
        if components.is_empty() {
            return None;
        }
        for (number, designator) in components {
            let scaled = parse_scaled(number)?;
            let micros = match designator {
                'H' => scaled.checked_mul(3600)?,
                'M' => scaled.checked_mul(60)?,
                'S' => scaled,
                _ => return None,
            };
            acc.micros = acc.micros.checked_add(micros)?;
        }
    }
    acc.finish()
}

/// Split `1Y-2M3D` into `[("1", 'Y'), ("-2", 'M'), ("3", 'D')]`.
fn iso_components(part: &str) -> Option<Vec<(&str, char)>> {
    let mut components = Vec::new();
    let mut start = 0;
    for (i, c) in part.char_indices() {
        if c.is_ascii_alphabetic() {
            if i == start {
                return None;
            }
            components.push((&part[start..i], c));
            start = i + c.len_utf8();
        }
    }
    (start == part.len()).then_some(components)
}

fn parse_postgres(text: &str) -> Option<Interval> {
    let mut acc = Accumulator::default();
    let mut ago = false;
    let mut tokens = text.split_whitespace().peekable();

    while let Some(token) = tokens.next() {
        if token == "@" {
            continue;
        }
        if token == "ago" {
            ago = true;
            continue;
        }
        if token.contains(':') {
            acc.micros = acc.micros.checked_add(parse_clock(token)?)?;
            continue;
        }

        let scaled = parse_scaled(token)?;
        let unit = tokens.next()?.to_ascii_lowercase();
        if unit.starts_with("year") {
            acc.months += whole_units(scaled)?.checked_mul(12)?;
        } else if unit.starts_with("mon") {
            acc.months += whole_units(scaled)?;
        } else if unit.starts_with("week") {
            acc.days += whole_units(scaled)?.checked_mul(7)?;
        } else if unit.starts_with("day") {
            acc.days += whole_units(scaled)?;
        } else if unit.starts_with("hour") {
            acc.micros = acc.micros.checked_add(scaled.checked_mul(3600)?)?;
        } else if unit.starts_with("min") {
            acc.micros = acc.micros.checked_add(scaled.checked_mul(60)?)?;
        } else if unit.starts_with("sec") {
            acc.micros = acc.micros.checked_add(scaled)?;
        } else {
            return None;
        }
    }

    if ago {
        acc.months = -acc.months;
        acc.days = -acc.days;
        acc.micros = -acc.micros;
    }
    acc.finish()
}

/// `[+-]HH:MM[:SS[.ffffff]]` in microseconds.
fn parse_clock(token: &str) -> Option<i64> {
    let (negative, unsigned) = match token.as_bytes().first()? {
        b'-' => (true, &token[1..]),
        b'+' => (false, &token[1..]),
        _ => (false, token),
    };
    let mut parts = unsigned.split(':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds = match parts.next() {
        Some(s) => parse_scaled(s)?,
        None => 0,
    };
    if parts.next().is_some() || hours < 0 || minutes < 0 || seconds < 0 {
        return None;
    }
    let micros = hours
        .checked_mul(MICROS_PER_HOUR)?
        .checked_add(minutes * MICROS_PER_MINUTE)?
        .checked_add(seconds)?;
    Some(if negative { -micros } else { micros })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockConnector, default_session};

    fn decode(text: &str) -> Value {
        let session = default_session(&MockConnector::new());
        IntervalCodec.decode(Some(text), "interval", &session).unwrap()
    }

    #[test]
    fn test_iso_style() {
        assert_eq!(
            decode("P1Y2M3DT4H5M6.5S"),
            Value::Interval(Interval::new(14, 3, 4 * MICROS_PER_HOUR + 5 * MICROS_PER_MINUTE + 6_500_000))
        );
        assert_eq!(decode("PT0S"), Value::Interval(Interval::default()));
        assert_eq!(
            decode("P-1Y-2M"),
            Value::Interval(Interval::new(-14, 0, 0))
        );
        assert_eq!(decode("P2W"), Value::Interval(Interval::new(0, 14, 0)));
    }

    #[test]
    fn test_postgres_style() {
        assert_eq!(
            decode("1 year 2 mons 3 days 04:05:06.5"),
            Value::Interval(Interval::new(14, 3, 4 * MICROS_PER_HOUR + 5 * MICROS_PER_MINUTE + 6_500_000))
        );
        assert_eq!(
            decode("-1 days +02:03:00"),
            Value::Interval(Interval::new(0, -1, 2 * MICROS_PER_HOUR + 3 * MICROS_PER_MINUTE))
        );
        assert_eq!(decode("-00:00:01"), Value::Interval(Interval::new(0, 0, -MICROS_PER_SECOND)));
        assert_eq!(decode("@ 1 hour ago"), Value::Interval(Interval::new(0, 0, -MICROS_PER_HOUR)));
    }

    #[test]
    fn test_format_and_round_trip() {
        let session = default_session(&MockConnector::new());
        let cases = [
            (Interval::new(14, 3, 4 * MICROS_PER_HOUR + 1_500_000), "P1Y2M3DT4H1.5S"),
            (Interval::new(0, 0, -1_500_000), "PT-1.5S"),
            (Interval::new(-1, 0, 0), "P-1M"),
            (Interval::default(), "PT0S"),
        ];
        for (interval, text) in cases {
            let value = Value::Interval(interval);
            let plain = IntervalCodec.encode_plain(&value, "interval", &session).unwrap();
            assert_eq!(plain.as_deref(), Some(text));
            assert_eq!(IntervalCodec.decode(plain.as_deref(), "interval", &session).unwrap(), value);
        }
        assert_eq!(
            IntervalCodec.encode(&Value::Interval(Interval::new(0, 1, 0)), "interval", &session).unwrap(),
            "interval 'P1D'"
        );
    }

    #[test]
    fn test_garbage_is_a_converter_error() {
        let session = default_session(&MockConnector::new());
        for text in ["P", "PT", "P1X", "3 fortnights", "1:xx:00"] {
            assert!(
                matches!(IntervalCodec.decode(Some(text), "interval", &session), Err(Error::Converter(_))),
                "{text}"
            );
        }
        assert_eq!(IntervalCodec.decode(Some(""), "interval", &session).unwrap(), Value::Null);
    }
}
