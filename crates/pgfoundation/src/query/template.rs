//! Placeholder expansion for SQL templates.
//!
//! `$*` placeholders are numbered `$1..$n` in order of appearance. A cast
//! written right after a placeholder (`$*::timestamptz`, `$2::int4[]`)
//! declares the wire type its parameter is encoded as. Quoted strings,
//! quoted identifiers and dollar-quoted bodies are copied untouched.

use pgfoundation_core::error::{Error, FoundationErrorKind, Result};
use pgfoundation_core::Value;

use crate::session::Session;

/// Highest parameter number the extended protocol can bind.
pub const MAX_PARAMETERS: usize = u16::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlTemplate {
    sql: String,
    casts: Vec<Option<String>>,
}

impl SqlTemplate {
    /// Number the placeholders of `template`. Fails when a placeholder
    /// exceeds [`MAX_PARAMETERS`].
    pub fn parse(template: &str) -> Result<Self> {
        let mut scanner = Scanner {
            input: template,
            pos: 0,
            out: String::with_capacity(template.len() + 8),
            casts: Vec::new(),
            next_auto: 0,
        };
        scanner.run()?;
        Ok(Self {
            sql: scanner.out,
            casts: scanner.casts,
        })
    }

    /// SQL with every placeholder numbered.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn param_count(&self) -> usize {
        self.casts.len()
    }

    /// Declared wire type of parameter `index` (0-based).
    pub fn cast(&self, index: usize) -> Option<&str> {
        self.casts.get(index).and_then(|c| c.as_deref())
    }

    /// Encode `params` in the standard text format, through the declared
    /// cast or the wire type the value implies.
    pub fn encode_parameters(&self, session: &Session, params: &[Value]) -> Result<Vec<Option<String>>> {
        if params.len() != self.param_count() {
            return Err(Error::foundation(
                FoundationErrorKind::Configuration,
                format!(
                    "statement expects {} parameters, got {}",
                    self.param_count(),
                    params.len()
                ),
            ));
        }
        params
            .iter()
            .enumerate()
            .map(|(i, value)| {
                if value.is_null() {
                    return Ok(None);
                }
                let wire_type = match self.cast(i) {
                    Some(cast) => cast.to_string(),
                    None => value.default_wire_type().ok_or_else(|| {
                        Error::converter(
                            value.type_name(),
                            format!(
                                "cannot infer a wire type for parameter ${} ({}); add a cast",
                                i + 1,
                                value.type_name()
                            ),
                        )
                    })?,
                };
                session.encode_plain_value(value, &wire_type)
            })
            .collect()
    }
}

struct Scanner<'a> {
    input: &'a str,
    pos: usize,
    out: String,
    casts: Vec<Option<String>>,
    next_auto: usize,
}

impl Scanner<'_> {
    fn rest(&self) -> &str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        self.out.push(c);
        Some(c)
    }

    fn run(&mut self) -> Result<()> {
        while let Some(c) = self.peek() {
            match c {
                '\'' | '"' => self.quoted(c),
                '$' => self.dollar()?,
                _ => {
                    self.bump();
                }
            }
        }
        Ok(())
    }

    /// Copy a quoted run; a doubled quote does not end it.
    fn quoted(&mut self, quote: char) {
        self.bump();
        while let Some(c) = self.bump() {
            if c == quote {
                if self.peek() == Some(quote) {
                    self.bump();
                } else {
                    return;
                }
            }
        }
    }

    fn dollar(&mut self) -> Result<()> {
        let rest = self.rest();
        if rest.starts_with("$*") {
            self.pos += 2;
            self.next_auto += 1;
            let number = check_parameter_number(self.next_auto, "$*")?;
            self.out.push_str(&format!("${number}"));
            self.placeholder(number);
            return Ok(());
        }

        let digits: String = rest[1..].chars().take_while(char::is_ascii_digit).collect();
        if !digits.is_empty() {
            let number = check_parameter_number(digits.parse().unwrap_or(usize::MAX), &digits)?;
            self.out.push('$');
            self.out.push_str(&digits);
            self.pos += 1 + digits.len();
            if number > 0 {
                self.placeholder(number);
            }
            return Ok(());
        }

        if let Some(tag) = dollar_tag(rest) {
            let tag = tag.to_string();
            self.out.push_str(&tag);
            self.pos += tag.len();
            match self.rest().find(&tag) {
                Some(end) => {
                    let body_end = self.pos + end + tag.len();
                    self.out.push_str(&self.input[self.pos..body_end]);
                    self.pos = body_end;
                }
                None => {
                    let body = &self.input[self.pos..];
                    self.out.push_str(body);
                    self.pos = self.input.len();
                }
            }
            return Ok(());
        }

        self.bump();
        Ok(())
    }

    /// Record placeholder `number`, reading a `::type` cast if one follows.
    fn placeholder(&mut self, number: usize) {
        if self.casts.len() < number {
            self.casts.resize(number, None);
        }
        let Some(after) = self.rest().strip_prefix("::") else {
            return;
        };
        let length = after
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '[' | ']')))
            .map_or(after.len(), |(i, _)| i);
        let cast = &after[..length];
        if cast.is_empty() {
            return;
        }
        let cast = normalize_type(cast);
        let slot = &mut self.casts[number - 1];
        if slot.is_none() {
            *slot = Some(cast);
        }
    }
}

fn check_parameter_number(number: usize, written: &str) -> Result<usize> {
    if number > MAX_PARAMETERS {
        return Err(Error::foundation(
            FoundationErrorKind::Configuration,
            format!("placeholder ${written} exceeds the limit of {MAX_PARAMETERS} parameters"),
        ));
    }
    Ok(number)
}

/// `$tag$` or `$$` at the start of `text`.
fn dollar_tag(text: &str) -> Option<&str> {
    let body = text.strip_prefix('$')?;
    let end = body.find('$')?;
    let tag = &body[..end];
    let valid = tag
        .chars()
        .enumerate()
        .all(|(i, c)| c == '_' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit()));
    valid.then(|| &text[..end + 2])
}

/// SQL spellings of built-in types mapped to their `typname`.
fn normalize_type(cast: &str) -> String {
    let lower = cast.to_ascii_lowercase();
    let (base, suffix) = match lower.find('[') {
        Some(i) => lower.split_at(i),
        None => (lower.as_str(), ""),
    };
    let base = match base {
        "int" | "integer" => "int4",
        "smallint" => "int2",
        "bigint" => "int8",
        "real" => "float4",
        "boolean" => "bool",
        "decimal" => "numeric",
        other => other,
    };
    format!("{base}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockConnector, default_session};
    use pgfoundation_core::Range;

    #[test]
    fn test_auto_numbering_and_casts() {
        let t = SqlTemplate::parse("select * from t where a = $* and b = $*::timestamptz and c = any($*::integer[])").unwrap();
        assert_eq!(
            t.sql(),
            "select * from t where a = $1 and b = $2::timestamptz and c = any($3::integer[])"
        );
        assert_eq!(t.param_count(), 3);
        assert_eq!(t.cast(0), None);
        assert_eq!(t.cast(1), Some("timestamptz"));
        assert_eq!(t.cast(2), Some("int4[]"));
    }

    #[test]
    fn test_numbered_placeholders() {
        let t = SqlTemplate::parse("select $2::bool, $1, $2").unwrap();
        assert_eq!(t.sql(), "select $2::bool, $1, $2");
        assert_eq!(t.param_count(), 2);
        assert_eq!(t.cast(1), Some("bool"));
    }

    #[test]
    fn test_quoted_text_untouched() {
        let t = SqlTemplate::parse(r#"select '$*', "a$*b", $$ $* $$, $fn$ it's $* $fn$, $*"#).unwrap();
        assert_eq!(t.sql(), r#"select '$*', "a$*b", $$ $* $$, $fn$ it's $* $fn$, $1"#);
        assert_eq!(t.param_count(), 1);

        let t = SqlTemplate::parse("select 'it''s $*', $*").unwrap();
        assert_eq!(t.sql(), "select 'it''s $*', $1");
    }

    #[test]
    fn test_encode_parameters() {
        let session = default_session(&MockConnector::new());
        let t = SqlTemplate::parse("select $*, $*::int8, $*, $*::int4[]").unwrap();
        let encoded = t
            .encode_parameters(
                &session,
                &[
                    Value::Bool(true),
                    Value::Int(5),
                    Value::Null,
                    Value::Array(vec![Value::Int(1), Value::Null]),
                ],
            )
            .unwrap();
        assert_eq!(
            encoded,
            vec![
                Some("t".to_string()),
                Some("5".to_string()),
                None,
                Some("{1,NULL}".to_string()),
            ]
        );
    }

    #[test]
    fn test_encode_parameter_errors() {
        let session = default_session(&MockConnector::new());
        let t = SqlTemplate::parse("select $*").unwrap();
        let err = t.encode_parameters(&session, &[]).unwrap_err();
        assert!(matches!(err, Error::Foundation(ref f) if f.kind == FoundationErrorKind::Configuration));

        let range = Value::Range(Box::new(Range::new(1, 2)));
        assert!(matches!(
            t.encode_parameters(&session, &[range.clone()]),
            Err(Error::Converter(_))
        ));
        let t = SqlTemplate::parse("select $*::int4range").unwrap();
        assert_eq!(
            t.encode_parameters(&session, &[range]).unwrap(),
            vec![Some("[1,2)".to_string())]
        );
    }

    #[test]
    fn test_placeholder_number_is_bounded() {
        let t = SqlTemplate::parse("select $65535").unwrap();
        assert_eq!(t.param_count(), 65535);

        for sql in ["select $65536", "select $4000000000", "select $999999999999999999999"] {
            let err = SqlTemplate::parse(sql).unwrap_err();
            assert!(
                matches!(err, Error::Foundation(ref f) if f.kind == FoundationErrorKind::Configuration),
                "{sql}"
            );
        }

        // $0 binds nothing
        let t = SqlTemplate::parse("select $0").unwrap();
        assert_eq!(t.param_count(), 0);
    }
}
