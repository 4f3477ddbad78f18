//! Array codec shared by every array type.
//!
//! The session routes `_int4` and `int4[]` here with the element type
//! (`int4`) as `type_name`; each element then goes through the element
//! type's own converter. Nested braces give nested `Value::Array`s.

use pgfoundation_core::error::{Error, Result};
use pgfoundation_core::Value;

use super::{Codec, mismatch, null_literal};
use crate::session::Session;

pub struct ArrayCodec;

/// Parsed array text before the elements are decoded.
#[derive(Debug, PartialEq)]
enum Node {
    Array(Vec<Node>),
    Item(Option<String>),
}

impl Codec for ArrayCodec {
    fn decode(&self, data: Option<&str>, type_name: &str, session: &Session) -> Result<Value> {
        let Some(text) = data else {
            return Ok(Value::Null);
        };
        let node = parse_array(text, delimiter(type_name))
            .ok_or_else(|| Error::unparsable(&array_type(type_name), text))?;
        decode_node(node, type_name, session)
    }

    /// `ARRAY[...]::<type>[]`, elements rendered by the element converter.
    fn encode(&self, value: &Value, type_name: &str, session: &Session) -> Result<String> {
        match value {
            Value::Null => Ok(null_literal(&array_type(type_name))),
            Value::Array(items) => Ok(format!(
                "{}::{}",
                encode_constructor(items, type_name, session)?,
                array_type(type_name)
            )),
            other => Err(mismatch(&array_type(type_name), other)),
        }
    }

    /// `{...}` text, elements quoted where the array grammar requires it.
    fn encode_plain(
        &self,
        value: &Value,
        type_name: &str,
        session: &Session,
    ) -> Result<Option<String>> {
        match value {
            Value::Null => Ok(None),
            Value::Array(items) => encode_text(items, type_name, delimiter(type_name), session).map(Some),
            other => Err(mismatch(&array_type(type_name), other)),
        }
    }
}

fn array_type(element_type: &str) -> String {
    format!("{element_type}[]")
}

/// `box` is the one built-in type whose array delimiter is not a comma.
fn delimiter(element_type: &str) -> char {
    if element_type == "box" { ';' } else { ',' }
}

fn decode_node(node: Node, element_type: &str, session: &Session) -> Result<Value> {
    match node {
        Node::Item(None) => Ok(Value::Null),
        Node::Item(Some(text)) => session.decode_value(Some(&text), element_type),
        Node::Array(children) => children
            .into_iter()
            .map(|child| decode_node(child, element_type, session))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
    }
}

fn encode_constructor(items: &[Value], element_type: &str, session: &Session) -> Result<String> {
    let elements = items
        .iter()
        .map(|item| match item {
            Value::Array(nested) => encode_constructor(nested, element_type, session),
            other => session.encode_value(other, element_type),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("ARRAY[{}]", elements.join(",")))
}

fn encode_text(
    items: &[Value],
    element_type: &str,
    delimiter: char,
    session: &Session,
) -> Result<String> {
    let mut out = String::from("{");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(delimiter);
        }
        match item {
            Value::Array(nested) => out.push_str(&encode_text(nested, element_type, delimiter, session)?),
            other => match session.encode_plain_value(other, element_type)? {
                None => out.push_str("NULL"),
                Some(text) => push_element(&mut out, &text, delimiter),
            },
        }
    }
    out.push('}');
    Ok(out)
}

fn push_element(out: &mut String, text: &str, delimiter: char) {
    let needs_quotes = text.is_empty()
        || text.eq_ignore_ascii_case("NULL")
        || text
            .chars()
            .any(|c| c == delimiter || c.is_whitespace() || matches!(c, '{' | '}' | '"' | '\\'));
    if !needs_quotes {
        out.push_str(text);
        return;
    }
    out.push('"');
    for c in text.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

/// Parse array text such as `{1,NULL,"a b"}` or `[0:1]={{1},{2}}`.
fn parse_array(text: &str, delimiter: char) -> Option<Node> {
    let mut body = text.trim();
    if body.starts_with('[') {
        // explicit bounds: `[1:2][1:3]={...}`
        let (_, rest) = body.split_once('=')?;
        body = rest.trim_start();
    }
    let mut parser = Parser {
        chars: body.chars().peekable(),
        delimiter,
    };
    let node = parser.array()?;
    parser.skip_whitespace();
    parser.chars.peek().is_none().then_some(node)
}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    delimiter: char,
}

impl Parser<'_> {
    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    fn array(&mut self) -> Option<Node> {
        if self.chars.next()? != '{' {
            return None;
        }
        let mut children = Vec::new();
        self.skip_whitespace();
        if self.chars.next_if_eq(&'}').is_some() {
            return Some(Node::Array(children));
        }
        loop {
            self.skip_whitespace();
            let child = match self.chars.peek()? {
                '{' => self.array()?,
                '"' => Node::Item(Some(self.quoted()?)),
                _ => self.bare()?,
            };
            children.push(child);
            self.skip_whitespace();
            match self.chars.next()? {
                '}' => return Some(Node::Array(children)),
                c if c == self.delimiter => {}
                _ => return None,
            }
        }
    }

    fn quoted(&mut self) -> Option<String> {
        self.chars.next();
        let mut out = String::new();
        loop {
            match self.chars.next()? {
                '\\' => out.push(self.chars.next()?),
                '"' => return Some(out),
                c => out.push(c),
            }
        }
    }

    fn bare(&mut self) -> Option<Node> {
        let mut out = String::new();
        let delimiter = self.delimiter;
        while let Some(c) = self
            .chars
            .next_if(|&c| c != delimiter && !matches!(c, '{' | '}' | '"'))
        {
            if c == '\\' {
                out.push(self.chars.next()?);
            } else {
                out.push(c);
            }
        }
        let item = out.trim_end();
        if item.is_empty() {
            return None;
        }
        if item.eq_ignore_ascii_case("NULL") {
            return Some(Node::Item(None));
        }
        Some(Node::Item(Some(item.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockConnector, default_session};
    use pgfoundation_core::{PgBox, Point};

    fn item(text: &str) -> Node {
        Node::Item(Some(text.to_string()))
    }

    #[test]
    fn test_parse_grammar() {
        assert_eq!(parse_array("{}", ','), Some(Node::Array(vec![])));
        assert_eq!(
            parse_array(r#"{1, NULL ,"NULL","a \"b\"",null}"#, ','),
            Some(Node::Array(vec![
                item("1"),
                Node::Item(None),
                item("NULL"),
                item("a \"b\""),
                Node::Item(None),
            ]))
        );
        assert_eq!(
            parse_array("[0:1]={{1},{2}}", ','),
            Some(Node::Array(vec![
                Node::Array(vec![item("1")]),
                Node::Array(vec![item("2")]),
            ]))
        );
        assert_eq!(
            parse_array("{(1,1),(0,0);(2,2),(1,1)}", ';'),
            Some(Node::Array(vec![item("(1,1),(0,0)"), item("(2,2),(1,1)")]))
        );
        for bad in ["", "{1,2", "1,2}", "{1,,2}", "{1}x", "{\"a}"] {
            assert_eq!(parse_array(bad, ','), None, "{bad}");
        }
    }

    #[test]
    fn test_decode_elements_through_element_converter() {
        let session = default_session(&MockConnector::new());
        assert_eq!(
            ArrayCodec.decode(Some("{1,2,NULL}"), "int4", &session).unwrap(),
            Value::Array(vec![Value::Int(1), Value::Int(2), Value::Null])
        );
        assert_eq!(
            ArrayCodec.decode(Some("{{t,f},{f,t}}"), "bool", &session).unwrap(),
            Value::Array(vec![
                Value::Array(vec![Value::Bool(true), Value::Bool(false)]),
                Value::Array(vec![Value::Bool(false), Value::Bool(true)]),
            ])
        );
        assert_eq!(
            ArrayCodec.decode(Some("{(3,4),(1,2)}"), "box", &session).unwrap(),
            Value::Array(vec![Value::Box(PgBox {
                high: Point::new(3.0, 4.0),
                low: Point::new(1.0, 2.0),
            })])
        );
        assert_eq!(ArrayCodec.decode(None, "int4", &session).unwrap(), Value::Null);
        assert!(matches!(
            ArrayCodec.decode(Some("{1,x}"), "int4", &session),
            Err(Error::Converter(_))
        ));
    }

    #[test]
    fn test_encode_literal() {
        let session = default_session(&MockConnector::new());
        let value = Value::Array(vec![Value::Int(1), Value::Null]);
        assert_eq!(
            ArrayCodec.encode(&value, "int4", &session).unwrap(),
            "ARRAY[int4 '1',NULL::int4]::int4[]"
        );
        let nested = Value::Array(vec![Value::Array(vec![Value::Int(1)]), Value::Array(vec![Value::Int(2)])]);
        assert_eq!(
            ArrayCodec.encode(&nested, "int4", &session).unwrap(),
            "ARRAY[ARRAY[int4 '1'],ARRAY[int4 '2']]::int4[]"
        );
        assert_eq!(ArrayCodec.encode(&Value::Null, "text", &session).unwrap(), "NULL::text[]");
    }

    #[test]
    fn test_encode_plain_quotes_where_needed() {
        let session = default_session(&MockConnector::new());
        let value = Value::Array(vec![
            Value::Text("plain".into()),
            Value::Text(String::new()),
            Value::Text("NULL".into()),
            Value::Text("a,b".into()),
            Value::Text("say \"hi\"".into()),
            Value::Null,
        ]);
        let text = ArrayCodec.encode_plain(&value, "text", &session).unwrap().unwrap();
        assert_eq!(text, r#"{plain,"","NULL","a,b","say \"hi\"",NULL}"#);
        assert_eq!(ArrayCodec.decode(Some(&text), "text", &session).unwrap(), value);
    }
}
