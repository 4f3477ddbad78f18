//! Lazy conversion of a buffered result set.
//!
//! A [`ResultIterator`] owns one [`ResultSet`] and converts a row only when
//! it is read. Wire type names are resolved once at construction; array
//! types go through the array codec with their element type, and types with
//! no converter are read as `text`.

use std::sync::Arc;

use pgfoundation_core::error::{Error, FoundationErrorKind, Result};
use pgfoundation_core::{ColumnInfo, ResultSet, Row, Value};

use crate::session::Session;

const FALLBACK_TYPE: &str = "text";

pub struct ResultIterator {
    result: ResultSet,
    session: Session,
    /// Wire type used to decode each column.
    decode_types: Vec<String>,
    /// Wire type name reported for each column.
    type_names: Vec<String>,
    /// Index of the next row `next()` hands out.
    cursor: usize,
}

impl std::fmt::Debug for ResultIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultIterator")
            .field("fields", &self.field_names())
            .field("types", &self.type_names)
            .field("len", &self.len())
            .field("position", &self.position())
            .finish_non_exhaustive()
    }
}

impl ResultIterator {
    pub fn new(result: ResultSet, session: &Session) -> Result<Self> {
        let type_names = session.connection()?.resolve_type_names(result.type_oids())?;
        let decode_types = type_names
            .iter()
            .map(|name| {
                if session.has_converter_for_type(name) {
                    name.clone()
                } else {
                    tracing::trace!(wire_type = %name, "No converter, reading as text");
                    FALLBACK_TYPE.to_string()
                }
            })
            .collect();
        Ok(Self {
            result,
            session: session.clone(),
            decode_types,
            type_names,
            cursor: 0,
        })
    }

    /// Convert row `index`.
    pub fn get(&self, index: usize) -> Result<Row> {
        let raw = self.result.row(index).ok_or_else(|| {
            Error::foundation(
                FoundationErrorKind::Configuration,
                format!("row index {index} out of range ({} rows)", self.len()),
            )
        })?;
        let values = raw
            .iter()
            .zip(&self.decode_types)
            .map(|(cell, wire_type)| self.session.decode_value(cell.as_deref(), wire_type))
            .collect::<Result<Vec<_>>>()?;
        Ok(Row::with_columns(self.columns(), values))
    }

    /// Convert one column across every row.
    pub fn slice(&self, field: &str) -> Result<Vec<Value>> {
        let column = self.result.field_index(field).ok_or_else(|| {
            Error::foundation(
                FoundationErrorKind::Configuration,
                format!(
                    "no field '{field}' in result (fields: {})",
                    self.field_names().join(", ")
                ),
            )
        })?;
        let wire_type = &self.decode_types[column];
        (0..self.len())
            .map(|row| {
                let cell = self.result.value(row, column).flatten();
                self.session.decode_value(cell, wire_type)
            })
            .collect()
    }

    /// Every row, converted. The cursor is left untouched.
    pub fn extract(&self) -> Result<Vec<Row>> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }

    /// Number of rows in the result.
    pub fn len(&self) -> usize {
        self.result.row_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the row last returned by `next()`, `0` before the first
    /// read.
    pub fn position(&self) -> usize {
        self.cursor.saturating_sub(1)
    }

    pub fn is_first(&self) -> bool {
        self.position() == 0
    }

    pub fn is_last(&self) -> bool {
        !self.is_empty() && self.position() == self.len() - 1
    }

    /// Move the cursor back before the first row. Rows are not fetched again.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.result.column_names().iter().map(String::as_str).collect()
    }

    /// Wire type name of `field` as reported by the server.
    pub fn field_type(&self, field: &str) -> Option<&str> {
        let column = self.result.field_index(field)?;
        self.type_names.get(column).map(String::as_str)
    }

    pub fn command_tag(&self) -> Option<&str> {
        self.result.command_tag()
    }

    pub fn affected_rows(&self) -> u64 {
        self.result.affected_rows()
    }

    fn columns(&self) -> Arc<ColumnInfo> {
        self.result.columns()
    }
}

impl Iterator for ResultIterator {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.result.row_count() {
            return None;
        }
        let row = self.get(self.cursor);
        self.cursor += 1;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.result.row_count().saturating_sub(self.cursor);
        (remaining, Some(remaining))
    }
}
