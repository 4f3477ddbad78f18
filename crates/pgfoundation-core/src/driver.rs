//! Transport traits and raw result types.
//!
//! - [`Driver`] - one open wire session: query, prepare, notifications, escaping
//! - [`Connector`] - opens a [`Driver`] from parsed connection parameters
//! - [`ResultSet`] - raw text-format rows for one statement
//! - [`PreparedStatement`] - server-side statement metadata
//!
//! Drivers are synchronous: every call blocks until the backend answered.
//! Any failure that is not the backend rejecting a statement must be reported
//! as a [`ConnectionError`](crate::ConnectionError).

use std::sync::Arc;

use crate::dsn::Dsn;
use crate::error::Result;
use crate::escape;
use crate::row::ColumnInfo;

/// Name and wire type of one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescription {
    pub name: String,
    pub type_oid: u32,
}

impl FieldDescription {
    pub fn new(name: impl Into<String>, type_oid: u32) -> Self {
        Self {
            name: name.into(),
            type_oid,
        }
    }
}

/// Raw result of one statement, every value in text format.
///
/// Rows are fully buffered so they can be read by index any number of times.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    columns: Arc<ColumnInfo>,
    type_oids: Vec<u32>,
    rows: Vec<Vec<Option<String>>>,
    command_tag: Option<String>,
}

impl ResultSet {
    pub fn new(
        fields: Vec<FieldDescription>,
        rows: Vec<Vec<Option<String>>>,
        command_tag: Option<String>,
    ) -> Self {
        let (names, type_oids): (Vec<String>, Vec<u32>) = fields
            .into_iter()
            .map(|field| (field.name, field.type_oid))
            .unzip();
        Self {
            columns: Arc::new(ColumnInfo::new(names)),
            type_oids,
            rows,
            command_tag,
        }
    }

    /// Result of a statement that returns no rows (`SET`, `LISTEN`, DDL).
    pub fn command(tag: impl Into<String>) -> Self {
        Self {
            command_tag: Some(tag.into()),
            ..Self::default()
        }
    }

    pub fn columns(&self) -> Arc<ColumnInfo> {
        Arc::clone(&self.columns)
    }

    pub fn column_names(&self) -> &[String] {
        self.columns.names()
    }

    pub fn field_count(&self) -> usize {
        self.columns.len()
    }

    pub fn field_name(&self, index: usize) -> Option<&str> {
        self.columns.name_at(index)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.columns.index_of(name)
    }

    pub fn type_oid(&self, index: usize) -> Option<u32> {
        self.type_oids.get(index).copied()
    }

    pub fn type_oids(&self) -> &[u32] {
        &self.type_oids
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, index: usize) -> Option<&[Option<String>]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Raw text of one cell. The outer `Option` is `None` when the position
    /// is out of range, the inner one when the value is NULL.
    pub fn value(&self, row: usize, column: usize) -> Option<Option<&str>> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(|cell| cell.as_deref())
    }

    pub fn command_tag(&self) -> Option<&str> {
        self.command_tag.as_deref()
    }

    /// Rows affected as reported by the command tag (`INSERT 0 3` → 3).
    pub fn affected_rows(&self) -> u64 {
        self.command_tag
            .as_deref()
            .and_then(|tag| tag.rsplit(' ').next())
            .and_then(|n| n.parse().ok())
            .unwrap_or(0)
    }
}

/// Server-side prepared statement as described by the backend.
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    name: String,
    sql: String,
    param_types: Vec<u32>,
    fields: Vec<FieldDescription>,
}

impl PreparedStatement {
    /// This is typically called by the driver, not by users directly.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        sql: impl Into<String>,
        param_types: Vec<u32>,
        fields: Vec<FieldDescription>,
    ) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
            param_types,
            fields,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn param_count(&self) -> usize {
        self.param_types.len()
    }

    pub fn param_types(&self) -> &[u32] {
        &self.param_types
    }

    pub fn fields(&self) -> &[FieldDescription] {
        &self.fields
    }
}

/// Asynchronous notification delivered by `NOTIFY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub channel: String,
    pub payload: String,
    pub process_id: i32,
}

/// One open wire session with the backend.
pub trait Driver {
    /// Run one or more `;`-separated statements with the simple query
    /// protocol, returning one result per statement.
    fn simple_query(&mut self, sql: &str) -> Result<Vec<ResultSet>>;

    /// Run one statement with `$n` placeholders. Parameters are already in
    /// text format; `None` sends NULL.
    fn query_params(&mut self, sql: &str, params: &[Option<String>]) -> Result<ResultSet>;

    /// Create a named server-side prepared statement.
    fn prepare(&mut self, name: &str, sql: &str) -> Result<PreparedStatement>;

    /// Execute a statement created by [`Driver::prepare`].
    fn execute_prepared(&mut self, name: &str, params: &[Option<String>]) -> Result<ResultSet>;

    /// Collect notifications received since the last call.
    fn poll_notifications(&mut self) -> Result<Vec<Notification>>;

    /// Whether the wire session is still usable.
    fn is_ok(&self) -> bool;

    /// Terminate the wire session. Calling it twice is harmless.
    fn close(&mut self) -> Result<()>;

    /// Wire type name of a built-in type, when the driver knows it without
    /// asking the server.
    fn builtin_type_name(&self, _oid: u32) -> Option<&'static str> {
        None
    }

    fn escape_identifier(&self, name: &str) -> String {
        escape::escape_identifier(name)
    }

    fn escape_literal(&self, text: &str) -> String {
        escape::escape_literal(text)
    }

    fn escape_bytea(&self, data: &[u8]) -> String {
        escape::escape_bytea(data)
    }

    fn unescape_bytea(&self, text: &str) -> Result<Vec<u8>> {
        escape::unescape_bytea(text)
    }
}

/// Opens drivers. The session keeps one connector and calls it at most once
/// per connection.
pub trait Connector {
    fn connect(&self, dsn: &Dsn) -> Result<Box<dyn Driver>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_set_access() {
        let rs = ResultSet::new(
            vec![FieldDescription::new("a", 23), FieldDescription::new("b", 25)],
            vec![
                vec![Some("1".into()), None],
                vec![Some("2".into()), Some("x".into())],
            ],
            Some("SELECT 2".into()),
        );
        assert_eq!(rs.field_count(), 2);
        assert_eq!(rs.row_count(), 2);
        assert_eq!(rs.field_name(1), Some("b"));
        assert_eq!(rs.column_names(), ["a", "b"]);
        assert_eq!(rs.field_index("a"), Some(0));
        assert_eq!(rs.type_oid(0), Some(23));
        assert_eq!(rs.value(0, 1), Some(None));
        assert_eq!(rs.value(1, 1), Some(Some("x")));
        assert_eq!(rs.value(5, 0), None);
        assert_eq!(rs.affected_rows(), 2);
    }

    #[test]
    fn test_command_result() {
        let rs = ResultSet::command("INSERT 0 3");
        assert_eq!(rs.field_count(), 0);
        assert_eq!(rs.row_count(), 0);
        assert_eq!(rs.affected_rows(), 3);
        assert_eq!(ResultSet::command("SET").affected_rows(), 0);
    }

    #[test]
    fn test_prepared_statement_metadata() {
        let stmt = PreparedStatement::new("s1", "SELECT $1", vec![23], vec![]);
        assert_eq!(stmt.name(), "s1");
        assert_eq!(stmt.param_count(), 1);
        assert!(stmt.fields().is_empty());
    }
}
