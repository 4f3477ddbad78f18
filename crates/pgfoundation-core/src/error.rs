//! Error types for pgfoundation operations.
//!
//! Every failure surfaces as one of four categories so callers can tell a
//! broken link ([`ConnectionError`]) from a rejected statement ([`SqlError`]),
//! a value that does not fit its wire type ([`ConverterError`]) and a wiring
//! mistake in the session itself ([`FoundationError`]).

use std::fmt;

/// The primary error type for all pgfoundation operations.
#[derive(Debug)]
pub enum Error {
    /// The wire handle is absent, bad or closed, or a non-SQL send failed
    Connection(ConnectionError),
    /// The backend rejected a statement
    Sql(SqlError),
    /// A value could not be decoded from or encoded to its wire type
    Converter(ConverterError),
    /// Session wiring failure (missing pooler, unknown client, duplicates)
    Foundation(FoundationError),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Connection parameters could not be parsed
    Dsn,
    /// Failed to establish connection
    Connect,
    /// Connection refused
    Refused,
    /// Authentication failed
    Authentication,
    /// SSL/TLS negotiation failed
    Ssl,
    /// Connection lost during operation
    Disconnected,
    /// The backend sent something the driver cannot interpret
    Protocol,
    /// The connection is in the BAD state
    Bad,
    /// The connection (or its session) was shut down
    Closed,
}

#[derive(Debug, Clone, Default)]
pub struct SqlError {
    pub sqlstate: Option<String>,
    pub severity: Option<String>,
    pub message: String,
    pub detail: Option<String>,
    pub hint: Option<String>,
    pub position: Option<usize>,
    pub sql: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConverterError {
    pub type_name: String,
    pub value: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct FoundationError {
    pub kind: FoundationErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoundationErrorKind {
    /// No pooler is registered for a client type
    MissingPooler,
    /// A pooler cannot resolve the identifier it was given
    UnknownClient,
    /// Registration collides with an existing entry
    Duplicate,
    /// A client was used before being registered into a session
    NotRegistered,
    /// A client of an unexpected concrete type was found
    ClientType,
    /// Missing or invalid configuration
    Configuration,
    /// The operation is not supported by this component
    Unsupported,
}

/// Longest SQL excerpt kept in error messages.
const SQL_EXCERPT_LEN: usize = 120;

fn excerpt(text: &str) -> String {
    if text.chars().count() <= SQL_EXCERPT_LEN {
        text.to_string()
    } else {
        let cut: String = text.chars().take(SQL_EXCERPT_LEN).collect();
        format!("{cut}...")
    }
}

impl ConnectionError {
    pub fn new(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl SqlError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Attach the statement that failed.
    pub fn with_sql(mut self, sql: &str) -> Self {
        self.sql = Some(excerpt(sql));
        self
    }

    /// Is this a unique constraint violation?
    pub fn is_unique_violation(&self) -> bool {
        self.sqlstate.as_deref() == Some("23505")
    }

    /// Is this a foreign key violation?
    pub fn is_foreign_key_violation(&self) -> bool {
        self.sqlstate.as_deref() == Some("23503")
    }

    /// Is this a syntax error or access rule violation (class 42)?
    pub fn is_syntax_error(&self) -> bool {
        self.sqlstate
            .as_deref()
            .is_some_and(|code| code.starts_with("42"))
    }
}

impl ConverterError {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            value: None,
            message: message.into(),
        }
    }

    /// Record the wire text or host value that could not be converted.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(excerpt(&value.into()));
        self
    }
}

impl FoundationError {
    pub fn new(kind: FoundationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl Error {
    pub fn connection(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Error::Connection(ConnectionError::new(kind, message))
    }

    pub fn converter(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Converter(ConverterError::new(type_name, message))
    }

    /// Converter error carrying the offending text.
    pub fn unparsable(type_name: &str, text: &str) -> Self {
        Error::Converter(
            ConverterError::new(type_name, format!("cannot parse '{}' as {}", excerpt(text), type_name))
                .with_value(text),
        )
    }

    pub fn foundation(kind: FoundationErrorKind, message: impl Into<String>) -> Self {
        Error::Foundation(FoundationError::new(kind, message))
    }

    /// Is this a connection error that likely requires a new connection?
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Get SQLSTATE if available (e.g., "23505" for unique violation)
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Sql(e) => e.sqlstate.as_deref(),
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Sql(e) => e.sql.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e),
            Error::Sql(e) => write!(f, "SQL error: {}", e),
            Error::Converter(e) => write!(f, "Converter error: {}", e),
            Error::Foundation(e) => write!(f, "Foundation error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for SqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(severity) = &self.severity {
            write!(f, "{}: ", severity)?;
        }
        write!(f, "{}", self.message)?;
        if let Some(sqlstate) = &self.sqlstate {
            write!(f, " (SQLSTATE {})", sqlstate)?;
        }
        if let Some(detail) = &self.detail {
            write!(f, "\nDETAIL: {}", detail)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\nHINT: {}", hint)?;
        }
        if let Some(sql) = &self.sql {
            write!(f, "\nSQL: {}", sql)?;
        }
        Ok(())
    }
}

impl fmt::Display for ConverterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.type_name, self.message)
    }
}

impl fmt::Display for FoundationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ConnectionError {}
impl std::error::Error for SqlError {}
impl std::error::Error for ConverterError {}
impl std::error::Error for FoundationError {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::ConnectionRefused => ConnectionErrorKind::Refused,
            _ => ConnectionErrorKind::Disconnected,
        };
        Error::Connection(ConnectionError::new(kind, format!("I/O error: {}", err)).with_source(err))
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<SqlError> for Error {
    fn from(err: SqlError) -> Self {
        Error::Sql(err)
    }
}

impl From<ConverterError> for Error {
    fn from(err: ConverterError) -> Self {
        Error::Converter(err)
    }
}

impl From<FoundationError> for Error {
    fn from(err: FoundationError) -> Self {
        Error::Foundation(err)
    }
}

/// Result type alias for pgfoundation operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlstate_helpers() {
        let sql = SqlError {
            sqlstate: Some("23505".to_string()),
            severity: Some("ERROR".to_string()),
            message: "duplicate key value violates unique constraint".to_string(),
            ..SqlError::default()
        }
        .with_sql("INSERT INTO t VALUES (1)");

        assert!(sql.is_unique_violation());
        assert!(!sql.is_foreign_key_violation());
        assert!(!sql.is_syntax_error());

        let err = Error::Sql(sql);
        assert_eq!(err.sqlstate(), Some("23505"));
        assert_eq!(err.sql(), Some("INSERT INTO t VALUES (1)"));
        assert!(!err.is_connection_error());
    }

    #[test]
    fn sql_error_display_carries_context() {
        let err = Error::Sql(SqlError {
            sqlstate: Some("42601".to_string()),
            severity: Some("ERROR".to_string()),
            message: "syntax error at or near \"SELEC\"".to_string(),
            hint: Some("check the keyword".to_string()),
            ..SqlError::default()
        }
        .with_sql("SELEC 1"));

        let text = err.to_string();
        assert!(text.contains("42601"));
        assert!(text.contains("HINT: check the keyword"));
        assert!(text.contains("SQL: SELEC 1"));
    }

    #[test]
    fn long_sql_is_truncated() {
        let sql = "x".repeat(500);
        let err = SqlError::new("boom").with_sql(&sql);
        let kept = err.sql.unwrap_or_default();
        assert!(kept.ends_with("..."));
        assert_eq!(kept.len(), SQL_EXCERPT_LEN + 3);
    }

    #[test]
    fn io_errors_become_connection_errors() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe").into();
        assert!(err.is_connection_error());
        match err {
            Error::Connection(c) => assert_eq!(c.kind, ConnectionErrorKind::Disconnected),
            other => panic!("unexpected {other:?}"),
        }

        let refused: Error =
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "nope").into();
        match refused {
            Error::Connection(c) => assert_eq!(c.kind, ConnectionErrorKind::Refused),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unparsable_carries_text_and_type() {
        match Error::unparsable("int4", "abc") {
            Error::Converter(e) => {
                assert_eq!(e.type_name, "int4");
                assert_eq!(e.value.as_deref(), Some("abc"));
                assert!(e.message.contains("abc"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
