//! Core types and traits for pgfoundation.
//!
//! This crate provides the pieces shared by the session layer and the wire
//! driver:
//!
//! - `Error` taxonomy (connection, SQL, converter, foundation)
//! - `Value` host representation of PostgreSQL values
//! - `Driver` and `Connector` traits for the transport
//! - `ResultSet`, `ColumnInfo` and `Row` result types
//! - `Dsn` connection string parsing
//! - escaping primitives for identifiers, literals and bytea

pub mod driver;
pub mod dsn;
pub mod error;
pub mod escape;
pub mod row;
pub mod value;

pub use driver::{Connector, Driver, FieldDescription, Notification, PreparedStatement, ResultSet};
pub use dsn::{DSN_SCHEME, Dsn, Host};
pub use error::{
    ConnectionError, ConnectionErrorKind, ConverterError, Error, FoundationError,
    FoundationErrorKind, Result, SqlError,
};
pub use escape::{escape_bytea, escape_identifier, escape_literal, unescape_bytea};
pub use row::{ColumnInfo, Row};
pub use value::{Circle, Interval, PgBox, Point, Range, Segment, Value};
