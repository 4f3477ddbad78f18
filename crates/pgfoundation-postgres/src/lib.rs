//! Synchronous PostgreSQL wire driver for pgfoundation.
//!
//! This crate implements protocol 3.0 directly over `std::net` sockets and
//! plugs into the session layer through the `Driver` and `Connector` traits
//! of `pgfoundation-core`. It provides:
//!
//! - Message framing and parsing
//! - Authentication (cleartext, MD5, SCRAM-SHA-256)
//! - Simple and extended query protocols, named prepared statements
//! - LISTEN/NOTIFY notification buffering
//! - Optional TLS through rustls (feature `tls`)
//! - Built-in OID to type name table
//!
//! Values travel in text format in both directions; converting them is the
//! session layer's job.
//!
//! # Example
//!
//! ```rust,ignore
//! use pgfoundation_postgres::{PgConfig, PgConnection};
//!
//! let config = PgConfig::new("localhost", "postgres", "mydb").port(5432);
//! let mut conn = PgConnection::connect(config)?;
//! let results = conn.simple_query("SELECT 1")?;
//! ```

pub mod auth;
pub mod config;
pub mod connection;
pub mod protocol;
mod tls;
pub mod types;

pub use config::{Endpoint, PgConfig, SslMode};
pub use connection::{ConnectionState, PgConnection, PgConnector};
pub use protocol::TransactionStatus;
pub use types::builtin_type_name;
