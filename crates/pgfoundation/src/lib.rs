//! pgfoundation - a PostgreSQL session layer.
//!
//! A [`Session`] manages one logical connection and exposes every service
//! as a *client* reached through a *pooler*:
//!
//! - **Query managers** run SQL templates (`$*` placeholders with optional
//!   `::type` casts) and return a [`ResultIterator`]
//! - **Converters** translate between wire text and [`Value`]s, recursing
//!   through arrays, composites and ranges
//! - **Inspector** reads the system catalogs
//! - **Listeners** receive in-process events such as `query:pre`
//! - **Observers** wrap `LISTEN`/`NOTIFY`
//!
//! Clients are created on first use and reused afterwards: asking twice for
//! the same identifier returns the same instance.
//!
//! # Quick Start
//!
//! ```ignore
//! use pgfoundation::prelude::*;
//!
//! let session = SessionBuilder::new(SessionConfig::new("pgsql://app@localhost/app"))
//!     .build_session(None)?;
//!
//! for row in session.query("select id, tags from item where id > $*", &[10.into()])? {
//!     let row = row?;
//!     let id: i32 = row.get_named("id")?;
//!     let tags: Vec<String> = row.get_named("tags")?;
//! }
//!
//! let jobs = session.observer("jobs")?;
//! while let Some(notification) = jobs.get_notification()? {
//!     println!("{}", notification.payload);
//! }
//! ```
//!
//! # Threading
//!
//! Sessions are single-threaded and every call blocks until the backend
//! answered. `Session` is neither `Send` nor `Sync`.

pub mod client;
pub mod connection;
pub mod converter;
pub mod inspector;
pub mod listener;
pub mod observer;
pub mod pooler;
pub mod query;
pub mod result_iterator;
pub mod session;
pub mod session_builder;

#[cfg(test)]
mod testing;

pub use client::{Client, ClientContext, ClientRegistry, client_type, downcast_client};
pub use connection::{Connection, ConnectionStatus};
pub use converter::{Codec, CompositeCodec, ConverterClient, ConverterRegistry, RangeCodec};
pub use inspector::{FieldInformation, Inspector};
pub use listener::{Listener, ListenerCallback};
pub use observer::Observer;
pub use pooler::{Pooler, PoolerContext};
pub use query::{PreparedStatement, Query, QueryKind, QueryManager, SqlTemplate};
pub use result_iterator::ResultIterator;
pub use session::Session;
pub use session_builder::{
    DSN_ENV_VAR, PostConfigureHook, SessionBuilder, SessionConfig, default_configuration,
};

pub use pgfoundation_core::{
    ConnectionError, ConnectionErrorKind, ConverterError, Dsn, Error, FoundationError,
    FoundationErrorKind, Notification, Result, Row, SqlError, Value,
};
pub use pgfoundation_core::{Circle, Interval, PgBox, Point, Range, Segment};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        Client, Codec, Error, Inspector, Listener, Observer, QueryManager, Result,
        ResultIterator, Row, Session, SessionBuilder, SessionConfig, Value,
    };
}
